#![forbid(unsafe_code)]

//! The four named content blocks of the site.
//!
//! A [`Section`] has a stable logical name (`home`, `about`, `projects`,
//! `contact`) and a DOM id used for deep links. The two differ only for the
//! contact block, whose element is published as `#tes`.

use core::fmt;
use core::str::FromStr;

/// One of the four content blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Home,
    About,
    Projects,
    Contact,
}

impl Section {
    /// All sections in page order.
    pub const ALL: [Section; 4] = [
        Section::Home,
        Section::About,
        Section::Projects,
        Section::Contact,
    ];

    /// Number of sections.
    pub const COUNT: usize = Self::ALL.len();

    /// Stable logical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::About => "about",
            Self::Projects => "projects",
            Self::Contact => "contact",
        }
    }

    /// DOM id the rendered root element carries.
    #[must_use]
    pub const fn dom_id(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::About => "about",
            Self::Projects => "projects",
            Self::Contact => "tes",
        }
    }

    /// Deep-link form of [`Self::dom_id`], including the leading `#`.
    #[must_use]
    pub fn hash(self) -> String {
        format!("#{}", self.dom_id())
    }

    /// Position in page order, usable as a dense array index.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Home => 0,
            Self::About => 1,
            Self::Projects => 2,
            Self::Contact => 3,
        }
    }

    /// Resolve a URL fragment (with or without the leading `#`).
    ///
    /// Both the logical name and the DOM id are accepted, so `#contact` and
    /// `#tes` name the same section.
    #[must_use]
    pub fn from_fragment(fragment: &str) -> Option<Self> {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        if fragment.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|section| {
            fragment.eq_ignore_ascii_case(section.name())
                || fragment == section.dom_id()
        })
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown section name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSection(pub String);

impl fmt::Display for UnknownSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown section: {:?}", self.0)
    }
}

impl std::error::Error for UnknownSection {}

impl FromStr for Section {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fragment(s).ok_or_else(|| UnknownSection(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_matches_page_order() {
        for (i, section) in Section::ALL.into_iter().enumerate() {
            assert_eq!(section.index(), i);
        }
    }

    #[test]
    fn contact_publishes_tes_hash() {
        assert_eq!(Section::Contact.hash(), "#tes");
        assert_eq!(Section::Home.hash(), "#home");
    }

    #[test]
    fn fragment_accepts_name_or_dom_id() {
        assert_eq!(Section::from_fragment("#contact"), Some(Section::Contact));
        assert_eq!(Section::from_fragment("tes"), Some(Section::Contact));
        assert_eq!(Section::from_fragment("#Projects"), Some(Section::Projects));
        assert_eq!(Section::from_fragment("#"), None);
        assert_eq!(Section::from_fragment(""), None);
        assert_eq!(Section::from_fragment("#blog"), None);
    }

    #[test]
    fn parse_reports_unknown_name() {
        assert_eq!("about".parse::<Section>(), Ok(Section::About));
        let err = "footer".parse::<Section>().unwrap_err();
        assert_eq!(err.to_string(), "unknown section: \"footer\"");
    }
}
