#![forbid(unsafe_code)]

//! Responsive image variants.
//!
//! Every site image ships as four WebP widths named `/<base>-<width>.webp`.
//! The helpers here pick the variant to preload for a viewport and the
//! attributes of the rendered `<img>`.

use core::fmt;

/// Widths each image is exported at, ascending.
pub const VARIANT_WIDTHS: [u32; 4] = [360, 600, 1354, 1440];

/// `sizes` attribute shared by every responsive image.
pub const SIZES: &str = "(max-width: 600px) 100vw, (max-width: 1200px) 50vw, 33vw";

/// Base names preloaded before the page is revealed.
pub const DEFAULT_PRELOAD_IMAGES: [&str; 3] = ["my-avatar", "web-blog", "web-todolist"];

/// One image exported at [`VARIANT_WIDTHS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponsiveImage {
    base: String,
}

impl ResponsiveImage {
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// URL of the variant exported at `width`.
    #[must_use]
    pub fn variant(&self, width: u32) -> String {
        format!("/{}-{width}.webp", self.base)
    }

    /// `srcset` listing every variant.
    #[must_use]
    pub fn srcset(&self) -> String {
        VARIANT_WIDTHS
            .iter()
            .map(|&w| format!("{} {w}w", self.variant(w)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[must_use]
    pub const fn sizes(&self) -> &'static str {
        SIZES
    }

    /// Variant to preload for a viewport `viewport_width` CSS pixels wide.
    #[must_use]
    pub fn preload_href(&self, viewport_width: f64) -> String {
        let width = if viewport_width <= 600.0 {
            360
        } else if viewport_width <= 1200.0 {
            600
        } else if viewport_width <= 1440.0 {
            1354
        } else {
            1440
        };
        self.variant(width)
    }

    /// Fallback `src` for an image rendered `width` pixels wide.
    #[must_use]
    pub fn display_src(&self, width: u32) -> String {
        let variant = match width {
            0..=600 => 600,
            601..=1354 => 1354,
            _ => 1440,
        };
        self.variant(variant)
    }
}

impl fmt::Display for ResponsiveImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

/// Preload URLs for `bases` at the given viewport width, in order.
#[must_use]
pub fn preload_urls<I>(bases: I, viewport_width: f64) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    bases
        .into_iter()
        .map(|base| ResponsiveImage::new(base.as_ref()).preload_href(viewport_width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn srcset_lists_all_widths() {
        let img = ResponsiveImage::new("web-blog");
        assert_eq!(
            img.srcset(),
            "/web-blog-360.webp 360w, /web-blog-600.webp 600w, \
             /web-blog-1354.webp 1354w, /web-blog-1440.webp 1440w"
        );
    }

    #[test]
    fn preload_breakpoints() {
        let img = ResponsiveImage::new("my-avatar");
        assert_eq!(img.preload_href(375.0), "/my-avatar-360.webp");
        assert_eq!(img.preload_href(600.0), "/my-avatar-360.webp");
        assert_eq!(img.preload_href(601.0), "/my-avatar-600.webp");
        assert_eq!(img.preload_href(1200.0), "/my-avatar-600.webp");
        assert_eq!(img.preload_href(1440.0), "/my-avatar-1354.webp");
        assert_eq!(img.preload_href(1920.0), "/my-avatar-1440.webp");
    }

    #[test]
    fn display_src_breakpoints() {
        let img = ResponsiveImage::new("web-todolist");
        assert_eq!(img.display_src(360), "/web-todolist-600.webp");
        assert_eq!(img.display_src(1354), "/web-todolist-1354.webp");
        assert_eq!(img.display_src(1440), "/web-todolist-1440.webp");
    }

    #[test]
    fn preload_urls_keeps_order() {
        let urls = preload_urls(DEFAULT_PRELOAD_IMAGES, 1024.0);
        assert_eq!(
            urls,
            vec![
                "/my-avatar-600.webp".to_string(),
                "/web-blog-600.webp".to_string(),
                "/web-todolist-600.webp".to_string(),
            ]
        );
    }
}
