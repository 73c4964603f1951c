#![forbid(unsafe_code)]

use core::fmt;

use crate::section::UnknownSection;

/// Errors surfaced by the core.
///
/// Missing elements are not errors: lookups return `Option`. These cover
/// configuration and data the host hands in.
#[derive(Debug)]
pub enum FolioError {
    /// A configuration value is out of range.
    InvalidConfig(&'static str),
    /// A JSON payload could not be decoded.
    Json(serde_json::Error),
    /// A section name did not match any section.
    UnknownSection(UnknownSection),
}

impl fmt::Display for FolioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Json(err) => write!(f, "malformed json: {err}"),
            Self::UnknownSection(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for FolioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidConfig(_) => None,
            Self::Json(err) => Some(err),
            Self::UnknownSection(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<UnknownSection> for FolioError {
    fn from(err: UnknownSection) -> Self {
        Self::UnknownSection(err)
    }
}
