#![forbid(unsafe_code)]

//! Site configuration.
//!
//! The page passes a JSON options object to the web host; every field is
//! optional and falls back to the defaults below.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assets::DEFAULT_PRELOAD_IMAGES;
use crate::bridge::{BridgeConfig, DEFAULT_LAYOUT_DEBOUNCE, DEFAULT_MARGIN_PX};
use crate::error::FolioError;
use crate::navigator::DEFAULT_SCROLL_DURATION;
use crate::section::Section;

/// Default endpoint the contact form posts to.
pub const DEFAULT_RELAY_ENDPOINT: &str = "https://api.manu-tech.my.id/graphql";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteConfig {
    /// Extra body height below the container content, in CSS pixels.
    pub margin_px: f64,
    /// Layout recomputation debounce window, in milliseconds.
    pub layout_debounce_ms: u64,
    /// Programmatic scroll duration, in milliseconds.
    pub scroll_duration_ms: u64,
    /// Lazily loaded modules the readiness gate waits for.
    pub modules: Vec<String>,
    /// Image base names preloaded before reveal.
    pub preload_images: Vec<String>,
    /// Contact relay URL.
    pub relay_endpoint: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            margin_px: DEFAULT_MARGIN_PX,
            layout_debounce_ms: duration_ms(DEFAULT_LAYOUT_DEBOUNCE),
            scroll_duration_ms: duration_ms(DEFAULT_SCROLL_DURATION),
            modules: Section::ALL.iter().map(|s| s.name().to_owned()).collect(),
            preload_images: DEFAULT_PRELOAD_IMAGES.iter().map(|&s| s.to_owned()).collect(),
            relay_endpoint: DEFAULT_RELAY_ENDPOINT.to_owned(),
        }
    }
}

impl SiteConfig {
    /// Parse and validate a JSON options object.
    pub fn from_json(json: &str) -> Result<Self, FolioError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the bridge cannot work with.
    pub fn validate(&self) -> Result<(), FolioError> {
        if !self.margin_px.is_finite() || self.margin_px < 0.0 {
            return Err(FolioError::InvalidConfig("marginPx must be a non-negative number"));
        }
        if self.relay_endpoint.trim().is_empty() {
            return Err(FolioError::InvalidConfig("relayEndpoint must not be empty"));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_margin_px(mut self, margin_px: f64) -> Self {
        self.margin_px = margin_px;
        self
    }

    #[must_use]
    pub fn with_layout_debounce(mut self, debounce: Duration) -> Self {
        self.layout_debounce_ms = duration_ms(debounce);
        self
    }

    #[must_use]
    pub fn with_scroll_duration(mut self, duration: Duration) -> Self {
        self.scroll_duration_ms = duration_ms(duration);
        self
    }

    #[must_use]
    pub fn with_modules<I>(mut self, modules: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.modules = modules.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_preload_images<I>(mut self, images: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.preload_images = images.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_relay_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.relay_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub const fn layout_debounce(&self) -> Duration {
        Duration::from_millis(self.layout_debounce_ms)
    }

    #[must_use]
    pub const fn scroll_duration(&self) -> Duration {
        Duration::from_millis(self.scroll_duration_ms)
    }

    #[must_use]
    pub const fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            margin_px: self.margin_px,
            layout_debounce: self.layout_debounce(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_site_constants() {
        let config = SiteConfig::default();
        assert_eq!(config.margin_px, 300.0);
        assert_eq!(config.layout_debounce(), Duration::from_millis(150));
        assert_eq!(config.scroll_duration(), Duration::from_millis(400));
        assert_eq!(config.modules, vec!["home", "about", "projects", "contact"]);
        assert_eq!(config.preload_images.len(), 3);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = SiteConfig::from_json(r#"{ "marginPx": 120, "modules": [] }"#).unwrap();
        assert_eq!(config.margin_px, 120.0);
        assert!(config.modules.is_empty());
        assert_eq!(config.scroll_duration_ms, 400);
        assert_eq!(config.relay_endpoint, DEFAULT_RELAY_ENDPOINT);
    }

    #[test]
    fn negative_margin_is_rejected() {
        let err = SiteConfig::from_json(r#"{ "marginPx": -1 }"#).unwrap_err();
        assert!(matches!(err, FolioError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = SiteConfig::from_json("{ nope").unwrap_err();
        assert!(err.to_string().starts_with("malformed json"));
    }

    #[test]
    fn builders_chain() {
        let config = SiteConfig::default()
            .with_margin_px(0.0)
            .with_scroll_duration(Duration::from_millis(250))
            .with_modules(["home"]);
        assert_eq!(config.bridge_config().margin_px, 0.0);
        assert_eq!(config.scroll_duration(), Duration::from_millis(250));
        assert_eq!(config.modules, vec!["home"]);
    }
}
