#![forbid(unsafe_code)]

//! Command-line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use crate::error::ServerError;

/// Runtime settings. Every flag falls back to an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "folio-server", version, about = "Rate-limited API for the folio site")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Comma-separated origins allowed by CORS.
    #[arg(long, env = "ALLOW_DOMAIN")]
    pub allow_domain: Option<String>,

    /// Requests allowed per client per window.
    #[arg(long, env = "RATE_LIMIT_MAX", default_value_t = 30)]
    pub rate_limit_max: u32,

    /// Rate limit window length, in seconds.
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 10)]
    pub rate_limit_window_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            allow_domain: None,
            rate_limit_max: 30,
            rate_limit_window_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.rate_limit_max == 0 {
            return Err(ServerError::InvalidConfig(
                "rate limit max must be positive".into(),
            ));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(ServerError::InvalidConfig(
                "rate limit window must be positive".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Origins from `allow_domain`, split on commas and trimmed.
    #[must_use]
    pub fn allowed_origins(&self) -> Vec<String> {
        self.allow_domain
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect()
    }

    #[must_use]
    pub fn with_allow_domain(mut self, domains: impl Into<String>) -> Self {
        self.allow_domain = Some(domains.into());
        self
    }

    #[must_use]
    pub const fn with_rate_limit(mut self, max: u32, window_secs: u64) -> Self {
        self.rate_limit_max = max;
        self.rate_limit_window_secs = window_secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_allow_30_requests_per_10_seconds_on_3000() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.rate_limit_max, 30);
        assert_eq!(config.rate_limit_window_secs, 10);
        assert_eq!(config.allow_domain, None);
    }

    #[test]
    fn flags_override() {
        let parsed = ServerConfig::try_parse_from([
            "folio-server",
            "--port",
            "8080",
            "--rate-limit-max",
            "5",
            "--allow-domain",
            "https://a.dev, https://b.dev",
        ])
        .unwrap();
        assert_eq!(parsed.port, 8080);
        assert_eq!(parsed.rate_limit_max, 5);
        assert_eq!(
            parsed.allowed_origins(),
            vec!["https://a.dev".to_string(), "https://b.dev".to_string()]
        );
    }

    #[test]
    fn origins_skip_blanks() {
        let config = ServerConfig::default().with_allow_domain(" https://a.dev,, ");
        assert_eq!(config.allowed_origins(), vec!["https://a.dev".to_string()]);
        assert!(ServerConfig::default().allowed_origins().is_empty());
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(ServerConfig::default().validate().is_ok());
        assert!(ServerConfig::default().with_rate_limit(0, 10).validate().is_err());
        assert!(ServerConfig::default().with_rate_limit(30, 0).validate().is_err());
    }

    #[test]
    fn socket_addr_joins_bind_and_port() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3000");
        assert_eq!(config.window(), Duration::from_secs(10));
    }
}
