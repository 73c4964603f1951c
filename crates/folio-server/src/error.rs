#![forbid(unsafe_code)]

//! Server error types.

use std::net::SocketAddr;

/// Errors that stop the server from starting or running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_the_address() {
        let err = ServerError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(err.to_string(), "failed to bind 127.0.0.1:3000: in use");
    }

    #[test]
    fn config_error_display() {
        let err = ServerError::InvalidConfig("rate limit max must be positive".into());
        assert_eq!(
            err.to_string(),
            "invalid config: rate limit max must be positive"
        );
    }
}
