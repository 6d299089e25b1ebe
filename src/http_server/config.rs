//! HTTP Server Configuration
//!
//! Listener address and CORS policy for the table API.

use std::io;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use super::rate_limit::RateLimitConfig;

/// `http` section of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Per-client request limits on the table routes
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl HttpServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Address to bind; the host must be an IP literal
    pub fn bind_addr(&self) -> io::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid listen address {}:{}: {}", self.host, self.port, e),
            )
        })
    }

    /// CORS layer for the configured origins
    ///
    /// Origins that are not valid header values are skipped with a warning.
    pub fn cors_layer(&self) -> CorsLayer {
        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        if self.cors_origins.is_empty() {
            return layer.allow_origin(Any);
        }

        let origins: Vec<_> = self
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin.escape_debug(), "ignoring unparsable CORS origin");
                    None
                }
            })
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: HttpServerConfig = serde_json::from_str(r#"{"port": 9000}"#).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn test_rate_limit_section() {
        let config: HttpServerConfig =
            serde_json::from_str(r#"{"rate_limit": {"per_second": 0, "per_hour": 100}}"#).unwrap();
        assert_eq!(config.rate_limit.per_second, 0);
        assert_eq!(config.rate_limit.per_hour, 100);
        assert_eq!(config.rate_limit.per_day, 86400);
    }

    #[test]
    fn test_bind_addr() {
        let addr = HttpServerConfig::with_port(8080).bind_addr().unwrap();
        assert_eq!(addr.port(), 8080);
        assert!(addr.ip().is_unspecified());

        let config = HttpServerConfig {
            host: "db.example".into(),
            ..Default::default()
        };
        assert_eq!(
            config.bind_addr().unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_cors_layer_skips_bad_origins() {
        let config = HttpServerConfig {
            cors_origins: vec!["http://localhost:3000".into(), "not an origin\n".into()],
            ..Default::default()
        };
        let _layer = config.cors_layer();
    }
}
