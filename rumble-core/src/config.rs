//! Server configuration.
//!
//! Configuration is a plain serde structure, usually read from a JSON file.
//! Every field has a default, so an empty object is a valid config:
//!
//! ```
//! use rumble_core::ServerConfig;
//!
//! let config = ServerConfig::from_json_str("{}").unwrap();
//! assert_eq!(config, ServerConfig::default());
//! assert_eq!(config.channels.len(), 2);
//! ```
//!
//! A fuller file:
//!
//! ```json
//! {
//!   "bind": "0.0.0.0:8080",
//!   "handshake_timeout_secs": 10,
//!   "channels": [
//!     { "path": "/chat", "router": { "capabilities": { "typing": false } } },
//!     { "path": "/dm", "router": {
//!         "capabilities": { "broadcast": false, "typing": false, "roster": false },
//!         "direct_delimiter": { "char": ":" },
//!         "welcome": "hi!",
//!         "echo_direct": true } }
//!   ]
//! }
//! ```

use crate::error::{Error, Result};
use crate::router::RouterConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// One endpoint of the server: a request path and how it routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Path prefix, e.g. `/chat`. Clients connect to `{path}/{identity}`.
    pub path: String,
    /// Routing behaviour of this channel.
    #[serde(default)]
    pub router: RouterConfig,
}

impl ChannelConfig {
    /// Creates a channel config.
    pub fn new(path: impl Into<String>, router: RouterConfig) -> Self {
        Self {
            path: path.into(),
            router,
        }
    }
}

/// Top-level server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Upper bound on the WebSocket handshake, in seconds.
    pub handshake_timeout_secs: u64,
    /// Endpoints, matched in order.
    pub channels: Vec<ChannelConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            handshake_timeout_secs: 5,
            channels: vec![
                ChannelConfig::new("/chat", RouterConfig::chat()),
                ChannelConfig::new("/direct", RouterConfig::direct()),
            ],
        }
    }
}

impl ServerConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks the config for problems serde cannot catch.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if `bind` is not a socket address
    /// - [`Error::Config`] if the handshake timeout is zero or there are no
    ///   channels
    /// - [`Error::Config`] if a channel path does not start with `/`, is just
    ///   `/`, ends with `/`, or appears twice
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.handshake_timeout_secs == 0 {
            return Err(Error::config("handshake_timeout_secs must be at least 1"));
        }

        if self.channels.is_empty() {
            return Err(Error::config("at least one channel is required"));
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            let path = channel.path.as_str();
            if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
                return Err(Error::config(format!("invalid channel path {path:?}")));
            }
            if !seen.insert(path) {
                return Err(Error::config(format!("duplicate channel path {path:?}")));
            }
        }
        Ok(())
    }

    /// The parsed bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", self.bind, e)))
    }

    /// The handshake timeout as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Delimiter;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.channels[0].router, RouterConfig::chat());
        assert_eq!(config.channels[1].router, RouterConfig::direct());
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = ServerConfig::from_json_str(r#"{"bind":"0.0.0.0:9000"}"#).unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.channels.len(), 2);
    }

    #[test]
    fn test_custom_channels() {
        let config = ServerConfig::from_json_str(
            r#"{"channels":[{"path":"/dm","router":{"direct_delimiter":{"char":"|"}}}]}"#,
        )
        .unwrap();

        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.channels[0].path, "/dm");
        assert_eq!(config.channels[0].router.direct_delimiter, Delimiter::Char('|'));
    }

    #[test]
    fn test_bad_bind_address() {
        let err = ServerConfig::from_json_str(r#"{"bind":"localhost"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
    }

    #[test]
    fn test_bad_channel_paths() {
        for paths in [
            r#"[]"#,
            r#"[{"path":"chat"}]"#,
            r#"[{"path":"/"}]"#,
            r#"[{"path":"/chat/"}]"#,
            r#"[{"path":"/chat"},{"path":"/chat"}]"#,
        ] {
            let json = format!(r#"{{"channels":{paths}}}"#);
            let err = ServerConfig::from_json_str(&json).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{paths}");
        }
    }

    #[test]
    fn test_zero_handshake_timeout_rejected() {
        let err = ServerConfig::from_json_str(r#"{"handshake_timeout_secs":0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config = ServerConfig::from_json_str(r#"{"handshake_timeout_secs":1}"#).unwrap();
        assert_eq!(config.handshake_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_malformed_json() {
        let err = ServerConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ServerConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
