//! Declarative client profiles.
//!
//! A [`ClientProfile`] describes how one network client is built: base URL,
//! timeouts, proxy route and the headers/form parameters injected into every
//! request. Profiles are plain data; once handed to the registry they are
//! shared behind an `Arc` and never mutated.
//!
//! # Examples
//!
//! ```
//! use profile_http::config::{ClientProfile, ProxyConfig, ProxyKind};
//!
//! let profile = ClientProfile::new("https://api.example.com/")
//!     .with_default_header("X-App", "demo")
//!     .with_default_param("lang", "en")
//!     .with_proxy(ProxyConfig::new(ProxyKind::Http, "10.0.0.1", 3128).with_credentials("u", "p"));
//!
//! assert_eq!(profile.connect_timeout_ms, 10_000);
//! assert!(profile.proxy.is_routed());
//! ```
//!
//! Profiles can also be loaded from JSON; omitted fields take their defaults:
//!
//! ```
//! use profile_http::config::ClientProfile;
//!
//! let profile = ClientProfile::from_json_str(r#"{"base_url": "http://localhost:8080/"}"#).unwrap();
//! assert_eq!(profile.read_timeout_ms, 10_000);
//! assert!(profile.default_headers.is_empty());
//! ```

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Default read timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;
/// Default write timeout in milliseconds.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_read_timeout() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_write_timeout() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}

/// Kind of proxy route a client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// No proxy; connect to the origin directly.
    #[default]
    Direct,
    /// HTTP proxy.
    Http,
    /// SOCKS5 proxy.
    Socks,
}

/// Proxy descriptor of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Route kind
    pub kind: ProxyKind,
    /// Proxy host or IP address
    pub address: String,
    /// Proxy port
    pub port: u16,
    /// User name sent when the proxy challenges
    pub username: String,
    /// Password sent when the proxy challenges
    pub password: String,
}

impl ProxyConfig {
    /// Create a proxy descriptor without credentials.
    pub fn new(kind: ProxyKind, address: impl Into<String>, port: u16) -> Self {
        Self {
            kind,
            address: address.into(),
            port,
            ..Default::default()
        }
    }

    /// Attach basic credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Whether traffic is routed through a proxy at all.
    pub fn is_routed(&self) -> bool {
        self.kind != ProxyKind::Direct
    }

    /// Whether credentials are configured.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }

    /// Proxy URL understood by the HTTP stack, or `None` for direct routes.
    pub fn proxy_url(&self) -> Option<String> {
        match self.kind {
            ProxyKind::Direct => None,
            ProxyKind::Http => Some(format!("http://{}:{}", self.address, self.port)),
            ProxyKind::Socks => Some(format!("socks5://{}:{}", self.address, self.port)),
        }
    }
}

/// Configuration bundle describing how to build a network client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    /// Base URL every relative request path is resolved against
    pub base_url: String,

    /// Connect timeout (ms)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Read timeout (ms)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Write timeout (ms)
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    /// Proxy route
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Headers set on every outgoing request
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,

    /// Form parameters appended to every form (or body-less) request
    #[serde(default)]
    pub default_params: BTreeMap<String, String>,

    /// Keep the original verb when default parameters rebuild a form body.
    ///
    /// Off by default: rebuilt bodies are re-issued as `POST`.
    #[serde(default)]
    pub keep_request_method: bool,
}

impl ClientProfile {
    /// Create a profile with default timeouts, no proxy and no defaults.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            proxy: ProxyConfig::default(),
            default_headers: BTreeMap::new(),
            default_params: BTreeMap::new(),
            keep_request_method: false,
        }
    }

    /// Parse a profile from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set all three timeouts.
    pub fn with_timeouts(mut self, connect_ms: u64, read_ms: u64, write_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.read_timeout_ms = read_ms;
        self.write_timeout_ms = write_ms;
        self
    }

    /// Set the proxy route.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// Add a default header.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Add a default form parameter.
    pub fn with_default_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_params.insert(name.into(), value.into());
        self
    }

    /// Keep the original verb when the preload stage rebuilds a form body.
    pub fn with_keep_request_method(mut self, keep: bool) -> Self {
        self.keep_request_method = keep;
        self
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Deadline for a whole exchange.
    ///
    /// The HTTP stack has no separate write phase, so the write budget is folded
    /// into the overall deadline together with connect and read.
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(
            self.connect_timeout_ms
                .saturating_add(self.read_timeout_ms)
                .saturating_add(self.write_timeout_ms),
        )
    }

    /// Parse and check the base URL.
    pub fn parsed_base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "base URL must be http(s), got '{}'",
                self.base_url
            )));
        }
        Ok(url)
    }

    /// Validate the profile before a client is built from it.
    pub fn validate(&self) -> Result<()> {
        self.parsed_base_url()?;
        if self.proxy.is_routed() && self.proxy.address.is_empty() {
            return Err(ClientError::Configuration(
                "proxy route configured without an address".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let profile = ClientProfile::new("http://localhost/");
        assert_eq!(profile.read_timeout_ms, DEFAULT_READ_TIMEOUT_MS);
        assert_eq!(profile.write_timeout_ms, DEFAULT_WRITE_TIMEOUT_MS);
        assert_eq!(profile.proxy.kind, ProxyKind::Direct);
        assert!(profile.proxy.proxy_url().is_none());
    }

    #[test]
    fn test_from_json_with_proxy() {
        let profile = ClientProfile::from_json_str(
            r#"{
                "base_url": "https://api.example.com/",
                "connect_timeout_ms": 500,
                "proxy": {"kind": "socks", "address": "127.0.0.1", "port": 1080},
                "default_headers": {"X-App": "demo"}
            }"#,
        )
        .unwrap();
        assert_eq!(profile.connect_timeout_ms, 500);
        assert_eq!(profile.read_timeout_ms, 10_000);
        assert_eq!(profile.proxy.proxy_url().as_deref(), Some("socks5://127.0.0.1:1080"));
        assert!(!profile.proxy.has_credentials());
        assert_eq!(profile.default_headers["X-App"], "demo");
    }

    #[test]
    fn test_request_deadline_sums_phases() {
        let profile = ClientProfile::new("http://localhost/").with_timeouts(100, 200, 300);
        assert_eq!(profile.request_deadline(), Duration::from_millis(600));
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        assert!(ClientProfile::new("not a url").validate().is_err());
        assert!(ClientProfile::new("ftp://example.com/").validate().is_err());
        assert!(ClientProfile::new("http://example.com/").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_proxy_without_address() {
        let profile = ClientProfile::new("http://example.com/")
            .with_proxy(ProxyConfig::new(ProxyKind::Http, "", 8080));
        assert!(matches!(profile.validate(), Err(ClientError::Configuration(_))));
    }
}
