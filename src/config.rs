//! Proxy Configuration
//!
//! Defines the configuration the proxy is started with:
//! - Upstream chat-completion endpoint
//! - Server-held API key (injected, never read ad hoc from the environment)
//! - Listener address and route
//! - Transport limits

use std::fmt;
use std::time::Duration;

/// Default upstream chat-completion endpoint
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default path the proxy is mounted on
pub const DEFAULT_ROUTE: &str = "/api/chat";

/// Default inbound body cap (1 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Complete proxy configuration
#[derive(Clone)]
pub struct ProxyConfig {
    /// Upstream chat-completion URL
    pub upstream_url: String,
    /// Bearer secret for the upstream API. `None` or empty means not configured.
    pub api_key: Option<String>,
    /// Upstream request timeout. `None` leaves the transport default in place.
    pub timeout_secs: Option<u64>,
    /// Host to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Path the proxy handler is mounted on
    pub route: String,
    /// Maximum accepted inbound body size
    pub max_body_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            api_key: None,
            timeout_secs: None,
            host: "0.0.0.0".to_string(),
            port: 8888,
            route: DEFAULT_ROUTE.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ProxyConfig {
    /// Set the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the upstream URL
    pub fn with_upstream_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = url.into();
        self
    }

    /// The configured API key, treating an empty value as unset
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Hand-written so the key never ends up in logs.
impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("upstream_url", &self.upstream_url)
            .field(
                "api_key",
                &if self.api_key().is_some() {
                    "<redacted>"
                } else {
                    "<unset>"
                },
            )
            .field("timeout_secs", &self.timeout_secs)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("route", &self.route)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}
