//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//!
//! The `proxysigv4` section is kept untyped: route entries may be either a
//! bare target string or a table, and malformed entries must be reported per
//! route instead of failing the whole file. See [`crate::config::route`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key inside `proxysigv4` consumed by the auth policy, never a route.
pub const ALLOW_UNAUTHENTICATED_KEY: &str = "allowUnauthenticatedRequests";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener and HTTP surface settings.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Route path → raw route config, plus `allowUnauthenticatedRequests`.
    pub proxysigv4: Map<String, Value>,
}

impl ProxyConfig {
    /// The raw `proxysigv4` section.
    pub fn proxy_section(&self) -> &Map<String, Value> {
        &self.proxysigv4
    }

    /// Whether requests may reach the proxy without the bearer key.
    ///
    /// Defaults to `true` when the key is absent. A value that is neither a
    /// boolean nor `"true"`/`"false"` is rejected by validation; should one
    /// get this far anyway, authentication stays required.
    pub fn allow_unauthenticated_requests(&self) -> bool {
        match self.proxysigv4.get(ALLOW_UNAUTHENTICATED_KEY) {
            None => true,
            Some(value) => parse_flag(value).unwrap_or(false),
        }
    }
}

/// Read a boolean setting, accepting the `"true"`/`"false"` string forms.
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:7007").
    pub bind_address: String,

    /// Prefix every route is mounted below. Empty or "/" mounts at the root.
    pub base_path: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,

    /// Bearer key required when unauthenticated requests are disallowed.
    pub api_key: Option<String>,

    /// Allowed CORS origin, if any.
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7007".to_string(),
            base_path: "/proxy-sigv4".to_string(),
            request_timeout_secs: 30,
            max_body_size: 2 * 1024 * 1024, // 2MB
            api_key: None,
            cors_origin: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
