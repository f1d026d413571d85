//! Per-route configuration normalization.
//!
//! # Responsibilities
//! - Validate route mount paths and normalize them lexically
//! - Accept the string shorthand (`"/x" = "https://..."`) and the table form
//! - Validate the target URL and the optional IAM role ARN
//! - Fill in the default STS session name
//!
//! # Design Decisions
//! - Pure functions: no I/O, no credential lookups
//! - One error per route so a bad entry never poisons its siblings

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Session name used for STS AssumeRole when the route does not set one.
pub const DEFAULT_ROLE_SESSION_NAME: &str = "tempAssumeRoleSession";

static IAM_ROLE_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:(aws[a-zA-Z-]*)?:iam::\d{12}:role/?.+$").expect("valid IAM role ARN pattern")
});

/// Errors produced while normalizing one route entry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteConfigError {
    #[error("route path must be an absolute path starting with '/': {0}")]
    InvalidPath(String),

    #[error("route target {0}")]
    InvalidTarget(String),

    #[error("IAM role ARN must match pattern {pattern}: {value}")]
    InvalidRoleArn { pattern: String, value: String },

    #[error("route field `{field}` must be a string")]
    InvalidField { field: &'static str },
}

/// A validated, lexically normalized mount path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutePath(String);

impl RoutePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the root mount, which owns every path.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoutePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One proxied route after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// Target as written in the configuration.
    pub target: String,
    /// IAM role to assume before signing, if any.
    pub role_arn: Option<String>,
    /// STS session name; always set when `role_arn` is set.
    pub role_session_name: Option<String>,
    /// Signing service override (otherwise inferred from the target host).
    pub service: Option<String>,
    /// Signing region override (otherwise inferred from the target host).
    pub region: Option<String>,
    target_url: Url,
}

impl RouteConfig {
    /// Route forwarding to `target` with default-chain credentials.
    pub fn new(target: impl Into<String>) -> Result<Self, RouteConfigError> {
        normalize_route_config(&Value::String(target.into()))
    }

    /// The parsed target URL.
    pub fn target_url(&self) -> &Url {
        &self.target_url
    }
}

/// Validate a mount path and resolve `.`, `..` and repeated separators.
///
/// The result never ends with a separator unless it is the root.
pub fn normalize_route_path(path: &str) -> Result<RoutePath, RouteConfigError> {
    if !path.starts_with('/') {
        return Err(RouteConfigError::InvalidPath(path.to_string()));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    Ok(RoutePath(format!("/{}", segments.join("/"))))
}

/// Turn one raw `proxysigv4` entry into a [`RouteConfig`].
pub fn normalize_route_config(raw: &Value) -> Result<RouteConfig, RouteConfigError> {
    let (target, object) = match raw {
        Value::String(target) => (Some(target.as_str()), None),
        Value::Object(map) => (map.get("target").and_then(Value::as_str), Some(map)),
        _ => (None, None),
    };

    let target = target.ok_or_else(|| RouteConfigError::InvalidTarget("must be a string".into()))?;
    let target_url = parse_target(target)?;

    let mut config = RouteConfig {
        target: target.to_string(),
        role_arn: None,
        role_session_name: None,
        service: None,
        region: None,
        target_url,
    };

    let Some(object) = object else {
        return Ok(config);
    };

    config.role_arn = match object.get("roleArn") {
        None | Some(Value::Null) => None,
        Some(Value::String(arn)) if arn.is_empty() => None,
        Some(Value::String(arn)) if IAM_ROLE_ARN.is_match(arn) => Some(arn.clone()),
        Some(other) => {
            return Err(RouteConfigError::InvalidRoleArn {
                pattern: IAM_ROLE_ARN.as_str().to_string(),
                value: match other {
                    Value::String(s) => s.clone(),
                    v => v.to_string(),
                },
            })
        }
    };

    config.role_session_name = optional_string(object, "roleSessionName")?;
    config.service = optional_string(object, "service")?;
    config.region = optional_string(object, "region")?;

    if config.role_arn.is_some() && config.role_session_name.is_none() {
        config.role_session_name = Some(DEFAULT_ROLE_SESSION_NAME.to_string());
    }

    Ok(config)
}

fn parse_target(target: &str) -> Result<Url, RouteConfigError> {
    let url = Url::parse(target)
        .map_err(|e| RouteConfigError::InvalidTarget(format!("must be a valid URL: {target} ({e})")))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(RouteConfigError::InvalidTarget(format!(
            "must be an absolute http(s) URL: {target}"
        )));
    }

    Ok(url)
}

fn optional_string(
    object: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, RouteConfigError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RouteConfigError::InvalidField { field }),
    }
}
