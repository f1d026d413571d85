//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the auth policy has what it needs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Route entries are NOT validated here: a bad route is skipped at assembly
//!   time so the rest of the proxy stays up

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{parse_flag, ProxyConfig, ALLOW_UNAUTHENTICATED_KEY};

/// A single semantic problem in the configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("server.base_path must start with '/': {0}")]
    InvalidBasePath(String),

    #[error("proxysigv4.allowUnauthenticatedRequests = false requires server.api_key")]
    MissingApiKey,

    #[error("proxysigv4.allowUnauthenticatedRequests must be a boolean: {0}")]
    InvalidAllowUnauthenticated(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "server.request_timeout_secs" });
    }

    if config.server.max_body_size == 0 {
        errors.push(ValidationError::Zero { field: "server.max_body_size" });
    }

    let base_path = &config.server.base_path;
    if !base_path.is_empty() && !base_path.starts_with('/') {
        errors.push(ValidationError::InvalidBasePath(base_path.clone()));
    }

    if let Some(value) = config.proxysigv4.get(ALLOW_UNAUTHENTICATED_KEY) {
        if parse_flag(value).is_none() {
            errors.push(ValidationError::InvalidAllowUnauthenticated(value.to_string()));
        }
    }

    let has_key = config.server.api_key.as_deref().is_some_and(|k| !k.is_empty());
    if !config.allow_unauthenticated_requests() && !has_key {
        errors.push(ValidationError::MissingApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_api_key_required_when_auth_enforced() {
        let mut config = ProxyConfig::default();
        config
            .proxysigv4
            .insert("allowUnauthenticatedRequests".into(), Value::Bool(false));
        assert_eq!(validate_config(&config), Err(vec![ValidationError::MissingApiKey]));

        config.server.api_key = Some("secret".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_allow_unauthenticated_string_form_enforces_auth() {
        let mut config = ProxyConfig::default();
        config
            .proxysigv4
            .insert("allowUnauthenticatedRequests".into(), Value::String("false".into()));
        assert_eq!(validate_config(&config), Err(vec![ValidationError::MissingApiKey]));

        config.server.api_key = Some("secret".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_allow_unauthenticated_must_be_boolean() {
        let mut config = ProxyConfig::default();
        config.server.api_key = Some("secret".into());
        config
            .proxysigv4
            .insert("allowUnauthenticatedRequests".into(), Value::from(0));
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidAllowUnauthenticated("0".into())])
        );

        config
            .proxysigv4
            .insert("allowUnauthenticatedRequests".into(), Value::String("nope".into()));
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidAllowUnauthenticated("\"nope\"".into())])
        );
    }

    #[test]
    fn test_base_path_must_be_absolute() {
        let mut config = ProxyConfig::default();
        config.server.base_path = "proxy".into();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidBasePath("proxy".into())])
        );
    }
}
