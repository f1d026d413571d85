//! Credential subsystem.
//!
//! # Data Flow
//! ```text
//! RouteConfig (roleArn?)
//!     → provider.rs (ProviderFactory picks assume-role or default chain)
//!     → manager.rs (resolve once, then refresh every 30s in the background)
//!     → Arc<Credentials> read by the signing forwarder per request
//! ```

pub mod manager;
pub mod provider;

use thiserror::Error;

pub use manager::{credentials_need_refresh, credentials_need_refresh_at, CredentialManager};
pub use provider::{AwsProviderFactory, CredentialProvider, ProviderFactory};

/// Errors raised while obtaining credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The underlying source (STS, IMDS, environment, ...) failed.
    #[error("credential provider failed: {0}")]
    Provider(String),

    /// The first resolution for a route failed; the route cannot serve requests.
    #[error("failed to resolve credentials for route {route_path}: {source}")]
    Resolution {
        route_path: String,
        #[source]
        source: Box<CredentialError>,
    },
}
