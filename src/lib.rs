//! SigV4 signing reverse proxy library.
//!
//! Each configured route forwards requests under its mount point to one
//! AWS target, signing every request with credentials from the default
//! provider chain or an assumed IAM role.

// Core subsystems
pub mod config;
pub mod credentials;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use credentials::{AwsProviderFactory, CredentialManager};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::RouteTable;
