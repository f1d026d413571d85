//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!
//! At router assembly:
//!     proxysigv4 entries
//!     → route.rs (normalize path + route config, per entry)
//!     → RouteConfig handed to the credential manager and forwarder
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Route entries stay untyped until normalization so that one bad route
//!   does not reject the whole file

pub mod loader;
pub mod route;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use route::{normalize_route_config, normalize_route_path, RouteConfig, RouteConfigError, RoutePath};
pub use schema::{LogFormat, ObservabilityConfig, ProxyConfig, ServerConfig};
