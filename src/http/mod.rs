//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, auth policy, base path)
//!     → [routing layer picks the mounted route]
//!     → forwarder.rs (rebuild request against the target)
//!         → headers.rs (allow-list inbound headers)
//!         → signing.rs (SigV4 with the route's credentials)
//!     → upstream response, allow-listed headers only
//!     → Send to client
//! ```

pub mod error;
pub mod forwarder;
pub mod headers;
pub mod server;
pub mod signing;

pub use error::ProxyError;
pub use forwarder::{SigningForwarder, UpstreamClient};
pub use server::{HttpServer, ServerError};
pub use signing::{sign, SigningError, SigningScope};
