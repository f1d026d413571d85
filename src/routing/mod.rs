//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Assembly (at startup):
//!     [proxysigv4] table
//!     → normalize each entry (path + config)
//!     → resolve credentials (skip route on failure)
//!     → build SigningForwarder
//!     → freeze as immutable RouteTable
//!
//! Incoming Request (path relative to the base path):
//!     → router.rs (longest mount lookup)
//!     → matcher.rs (segment-aligned prefix strip)
//!     → SigningForwarder::forward or NoRoute
//! ```
//!
//! # Design Decisions
//! - Routes assembled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: longest mount wins regardless of config order

pub mod matcher;
pub mod router;

pub use router::{build_routes, RouteTable};
