//! Route assembly, lookup and dispatch.
//!
//! # Responsibilities
//! - Build one signing forwarder per configured route
//! - Skip (and log) routes that fail normalization or credential activation
//! - Look up the longest mount point owning a request path
//! - Rewrite the request URI relative to that mount and forward it
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) mount scan, longest first (acceptable for typical route counts)
//! - Explicit NoRoute error rather than silent default
//! - One bad route never takes the others down

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response, Uri};
use serde_json::{Map, Value};

use crate::config::route::{normalize_route_config, normalize_route_path, RouteConfig, RoutePath};
use crate::config::schema::{ProxyConfig, ALLOW_UNAUTHENTICATED_KEY};
use crate::credentials::ProviderFactory;
use crate::http::error::ProxyError;
use crate::http::forwarder::{SharedForwarder, SigningForwarder, UpstreamClient};
use crate::observability::metrics;
use crate::routing::matcher::PathPrefixMatcher;

/// A forwarder and the mount point it owns.
#[derive(Debug)]
struct MountedRoute {
    matcher: PathPrefixMatcher,
    forwarder: SharedForwarder,
}

/// All live routes, most specific mount first.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<MountedRoute>,
}

impl RouteTable {
    /// Assemble routes from the `proxysigv4` section of `config`.
    pub async fn build(config: &ProxyConfig, factory: &dyn ProviderFactory, client: UpstreamClient) -> Self {
        build_routes(config.proxy_section(), factory, client, config.server.max_body_size).await
    }

    fn mount(&mut self, forwarder: SigningForwarder) {
        let matcher = PathPrefixMatcher::new(forwarder.route_path());
        self.routes.push(MountedRoute {
            matcher,
            forwarder: Arc::new(forwarder),
        });
        self.routes.sort_by(|a, b| b.matcher.specificity().cmp(&a.matcher.specificity()));
    }

    pub fn contains(&self, route_path: &RoutePath) -> bool {
        self.routes.iter().any(|r| r.forwarder.route_path() == route_path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Mounted paths, most specific first.
    pub fn paths(&self) -> Vec<&RoutePath> {
        self.routes.iter().map(|r| r.forwarder.route_path()).collect()
    }

    /// The forwarder owning `path` and the path relative to its mount.
    pub fn resolve<'a>(&self, path: &'a str) -> Option<(&SharedForwarder, &'a str)> {
        self.routes
            .iter()
            .find_map(|r| r.matcher.strip(path).map(|rest| (&r.forwarder, rest)))
    }

    /// Route `request` to its forwarder.
    pub async fn dispatch(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let start_time = Instant::now();
        let method = request.method().to_string();
        let path = request.uri().path().to_string();

        let Some((forwarder, rest)) = self.resolve(&path) else {
            tracing::warn!(path = %path, "No route matched");
            metrics::record_request("none", &method, 404, start_time);
            return Err(ProxyError::NoRoute(path));
        };

        let (mut parts, body) = request.into_parts();
        parts.uri = relative_uri(rest, parts.uri.query())?;

        let route = forwarder.route_path().to_string();
        let result = forwarder.forward(Request::from_parts(parts, body)).await;

        let status = match &result {
            Ok(response) => response.status(),
            Err(e) => e.status(),
        };
        metrics::record_request(&route, &method, status.as_u16(), start_time);

        result
    }
}

pub(crate) fn relative_uri(path: &str, query: Option<&str>) -> Result<Uri, ProxyError> {
    let path_and_query = match query {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    Ok(Uri::builder().path_and_query(path_and_query).build()?)
}

/// Normalize every entry, activate credentials, mount what survives.
///
/// Every per-route failure is logged and skipped.
pub async fn build_routes(
    section: &Map<String, Value>,
    factory: &dyn ProviderFactory,
    client: UpstreamClient,
    max_body_size: usize,
) -> RouteTable {
    let mut table = RouteTable::default();

    for (raw_path, raw_config) in section {
        if raw_path == ALLOW_UNAUTHENTICATED_KEY {
            continue;
        }

        let (route_path, route) = match normalize_entry(raw_path, raw_config) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(route_path = %raw_path, error = %e, "Failed to configure route");
                metrics::record_route_skipped("invalid_config");
                continue;
            }
        };

        if table.contains(&route_path) {
            tracing::warn!(route_path = %route_path, "Duplicate route path, keeping the first");
            metrics::record_route_skipped("duplicate");
            continue;
        }

        match SigningForwarder::build(route_path.clone(), route.clone(), factory, client.clone(), max_body_size).await {
            Ok(forwarder) => table.mount(forwarder),
            Err(e) => {
                tracing::error!(
                    route_path = %route_path,
                    target = %route.target,
                    role_arn = ?route.role_arn,
                    role_session_name = ?route.role_session_name,
                    error = %e,
                    "Failed to configure route"
                );
                metrics::record_route_skipped("credentials");
            }
        }
    }

    tracing::info!(routes = table.len(), "Route table assembled");
    table
}

fn normalize_entry(
    raw_path: &str,
    raw_config: &Value,
) -> Result<(RoutePath, RouteConfig), crate::config::RouteConfigError> {
    Ok((normalize_route_path(raw_path)?, normalize_route_config(raw_config)?))
}
