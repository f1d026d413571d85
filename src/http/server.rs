//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Mount every route below the configured base path
//! - Enforce the `allowUnauthenticatedRequests` policy
//! - Wire up middleware (tracing, timeout, request ID, CORS)
//! - Bind server to listener and drain on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::route::{normalize_route_path, RouteConfigError};
use crate::config::ProxyConfig;
use crate::credentials::ProviderFactory;
use crate::http::error::ProxyError;
use crate::http::forwarder::UpstreamClient;
use crate::lifecycle::ShutdownListener;
use crate::routing::matcher::PathPrefixMatcher;
use crate::routing::router::{relative_uri, RouteTable};

/// Errors that prevent the server from being built.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid base path: {0}")]
    BasePath(#[from] RouteConfigError),

    #[error("invalid CORS origin: {0}")]
    CorsOrigin(String),

    #[error("failed to configure TLS for upstream requests: {0}")]
    Tls(#[from] rustls::Error),
}

/// Who may call the proxy.
#[derive(Debug, Clone)]
enum AuthPolicy {
    Open,
    /// Requests must carry `Authorization: Bearer <key>`.
    BearerKey(Arc<str>),
    /// Authentication is required but no key is configured; reject everything.
    Closed,
}

impl AuthPolicy {
    fn from_config(config: &ProxyConfig) -> Self {
        if config.allow_unauthenticated_requests() {
            return AuthPolicy::Open;
        }
        match config.server.api_key.as_deref() {
            Some(key) if !key.is_empty() => AuthPolicy::BearerKey(Arc::from(key)),
            _ => AuthPolicy::Closed,
        }
    }

    fn permits(&self, request: &Request<Body>) -> bool {
        match self {
            AuthPolicy::Open => true,
            AuthPolicy::Closed => false,
            AuthPolicy::BearerKey(key) => bearer_token(request).is_some_and(|t| t == key.as_ref()),
        }
    }
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    routes: Arc<RouteTable>,
    base: Arc<PathPrefixMatcher>,
}

/// HTTP server for the signing proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    routes: Arc<RouteTable>,
}

impl HttpServer {
    /// Assemble routes from `config` and build the server around them.
    pub async fn build(config: ProxyConfig, factory: &dyn ProviderFactory) -> Result<Self, ServerError> {
        let client = UpstreamClient::new()?;
        let routes = RouteTable::build(&config, factory, client).await;
        Self::new(config, routes)
    }

    /// Create a server serving an already-assembled route table.
    pub fn new(config: ProxyConfig, routes: RouteTable) -> Result<Self, ServerError> {
        let routes = Arc::new(routes);
        let base_path = match config.server.base_path.as_str() {
            "" => "/",
            other => other,
        };
        let state = AppState {
            routes: routes.clone(),
            base: Arc::new(PathPrefixMatcher::new(&normalize_route_path(base_path)?)),
        };

        let router = Self::build_router(&config, state)?;
        Ok(Self {
            router,
            config,
            routes,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Result<Router, ServerError> {
        let auth = AuthPolicy::from_config(config);
        tracing::info!(policy = auth_label(&auth), "Request authentication policy");

        let router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(auth, authorize))
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        let router = match &config.server.cors_origin {
            Some(origin) => router.layer(cors_layer(origin)?),
            None => router,
        };
        Ok(router)
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            base_path = %self.config.server.base_path,
            routes = self.routes.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for in-process serving.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

fn auth_label(policy: &AuthPolicy) -> &'static str {
    match policy {
        AuthPolicy::Open => "open",
        AuthPolicy::BearerKey(_) => "bearer",
        AuthPolicy::Closed => "closed",
    }
}

fn cors_layer(origin: &str) -> Result<CorsLayer, ServerError> {
    let origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        let value = HeaderValue::from_str(origin).map_err(|_| ServerError::CorsOrigin(origin.to_string()))?;
        AllowOrigin::exact(value)
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn authorize(State(auth): State<AuthPolicy>, request: Request<Body>, next: Next) -> Response {
    if auth.permits(&request) {
        next.run(request).await
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected unauthenticated request");
        ProxyError::Unauthorized.into_response()
    }
}

/// Strip the base path and hand the request to the route table.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();
    let Some(rest) = state.base.strip(&path) else {
        return ProxyError::NoRoute(path).into_response();
    };

    let (mut parts, body) = request.into_parts();
    parts.uri = match relative_uri(rest, parts.uri.query()) {
        Ok(uri) => uri,
        Err(e) => return e.into_response(),
    };

    match state.routes.dispatch(Request::from_parts(parts, body)).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn config(allow: bool, api_key: Option<&str>) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config
            .proxysigv4
            .insert("allowUnauthenticatedRequests".into(), allow.into());
        config.server.api_key = api_key.map(String::from);
        config
    }

    #[test]
    fn test_open_policy_allows_everything() {
        let auth = AuthPolicy::from_config(&config(true, Some("secret")));
        assert!(auth.permits(&request(None)));
    }

    #[test]
    fn test_bearer_policy() {
        let auth = AuthPolicy::from_config(&config(false, Some("secret")));
        assert!(auth.permits(&request(Some("Bearer secret"))));
        assert!(auth.permits(&request(Some("bearer secret"))));
        assert!(!auth.permits(&request(Some("Bearer wrong"))));
        assert!(!auth.permits(&request(Some("Basic secret"))));
        assert!(!auth.permits(&request(None)));
    }

    #[test]
    fn test_missing_key_fails_closed() {
        let auth = AuthPolicy::from_config(&config(false, None));
        assert!(!auth.permits(&request(Some("Bearer "))));
    }

    #[test]
    fn test_cors_origin_must_be_header_safe() {
        assert!(cors_layer("https://backstage.example.com").is_ok());
        assert!(cors_layer("*").is_ok());
        assert!(matches!(cors_layer("bad\norigin"), Err(ServerError::CorsOrigin(_))));
    }

    #[tokio::test]
    async fn test_router_rejects_before_routing() {
        use tower::ServiceExt;

        let server = HttpServer::new(config(false, Some("secret")), RouteTable::default()).unwrap();

        let response = server.router().oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);

        let authorized = Request::builder()
            .uri("/proxy-sigv4/nothing")
            .header(header::AUTHORIZATION, "Bearer secret")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(authorized).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[test]
    fn test_base_path_is_validated() {
        let mut config = ProxyConfig::default();
        config.server.base_path = "no-slash".into();
        assert!(matches!(
            HttpServer::new(config, RouteTable::default()),
            Err(ServerError::BasePath(_))
        ));
    }
}
