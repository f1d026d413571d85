//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_credential_types::Credentials;
use axum::body::{to_bytes, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;

use proxy_sigv4::config::RouteConfig;
use proxy_sigv4::credentials::{CredentialError, CredentialProvider, ProviderFactory};
use proxy_sigv4::lifecycle::Shutdown;
use proxy_sigv4::{HttpServer, ProxyConfig};

/// One request as the mock upstream saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Canned answer for every upstream request.
#[derive(Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: &'static str,
}

impl UpstreamReply {
    pub fn ok(body: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![("content-type", "application/json")],
            body,
        }
    }
}

#[derive(Clone)]
struct BackendState {
    reply: UpstreamReply,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Start a mock upstream on an ephemeral port that records what it receives.
pub async fn start_recording_backend(reply: UpstreamReply) -> (SocketAddr, Arc<Mutex<Vec<RecordedRequest>>>) {
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let state = BackendState {
        reply,
        recorded: recorded.clone(),
    };

    let app = Router::new().fallback(record).with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, recorded)
}

async fn record(State(state): State<BackendState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap();
    state.recorded.lock().unwrap().push(RecordedRequest {
        method: parts.method,
        path_and_query: parts
            .uri
            .path_and_query()
            .map(ToString::to_string)
            .unwrap_or_default(),
        headers: parts.headers,
        body,
    });

    let mut response = (state.reply.status, state.reply.body).into_response();
    for (name, value) in &state.reply.headers {
        response.headers_mut().insert(*name, value.parse().unwrap());
    }
    response
}

/// Hands out fixed credentials; never expire.
pub struct StaticProvider;

#[async_trait]
impl CredentialProvider for StaticProvider {
    async fn provide(&self) -> Result<Credentials, CredentialError> {
        Ok(Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            None,
            Some(SystemTime::now() + Duration::from_secs(3600)),
            "static",
        ))
    }

    fn kind(&self) -> &'static str {
        "static"
    }
}

/// Records the role ARN of every route it is asked to serve.
#[derive(Default)]
pub struct StaticFactory {
    pub created: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl ProviderFactory for StaticFactory {
    async fn create(&self, route: &RouteConfig) -> Result<Arc<dyn CredentialProvider>, CredentialError> {
        self.created.lock().unwrap().push(route.role_arn.clone());
        Ok(Arc::new(StaticProvider))
    }
}

/// Parse `toml`, build the proxy with `factory`, serve it on an ephemeral port.
pub async fn start_proxy(toml: &str, factory: &dyn ProviderFactory) -> (SocketAddr, Shutdown) {
    let config: ProxyConfig = proxy_sigv4::config::parse_config(toml).unwrap();
    let server = HttpServer::build(config, factory).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let listener_shutdown = shutdown.listener();
    tokio::spawn(async move {
        let _ = server.run(listener, listener_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
