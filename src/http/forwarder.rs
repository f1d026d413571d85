//! Per-route signing forwarder.
//!
//! # Responsibilities
//! - Rebuild the inbound request against the route's target
//! - Filter headers, sign with the route's current credentials
//! - Dispatch over a pooled keep-alive client and relay the response
//!
//! # Design Decisions
//! - The target's scheme and authority are fixed; only path and query come
//!   from the client, so a request can never redirect the proxy to another host
//! - Bodies are buffered (signing needs the payload hash), responses stream
//! - No retries: whatever the target answers is what the client gets

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Method, Request, Response, Uri};
use bytes::Bytes;
use http_body_util::LengthLimitError;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::{Position, Url};

use crate::config::route::{RouteConfig, RoutePath};
use crate::credentials::{CredentialError, CredentialManager, ProviderFactory};
use crate::http::error::ProxyError;
use crate::http::headers::filter_headers;
use crate::http::signing::{sign, SigningScope};

const DEFAULT_BODY_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Keep-alive client pools for upstream calls, one per scheme.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client<HttpConnector, Body>,
    https: Client<HttpsConnector<HttpConnector>, Body>,
}

impl UpstreamClient {
    pub fn new() -> Result<Self, rustls::Error> {
        let http = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build(HttpConnector::new());

        let connector = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::aws_lc_rs::default_provider())?
            .https_only()
            .enable_http1()
            .build();
        let https = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build(connector);

        Ok(Self { http, https })
    }

    /// Send through the pool matching the request's scheme.
    pub async fn send(
        &self,
        request: Request<Body>,
    ) -> Result<Response<Incoming>, hyper_util::client::legacy::Error> {
        match request.uri().scheme_str() {
            Some("https") => self.https.request(request).await,
            _ => self.http.request(request).await,
        }
    }
}

/// Forwards requests for one mounted route.
pub struct SigningForwarder {
    route_path: RoutePath,
    route: RouteConfig,
    scope: SigningScope,
    credentials: CredentialManager,
    client: UpstreamClient,
    max_body_size: usize,
}

impl SigningForwarder {
    /// Acquire credentials for `route` and build its forwarder.
    ///
    /// Fails when the first credential resolution fails.
    pub async fn build(
        route_path: RoutePath,
        route: RouteConfig,
        factory: &dyn ProviderFactory,
        client: UpstreamClient,
        max_body_size: usize,
    ) -> Result<Self, CredentialError> {
        tracing::info!(route_path = %route_path, target = %route.target, "Configuring route handler");

        let provider = factory.create(&route).await?;
        let credentials = CredentialManager::activate(&route_path, &route, provider).await?;
        Ok(Self::new(route_path, route, credentials, client, max_body_size))
    }

    pub fn new(
        route_path: RoutePath,
        route: RouteConfig,
        credentials: CredentialManager,
        client: UpstreamClient,
        max_body_size: usize,
    ) -> Self {
        let scope = SigningScope::for_route(&route);
        tracing::debug!(
            route_path = %route_path,
            service = %scope.service,
            region = %scope.region,
            "Signing scope resolved"
        );

        Self {
            route_path,
            route,
            scope,
            credentials,
            client,
            max_body_size,
        }
    }

    pub fn route_path(&self) -> &RoutePath {
        &self.route_path
    }

    pub fn route(&self) -> &RouteConfig {
        &self.route
    }

    /// Forward `request`, whose URI is relative to this route's mount point.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let (parts, body) = request.into_parts();

        let mut headers = filter_headers(&parts.headers);
        let target_url = self.target_url_for(&parts.uri);

        let body = if parts.method == Method::GET || parts.method == Method::HEAD {
            headers.remove(header::CONTENT_LENGTH);
            Bytes::new()
        } else {
            let raw = self.read_body(body).await?;
            // an empty JSON body is forwarded empty, never as `{}`
            let body = if is_json(&headers) && !raw.is_empty() {
                let value: serde_json::Value = serde_json::from_slice(&raw)?;
                Bytes::from(serde_json::to_vec(&value)?)
            } else {
                raw
            };
            if !body.is_empty() && !headers.contains_key(header::CONTENT_TYPE) {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(DEFAULT_BODY_CONTENT_TYPE));
            }
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
            body
        };

        if let Ok(host) = HeaderValue::from_str(&target_url[Position::BeforeHost..Position::AfterPort]) {
            headers.insert(header::HOST, host);
        }

        let mut outbound = Request::builder()
            .method(parts.method.clone())
            .uri(target_url.as_str())
            .body(body)?;
        *outbound.headers_mut() = headers;

        let credentials = self.credentials.current();
        let signed = sign(outbound, &credentials, &self.scope, SystemTime::now())?;

        tracing::debug!(
            route_path = %self.route_path,
            method = %parts.method,
            target = %target_url,
            "Forwarding signed request"
        );

        let upstream = self.client.send(signed.map(Body::from)).await?;

        let (mut response_parts, response_body) = upstream.into_parts();
        response_parts.headers = filter_headers(&response_parts.headers);
        Ok(Response::from_parts(response_parts, Body::new(response_body)))
    }

    /// Target scheme and authority, inbound path and query.
    fn target_url_for(&self, uri: &Uri) -> Url {
        let mut url = self.route.target_url().clone();
        url.set_path(uri.path());
        url.set_query(uri.query());
        url.set_fragment(None);
        url
    }

    async fn read_body(&self, body: Body) -> Result<Bytes, ProxyError> {
        axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|e| {
                let too_large = std::error::Error::source(&e).is_some_and(|s| s.is::<LengthLimitError>());
                if too_large {
                    ProxyError::BodyTooLarge { limit: self.max_body_size }
                } else {
                    ProxyError::BodyRead(e.to_string())
                }
            })
    }
}

impl std::fmt::Debug for SigningForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningForwarder")
            .field("route_path", &self.route_path)
            .field("target", &self.route.target)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Shared handle used by the route table.
pub type SharedForwarder = Arc<SigningForwarder>;

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_json(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(!is_json(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/x-ndjson"));
        assert!(!is_json(&headers));
    }

    #[tokio::test]
    async fn test_upstream_client_builds() {
        assert!(UpstreamClient::new().is_ok());
    }
}
