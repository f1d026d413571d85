//! SigV4 request signing.
//!
//! # Responsibilities
//! - Work out the signing service and region for a target host
//! - Sign an outbound request with the route's current credentials
//!
//! # Design Decisions
//! - The SigV4 algorithm itself comes from `aws-sigv4`
//! - `sign` consumes a request and returns the signed one; nothing is
//!   shared with the caller while signing
//! - S3 hosts get single percent-encoding, no path normalization and an
//!   `x-amz-content-sha256` header, as S3 expects

use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign as sigv4_sign, PayloadChecksumKind, PercentEncodingMode, SignableBody, SignableRequest,
    SigningParams, SigningSettings, UriPathNormalizationMode,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use bytes::Bytes;
use thiserror::Error;

use crate::config::route::RouteConfig;

const DEFAULT_REGION: &str = "us-east-1";

/// Signing failures.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("header {0} is not valid UTF-8 and cannot be signed")]
    NonUtf8Header(String),

    #[error("invalid signing parameters: {0}")]
    Params(String),

    #[error("signing failed: {0}")]
    Sign(String),
}

/// The `(service, region)` pair a signature is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningScope {
    pub service: String,
    pub region: String,
}

impl SigningScope {
    /// Scope for a route: explicit overrides first, then the target host.
    pub fn for_route(route: &RouteConfig) -> Self {
        let inferred = Self::from_host(route.target_url().host_str().unwrap_or_default());
        Self {
            service: route.service.clone().unwrap_or(inferred.service),
            region: route.region.clone().unwrap_or(inferred.region),
        }
    }

    /// Infer the scope from an AWS endpoint host name.
    ///
    /// `<service>.<region>.amazonaws.com[.cn]` in general, with OpenSearch's
    /// `<domain>.<region>.es.amazonaws.com` and S3's `s3-<region>` forms
    /// handled. Unknown hosts get an empty service and `us-east-1`.
    pub fn from_host(host: &str) -> Self {
        let host = host.to_ascii_lowercase();
        let stem = host
            .strip_suffix(".amazonaws.com.cn")
            .or_else(|| host.strip_suffix(".amazonaws.com"));

        let (mut service, mut region) = match stem {
            Some(stem) => {
                let mut labels = stem.rsplit('.');
                let last = labels.next().unwrap_or_default();
                match labels.next() {
                    Some(before_last) => (before_last.to_string(), last.to_string()),
                    None => (last.to_string(), String::new()),
                }
            }
            None => (String::new(), String::new()),
        };

        if region == "es" || region == "aoss" {
            std::mem::swap(&mut service, &mut region);
        }

        if region == "s3" {
            service = "s3".to_string();
            region = DEFAULT_REGION.to_string();
        } else if let Some(r) = service.strip_prefix("s3-") {
            region = r.to_string();
            service = "s3".to_string();
        } else if let Some(r) = region.strip_prefix("s3-") {
            region = r.to_string();
            service = "s3".to_string();
        }

        if service == "email" {
            service = "ses".to_string();
        }
        if region.is_empty() {
            region = DEFAULT_REGION.to_string();
        }

        Self { service, region }
    }

    fn is_s3(&self) -> bool {
        self.service == "s3"
    }
}

/// Sign `request` and return it with the SigV4 headers attached.
///
/// The URI must be absolute; every header present is covered by the
/// signature, so callers must finish building the request first.
pub fn sign(
    mut request: http::Request<Bytes>,
    credentials: &Credentials,
    scope: &SigningScope,
    time: SystemTime,
) -> Result<http::Request<Bytes>, SigningError> {
    let identity: Identity = credentials.clone().into();

    let mut settings = SigningSettings::default();
    if scope.is_s3() {
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
        settings.percent_encoding_mode = PercentEncodingMode::Single;
        settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;
    }

    let params: SigningParams<'_> = v4::SigningParams::builder()
        .identity(&identity)
        .region(&scope.region)
        .name(&scope.service)
        .time(time)
        .settings(settings)
        .build()
        .map_err(|e| SigningError::Params(e.to_string()))?
        .into();

    let instructions = {
        let headers = request
            .headers()
            .iter()
            .map(|(name, value)| {
                value
                    .to_str()
                    .map(|value| (name.as_str(), value))
                    .map_err(|_| SigningError::NonUtf8Header(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let uri = request.uri().to_string();
        let signable = SignableRequest::new(
            request.method().as_str(),
            uri,
            headers.into_iter(),
            SignableBody::Bytes(&request.body()[..]),
        )
        .map_err(|e| SigningError::Sign(e.to_string()))?;

        let (instructions, _signature) = sigv4_sign(signable, &params)
            .map_err(|e| SigningError::Sign(e.to_string()))?
            .into_parts();
        instructions
    };

    instructions.apply_to_request_http1x(&mut request);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn scope(service: &str, region: &str) -> SigningScope {
        SigningScope {
            service: service.into(),
            region: region.into(),
        }
    }

    #[test]
    fn test_scope_from_opensearch_host() {
        assert_eq!(
            SigningScope::from_host("search-logs-abc123.us-west-2.es.amazonaws.com"),
            scope("es", "us-west-2")
        );
        assert_eq!(
            SigningScope::from_host("abc123.eu-central-1.aoss.amazonaws.com"),
            scope("aoss", "eu-central-1")
        );
    }

    #[test]
    fn test_scope_from_regional_service_host() {
        assert_eq!(
            SigningScope::from_host("abcdef.execute-api.eu-west-1.amazonaws.com"),
            scope("execute-api", "eu-west-1")
        );
        assert_eq!(
            SigningScope::from_host("sts.cn-north-1.amazonaws.com.cn"),
            scope("sts", "cn-north-1")
        );
        assert_eq!(SigningScope::from_host("iam.amazonaws.com"), scope("iam", "us-east-1"));
        assert_eq!(
            SigningScope::from_host("email.us-east-2.amazonaws.com"),
            scope("ses", "us-east-2")
        );
    }

    #[test]
    fn test_scope_from_s3_hosts() {
        assert_eq!(SigningScope::from_host("bucket.s3.amazonaws.com"), scope("s3", "us-east-1"));
        assert_eq!(
            SigningScope::from_host("s3-ap-southeast-2.amazonaws.com"),
            scope("s3", "ap-southeast-2")
        );
    }

    #[test]
    fn test_scope_for_non_aws_host() {
        assert_eq!(SigningScope::from_host("example.com"), scope("", "us-east-1"));
        assert_eq!(SigningScope::from_host("127.0.0.1"), scope("", "us-east-1"));
    }

    #[test]
    fn test_route_overrides_win() {
        let mut route = RouteConfig::new("https://search.internal.example.com").unwrap();
        route.service = Some("es".into());
        route.region = Some("ap-south-1".into());
        assert_eq!(SigningScope::for_route(&route), scope("es", "ap-south-1"));
    }

    #[test]
    fn test_sign_adds_sigv4_headers() {
        let credentials = Credentials::new("AKIDEXAMPLE", "secret", Some("session".into()), None, "test");
        let time = UNIX_EPOCH + Duration::from_secs(1_440_938_160); // 2015-08-30T12:36:00Z
        let request = http::Request::builder()
            .method("GET")
            .uri("https://search-x.us-east-1.es.amazonaws.com/_cat/indices?v=true")
            .header("host", "search-x.us-east-1.es.amazonaws.com")
            .header("accept", "application/json")
            .body(Bytes::new())
            .unwrap();

        let signed = sign(request, &credentials, &scope("es", "us-east-1"), time).unwrap();

        let authorization = signed.headers()["authorization"].to_str().unwrap();
        assert!(authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/es/aws4_request"
        ));
        assert!(authorization.contains("SignedHeaders="));
        assert!(authorization.contains("accept"));
        assert_eq!(signed.headers()["x-amz-date"], "20150830T123600Z");
        assert_eq!(signed.headers()["x-amz-security-token"], "session");
        assert_eq!(signed.headers()["accept"], "application/json");
    }

    #[test]
    fn test_sign_is_deterministic_for_fixed_inputs() {
        let credentials = Credentials::new("AKID", "secret", None, None, "test");
        let time = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let build = || {
            http::Request::builder()
                .method("POST")
                .uri("https://example.com/items")
                .header("content-type", "application/json")
                .body(Bytes::from_static(b"{\"a\":1}"))
                .unwrap()
        };

        let a = sign(build(), &credentials, &scope("", "us-east-1"), time).unwrap();
        let b = sign(build(), &credentials, &scope("", "us-east-1"), time).unwrap();
        assert_eq!(a.headers()["authorization"], b.headers()["authorization"]);
        assert!(a.headers().get("x-amz-security-token").is_none());
    }

    #[test]
    fn test_sign_s3_adds_content_sha() {
        let credentials = Credentials::new("AKID", "secret", None, None, "test");
        let request = http::Request::builder()
            .method("GET")
            .uri("https://bucket.s3.amazonaws.com/key")
            .body(Bytes::new())
            .unwrap();

        let signed = sign(request, &credentials, &scope("s3", "us-east-1"), SystemTime::now()).unwrap();
        assert!(signed.headers().contains_key("x-amz-content-sha256"));
    }
}
