//! Credential sources.
//!
//! # Responsibilities
//! - Define the `CredentialProvider` capability used by the manager
//! - Wrap the AWS default provider chain and STS AssumeRole
//! - Pick the right source for a route (`ProviderFactory`)

use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use tokio::sync::OnceCell;

use crate::config::route::{RouteConfig, DEFAULT_ROLE_SESSION_NAME};
use crate::credentials::CredentialError;

/// Something that can produce the current AWS credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Resolve credentials. Called once at activation and again on refresh.
    async fn provide(&self) -> Result<Credentials, CredentialError>;

    /// Short label for logs and metrics.
    fn kind(&self) -> &'static str;
}

/// Builds the credential provider for a route.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn create(&self, route: &RouteConfig) -> Result<Arc<dyn CredentialProvider>, CredentialError>;
}

/// Environment, shared profile, web identity, ECS and IMDS, in that order.
pub struct DefaultChainCredentialProvider {
    chain: DefaultCredentialsChain,
}

impl DefaultChainCredentialProvider {
    pub async fn new() -> Self {
        Self {
            chain: DefaultCredentialsChain::builder().build().await,
        }
    }
}

#[async_trait]
impl CredentialProvider for DefaultChainCredentialProvider {
    async fn provide(&self) -> Result<Credentials, CredentialError> {
        self.chain
            .provide_credentials()
            .await
            .map_err(|e| CredentialError::Provider(error_chain(&e)))
    }

    fn kind(&self) -> &'static str {
        "default-chain"
    }
}

/// Temporary credentials for an IAM role, obtained with STS AssumeRole.
///
/// The caller identity for the STS call comes from the default chain.
pub struct AssumeRoleCredentialProvider {
    inner: AssumeRoleProvider,
}

impl AssumeRoleCredentialProvider {
    pub async fn new(sdk_config: &SdkConfig, role_arn: &str, session_name: &str) -> Self {
        let inner = AssumeRoleProvider::builder(role_arn)
            .session_name(session_name)
            .configure(sdk_config)
            .build()
            .await;
        Self { inner }
    }
}

#[async_trait]
impl CredentialProvider for AssumeRoleCredentialProvider {
    async fn provide(&self) -> Result<Credentials, CredentialError> {
        self.inner
            .provide_credentials()
            .await
            .map_err(|e| CredentialError::Provider(error_chain(&e)))
    }

    fn kind(&self) -> &'static str {
        "assume-role"
    }
}

/// Production factory backed by `aws-config`.
///
/// The shared SDK configuration (region, base credentials for STS) is loaded
/// on first use and reused by every route.
#[derive(Default)]
pub struct AwsProviderFactory {
    sdk_config: OnceCell<SdkConfig>,
}

impl AwsProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sdk_config(&self) -> &SdkConfig {
        self.sdk_config
            .get_or_init(|| aws_config::load_defaults(BehaviorVersion::latest()))
            .await
    }
}

#[async_trait]
impl ProviderFactory for AwsProviderFactory {
    async fn create(&self, route: &RouteConfig) -> Result<Arc<dyn CredentialProvider>, CredentialError> {
        let provider: Arc<dyn CredentialProvider> = match &route.role_arn {
            Some(role_arn) => {
                let session_name = route
                    .role_session_name
                    .as_deref()
                    .unwrap_or(DEFAULT_ROLE_SESSION_NAME);
                let sdk_config = self.sdk_config().await;
                Arc::new(AssumeRoleCredentialProvider::new(sdk_config, role_arn, session_name).await)
            }
            None => Arc::new(DefaultChainCredentialProvider::new().await),
        };
        Ok(provider)
    }
}

/// Render an error with its sources, `outer: inner: root`.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
