//! Per-route credential cache with background refresh.
//!
//! # Responsibilities
//! - Resolve credentials once before a route goes live
//! - Keep the current credentials readable without locking
//! - Refresh expiring credentials from a background task
//!
//! # Design Decisions
//! - Single writer (the refresh task), many readers (request handlers):
//!   `ArcSwap` gives atomic replacement without a mutex
//! - A failed refresh keeps the previous credentials and retries next tick
//! - The refresh task is aborted when the manager is dropped

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use aws_credential_types::Credentials;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::route::{RouteConfig, RoutePath};
use crate::credentials::provider::CredentialProvider;
use crate::credentials::CredentialError;
use crate::observability::metrics;

/// How often the refresh task checks the cached credentials.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Refresh this long before expiry.
pub const REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);

/// True when `credentials` expire within [`REFRESH_BUFFER`] of now.
pub fn credentials_need_refresh(credentials: &Credentials) -> bool {
    credentials_need_refresh_at(credentials, SystemTime::now())
}

/// [`credentials_need_refresh`] against an explicit clock reading.
pub fn credentials_need_refresh_at(credentials: &Credentials, now: SystemTime) -> bool {
    match credentials.expiry() {
        None => false,
        Some(expiry) => match expiry.duration_since(now) {
            Ok(remaining) => remaining < REFRESH_BUFFER,
            // already expired
            Err(_) => true,
        },
    }
}

/// Owns one route's credentials and the task that keeps them fresh.
pub struct CredentialManager {
    current: Arc<ArcSwap<Credentials>>,
    provider_kind: &'static str,
    refresh_task: JoinHandle<()>,
}

impl CredentialManager {
    /// Resolve credentials and start refreshing them every [`REFRESH_INTERVAL`].
    pub async fn activate(
        route_path: &RoutePath,
        route: &RouteConfig,
        provider: Arc<dyn CredentialProvider>,
    ) -> Result<Self, CredentialError> {
        Self::activate_with_interval(route_path, route, provider, REFRESH_INTERVAL).await
    }

    /// Like [`CredentialManager::activate`] with a custom refresh interval.
    pub async fn activate_with_interval(
        route_path: &RoutePath,
        route: &RouteConfig,
        provider: Arc<dyn CredentialProvider>,
        interval: Duration,
    ) -> Result<Self, CredentialError> {
        let initial = provider
            .provide()
            .await
            .map_err(|e| CredentialError::Resolution {
                route_path: route_path.to_string(),
                source: Box::new(e),
            })?;

        tracing::info!(
            route_path = %route_path,
            provider = provider.kind(),
            expires = initial.expiry().is_some(),
            "Resolved credentials"
        );

        let current = Arc::new(ArcSwap::from_pointee(initial));
        let provider_kind = provider.kind();
        let refresher = Refresher {
            current: current.clone(),
            provider,
            route_path: route_path.to_string(),
            role_arn: route.role_arn.clone(),
            role_session_name: route.role_session_name.clone(),
        };
        let first_tick = Instant::now() + interval;
        let refresh_task = tokio::spawn(refresher.run(first_tick, interval));

        Ok(Self {
            current,
            provider_kind,
            refresh_task,
        })
    }

    /// The credentials to sign with right now.
    pub fn current(&self) -> Arc<Credentials> {
        self.current.load_full()
    }

    pub fn provider_kind(&self) -> &'static str {
        self.provider_kind
    }
}

impl Drop for CredentialManager {
    fn drop(&mut self) {
        self.refresh_task.abort();
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("provider_kind", &self.provider_kind)
            .field("current", &self.current.load_full())
            .finish()
    }
}

struct Refresher {
    current: Arc<ArcSwap<Credentials>>,
    provider: Arc<dyn CredentialProvider>,
    route_path: String,
    role_arn: Option<String>,
    role_session_name: Option<String>,
}

impl Refresher {
    async fn run(self, first_tick: Instant, period: Duration) {
        let mut ticker = time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.refresh_if_needed().await;
        }
    }

    async fn refresh_if_needed(&self) {
        if !credentials_need_refresh(&self.current.load()) {
            return;
        }

        match self.provider.provide().await {
            Ok(refreshed) => {
                self.current.store(Arc::new(refreshed));
                metrics::record_credential_refresh(&self.route_path, "success");
                tracing::debug!(route_path = %self.route_path, "Refreshed temporary credentials");
            }
            Err(e) => {
                metrics::record_credential_refresh(&self.route_path, "failure");
                tracing::error!(
                    route_path = %self.route_path,
                    role_arn = ?self.role_arn,
                    role_session_name = ?self.role_session_name,
                    error = %e,
                    "Failed to refresh temporary credentials"
                );
            }
        }
    }
}
