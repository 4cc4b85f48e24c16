//! Startup registration of the inbound webhook with the platform.
//!
//! `Unregistered -> Registering{attempt} -> Registered | Failed`. Failures never
//! abort startup: the HTTP server keeps serving health checks either way.

use std::{
    fmt,
    future::Future,
    sync::{Arc, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{errors::Error, Result};

/// Classified failure of a webhook API call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookFailure {
    /// Platform asked us to wait exactly this long.
    RateLimited(Duration),
    /// Network / timeout style failure worth retrying after a short delay.
    Transient(String),
    /// The platform refused the request; retrying will not help.
    Rejected(String),
}

impl fmt::Display for WebhookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited(d) => write!(f, "rate limited for {d:?}"),
            Self::Transient(e) => write!(f, "transient error: {e}"),
            Self::Rejected(e) => write!(f, "rejected: {e}"),
        }
    }
}

/// Platform calls the registrar needs.
#[async_trait]
pub trait WebhookApi: Send + Sync {
    async fn delete_webhook(&self) -> std::result::Result<(), WebhookFailure>;
    async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&str>,
    ) -> std::result::Result<(), WebhookFailure>;
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts per call, rate-limited ones included.
    pub max_attempts: u32,
    /// Fixed wait after a transient failure. Rate-limit waits come from the platform.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, is rejected, or the attempt bound is reached.
    pub async fn run<F, Fut>(
        &self,
        what: &str,
        mut on_attempt: impl FnMut(u32),
        mut op: F,
    ) -> std::result::Result<(), WebhookFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<(), WebhookFailure>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            on_attempt(attempt);
            let err = match op().await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if attempt >= max {
                warn!(what, attempt, error = %err, "giving up after max attempts");
                return Err(err);
            }

            match &err {
                WebhookFailure::RateLimited(wait) => {
                    warn!(what, attempt, wait_secs = wait.as_secs_f64(), "rate limited, waiting");
                    sleep(*wait).await;
                }
                WebhookFailure::Transient(e) => {
                    warn!(what, attempt, error = %e, "transient failure, retrying");
                    sleep(self.retry_delay).await;
                }
                WebhookFailure::Rejected(e) => {
                    warn!(what, attempt, error = %e, "rejected by platform, not retrying");
                    return Err(err);
                }
            }
            attempt += 1;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum RegistrationState {
    #[default]
    Unregistered,
    Registering {
        attempt: u32,
    },
    Registered,
    Failed(String),
}

impl RegistrationState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Registering { .. } => "registering",
            Self::Registered => "registered",
            Self::Failed(_) => "failed",
        }
    }
}

/// Shared, synchronously readable view of the registration state (health checks read it).
#[derive(Clone, Default)]
pub struct RegistrationStatus {
    inner: Arc<RwLock<RegistrationState>>,
}

impl RegistrationStatus {
    pub fn get(&self) -> RegistrationState {
        self.inner
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn set(&self, state: RegistrationState) {
        match self.inner.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}

pub struct WebhookRegistrar {
    api: Arc<dyn WebhookApi>,
    url: String,
    secret_token: Option<String>,
    policy: RetryPolicy,
    status: RegistrationStatus,
}

impl WebhookRegistrar {
    pub fn new(
        api: Arc<dyn WebhookApi>,
        url: impl Into<String>,
        secret_token: Option<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            api,
            url: url.into(),
            secret_token,
            policy,
            status: RegistrationStatus::default(),
        }
    }

    pub fn status(&self) -> RegistrationStatus {
        self.status.clone()
    }

    /// Drop any previous webhook, then register ours.
    ///
    /// A failed delete is logged and registration proceeds anyway.
    pub async fn register(&self) -> Result<()> {
        self.status.set(RegistrationState::Registering { attempt: 1 });

        if let Err(e) = self
            .policy
            .run("delete_webhook", |_| {}, || self.api.delete_webhook())
            .await
        {
            warn!(error = %e, "could not remove previous webhook; registering anyway");
        }

        let status = self.status.clone();
        let res = self
            .policy
            .run(
                "set_webhook",
                |attempt| status.set(RegistrationState::Registering { attempt }),
                || self.api.set_webhook(&self.url, self.secret_token.as_deref()),
            )
            .await;

        match res {
            Ok(()) => {
                info!(url = %self.url, "webhook registered");
                self.status.set(RegistrationState::Registered);
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                self.status.set(RegistrationState::Failed(reason.clone()));
                Err(Error::Registration(reason))
            }
        }
    }
}
