//! The two credential exchanges behind one dispatch.
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use mgmt_auth_core::{HeaderSet, HookError, HttpTransport, PreRequestHook};
use mgmt_auth_oauth::{self_managed_headers, AuthError, BrokerCredentials, TokenExchangeClient};
use tracing::{debug, warn};

use crate::config::{Credentials, DeploymentMode};

/// Bounded retry of a whole exchange with a fixed delay between attempts.
///
/// Only errors where [`AuthError::is_transient`] holds are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: usize, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Single attempt.
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Outer retry of the SaaS exchange: 3 attempts, 10 seconds apart.
    pub const fn saas() -> Self {
        Self::new(3, Duration::from_secs(10))
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, AuthError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Err(error) if error.is_transient() && attempt < attempts => {
                    warn!(attempt, attempts, %error, "Credential exchange failed, retrying");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}

/// SaaS exchange bound to its identity endpoint and refresh token.
#[derive(Clone)]
pub struct SaasExchange<C: HttpTransport> {
    client: TokenExchangeClient<C>,
    identity_endpoint: String,
    refresh_token: String,
    retry: RetryPolicy,
}

impl<C: HttpTransport> SaasExchange<C> {
    pub async fn produce_headers(&self) -> Result<HeaderSet, AuthError> {
        self.retry
            .run(move || self.client.headers(&self.identity_endpoint, &self.refresh_token))
            .await
    }
}

impl<C: HttpTransport> fmt::Debug for SaasExchange<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaasExchange")
            .field("identity_endpoint", &self.identity_endpoint)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Self-managed exchange: a full broker login per call, each with a fresh session.
#[derive(Clone)]
pub struct SelfManagedExchange<C: HttpTransport> {
    http: C,
    credentials: BrokerCredentials,
    retry: RetryPolicy,
}

impl<C: HttpTransport> SelfManagedExchange<C> {
    pub async fn produce_headers(&self) -> Result<HeaderSet, AuthError> {
        self.retry
            .run(move || self_managed_headers(&self.http, &self.credentials))
            .await
    }
}

impl<C: HttpTransport> fmt::Debug for SelfManagedExchange<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfManagedExchange")
            .field("credentials", &self.credentials)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

// Self-managed tokens are short-lived: log in again before every API call.
#[async_trait]
impl<C: HttpTransport> PreRequestHook for SelfManagedExchange<C> {
    async fn before_request(&self) -> Result<HeaderSet, HookError> {
        debug!(broker = %self.credentials.broker_host, "Refreshing broker credentials before call");
        self.produce_headers().await.map_err(|error| Box::new(error) as HookError)
    }
}

/// Where authentication headers come from, fixed by the deployment mode.
#[derive(Debug, Clone)]
pub enum HeaderSource<C: HttpTransport> {
    Saas(SaasExchange<C>),
    SelfManaged(SelfManagedExchange<C>),
}

impl<C: HttpTransport> HeaderSource<C> {
    /// Build the source for `credentials` with the default retry policy of its mode.
    pub fn new(credentials: &Credentials, http: C) -> Self {
        match credentials {
            Credentials::Saas { identity_endpoint, refresh_token } => Self::Saas(SaasExchange {
                client: TokenExchangeClient::new(http),
                identity_endpoint: identity_endpoint.clone(),
                refresh_token: refresh_token.clone(),
                retry: RetryPolicy::saas(),
            }),
            Credentials::SelfManaged(broker) => Self::SelfManaged(SelfManagedExchange {
                http,
                credentials: broker.clone(),
                retry: RetryPolicy::once(),
            }),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        match &mut self {
            Self::Saas(exchange) => exchange.retry = policy,
            Self::SelfManaged(exchange) => exchange.retry = policy,
        }
        self
    }

    pub fn mode(&self) -> DeploymentMode {
        match self {
            Self::Saas(_) => DeploymentMode::Saas,
            Self::SelfManaged(_) => DeploymentMode::SelfManaged,
        }
    }

    /// Identity endpoint or broker host the exchange talks to.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Saas(exchange) => &exchange.identity_endpoint,
            Self::SelfManaged(exchange) => &exchange.credentials.broker_host,
        }
    }

    /// Run one full credential exchange, including retries.
    pub async fn produce_headers(&self) -> Result<HeaderSet, AuthError> {
        match self {
            Self::Saas(exchange) => exchange.produce_headers().await,
            Self::SelfManaged(exchange) => exchange.produce_headers().await,
        }
    }
}
