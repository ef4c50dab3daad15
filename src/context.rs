use std::sync::Arc;

use mgmt_auth_core::tls::resolve;
use mgmt_auth_core::{
    ClientTuning, Connection, HeaderSet, HttpTransport, ReqwestHttpClient, TransportError,
    TrustError,
};
use mgmt_auth_oauth::AuthError;
use tracing::{debug, info, instrument};

use crate::config::{AuthConfig, ConfigError, DeploymentMode};
use crate::exchange::{HeaderSource, RetryPolicy};

pub const HOST_HEADER: &str = "Host";
pub const PROJECT_ID_HEADER: &str = "x-project-id";

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to resolve TLS material: {0}")]
    Trust(#[from] TrustError),
    #[error("failed to build the HTTPS client: {0}")]
    Transport(#[source] TransportError),
    #[error("{mode} credential exchange with {endpoint} failed: {source}")]
    Auth {
        mode: DeploymentMode,
        endpoint: String,
        #[source]
        source: AuthError,
    },
    #[error("authentication context is not set up")]
    NotSetUp,
}

impl ContextError {
    /// The underlying exchange failure, if this is one.
    pub fn auth_error(&self) -> Option<&AuthError> {
        match self {
            Self::Auth { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Turns operator credentials into the headers every management API call carries.
///
/// The deployment mode is taken from the credentials at construction and never changes.
pub struct AuthenticationContext<C: HttpTransport = ReqwestHttpClient> {
    config: AuthConfig,
    http: C,
    source: HeaderSource<C>,
    connection: Option<Arc<Connection<C>>>,
}

impl AuthenticationContext<ReqwestHttpClient> {
    /// Resolve the TLS material and build the production HTTPS client.
    pub fn from_config(mut config: AuthConfig) -> Result<Self, ContextError> {
        config.validate()?;
        let material = resolve(&config.trust)?;
        let http = ReqwestHttpClient::new(&material, &ClientTuning::default())
            .map_err(ContextError::Transport)?;
        Self::with_client(config, http)
    }
}

impl<C: HttpTransport> AuthenticationContext<C> {
    /// Context over an existing transport. TLS settings in the config are not applied.
    pub fn with_client(mut config: AuthConfig, http: C) -> Result<Self, ContextError> {
        config.validate()?;
        let source = HeaderSource::new(&config.credentials, http.clone());
        Ok(Self { config, http, source, connection: None })
    }

    /// Override the retry policy of the credential exchange.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.source = self.source.with_retry_policy(policy);
        self
    }

    pub fn mode(&self) -> DeploymentMode {
        self.source.mode()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Open the connection, authenticate once and install the resulting headers.
    ///
    /// In self-managed mode a pre-request hook is registered that logs in
    /// again before every call. Calling `setup` again replaces the connection.
    #[instrument(skip(self), fields(mode = %self.mode(), server = %self.config.server_endpoint))]
    pub async fn setup(&mut self) -> Result<Arc<Connection<C>>, ContextError> {
        let mut headers = self.exchange().await?;
        headers.insert(HOST_HEADER, self.config.server_host()?);
        if let Some(project) = self.config.project_id.as_deref().filter(|p| !p.is_empty()) {
            headers.insert(PROJECT_ID_HEADER, project);
        }

        let connection = Arc::new(Connection::new(self.config.server_url(), self.http.clone()));
        connection.apply_headers(headers).await;
        if let HeaderSource::SelfManaged(exchange) = &self.source {
            connection.set_pre_request_hook(Arc::new(exchange.clone())).await;
        }

        self.connection = Some(connection.clone());
        info!("Authentication context ready");
        Ok(connection)
    }

    /// The connection opened by [`setup`](Self::setup).
    pub fn connection(&self) -> Result<Arc<Connection<C>>, ContextError> {
        self.connection.clone().ok_or(ContextError::NotSetUp)
    }

    pub fn is_set_up(&self) -> bool {
        self.connection.is_some()
    }

    /// Re-authenticate after a failed API call, if the caller's predicate says so.
    ///
    /// Returns whether the headers were refreshed. Always a no-op in
    /// self-managed mode, where every call already refreshes.
    pub async fn refresh_if_needed<E, P>(
        &self,
        predicate: P,
        observed: &E,
    ) -> Result<bool, ContextError>
    where
        P: FnOnce(&E) -> bool,
    {
        if self.mode() == DeploymentMode::SelfManaged {
            return Ok(false);
        }
        let connection = self.connection()?;
        if !predicate(observed) {
            return Ok(false);
        }
        debug!("Refreshing SaaS access token");
        let headers = self.exchange().await?;
        connection.apply_headers(headers).await;
        Ok(true)
    }

    /// Drop the connection. A later [`setup`](Self::setup) starts from scratch.
    pub fn teardown(&mut self) {
        if self.connection.take().is_some() {
            debug!("Authentication context torn down");
        }
    }

    async fn exchange(&self) -> Result<HeaderSet, ContextError> {
        self.source.produce_headers().await.map_err(|source| ContextError::Auth {
            mode: self.mode(),
            endpoint: self.source.endpoint().to_string(),
            source,
        })
    }
}
