//! SaaS mode: refresh token to bearer token exchange against the cloud identity provider.
use std::time::Duration;

use mgmt_auth_core::{HeaderSet, HttpMethod, HttpRequest, HttpTransport, RedirectPolicy};
use mgmt_auth_lib::encode_form;
use tracing::{debug, instrument, warn};

use crate::oauth_core::error::{truncate_body, AuthError};
use crate::oauth_core::headers::bearer_headers;
use crate::oauth_core::https_base;
use crate::oauth_core::types::{SaasTokenResponse, TokenSet};

/// Path of the api-token authorize endpoint on the identity endpoint.
pub const TOKEN_PATH: &str = "/csp/gateway/am/api/auth/api-tokens/authorize";

/// Immediate retries on OS-level connect failures.
pub const CONNECT_ATTEMPTS: usize = 10;

pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Full URL of the token endpoint for an identity endpoint.
pub fn token_url(identity_endpoint: &str) -> String {
    format!("{}{}", https_base(identity_endpoint), TOKEN_PATH)
}

/// Exchanges a long-lived SaaS refresh token for a short-lived access token.
#[derive(Clone)]
pub struct TokenExchangeClient<C: HttpTransport> {
    http: C,
    connect_attempts: usize,
}

impl<C: HttpTransport> TokenExchangeClient<C> {
    pub fn new(http: C) -> Self {
        Self { http, connect_attempts: CONNECT_ATTEMPTS }
    }

    pub fn with_connect_attempts(mut self, attempts: usize) -> Self {
        self.connect_attempts = attempts.max(1);
        self
    }

    /// POST the refresh token and parse the access token out of the response.
    ///
    /// Socket-level connect failures are retried immediately, up to the
    /// configured number of attempts; every other failure aborts at once.
    #[instrument(skip(self, refresh_token), level = "debug")]
    pub async fn exchange(
        &self,
        identity_endpoint: &str,
        refresh_token: &str,
    ) -> Result<TokenSet, AuthError> {
        if identity_endpoint.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration("identity endpoint is empty".into()));
        }
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidConfiguration("refresh token is empty".into()));
        }

        let endpoint = token_url(identity_endpoint);
        let request = HttpRequest::new(HttpMethod::POST, endpoint.clone())
            .form(encode_form(&[("refresh_token", refresh_token)]))
            .header("Accept", "application/json")
            .timeout(EXCHANGE_TIMEOUT)
            .redirect_policy(RedirectPolicy::Follow);

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.http.execute(request.clone()).await {
                Ok(response) => break response,
                Err(source) if source.is_socket_connect() => {
                    if attempt >= self.connect_attempts {
                        warn!(
                            attempts = attempt,
                            error = %source,
                            "Giving up connecting to the identity endpoint"
                        );
                        return Err(AuthError::TransientNetwork {
                            endpoint,
                            attempts: attempt,
                            source,
                        });
                    }
                    debug!(attempt, error = %source, "Connect failed, retrying");
                }
                Err(source) => return Err(AuthError::Transport { endpoint, source }),
            }
        };

        if !response.is_success() {
            return Err(AuthError::Service {
                endpoint,
                status: response.status,
                body: truncate_body(&response.text()),
            });
        }
        let token: SaasTokenResponse = serde_json::from_slice(&response.body)
            .map_err(|source| AuthError::Decode { endpoint: endpoint.clone(), source })?;
        debug!(attempts = attempt, "Exchanged refresh token for an access token");
        Ok(token.into_token_set())
    }

    /// Exchange and build the header set: a single `authorization: Bearer <token>`.
    pub async fn headers(
        &self,
        identity_endpoint: &str,
        refresh_token: &str,
    ) -> Result<HeaderSet, AuthError> {
        let tokens = self.exchange(identity_endpoint, refresh_token).await?;
        Ok(bearer_headers(&tokens))
    }
}
