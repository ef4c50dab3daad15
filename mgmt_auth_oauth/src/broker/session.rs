use std::fmt;
use std::time::Duration;

use mgmt_auth_core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, RedirectPolicy};
use mgmt_auth_lib::encode_form;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use super::redirect::authorization_code;
use super::{
    AUTHORIZE_PATH, CLIENT_ID, PASSWORD_HEADER, REDIRECT_URI, SCOPES, TOKEN_PATH, USERNAME_HEADER,
};
use crate::oauth_core::crypto::{CsrfState, PkcePair};
use crate::oauth_core::error::{truncate_body, AuthError};
use crate::oauth_core::https_base;
use crate::oauth_core::types::{BrokerTokenResponse, OAuthErrorBody, TokenSet};

pub const AUTHORIZE_TIMEOUT: Duration = Duration::from_secs(60);
pub const TOKEN_TIMEOUT: Duration = Duration::from_secs(60);

/// Broker host plus the local user credentials injected into the authorization request.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrokerCredentials {
    pub broker_host: String,
    pub username: String,
    pub password: String,
}

impl BrokerCredentials {
    pub fn new(
        broker_host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            broker_host: broker_host.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BrokerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("broker_host", &self.broker_host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One authorization attempt against the identity broker.
///
/// Holds the PKCE verifier and CSRF state for exactly one login; [`login`](Self::login)
/// consumes the session so neither can be reused.
pub struct IdentityBrokerSession {
    broker_host: String,
    username: String,
    password: String,
    authorize_url: String,
    token_url: String,
    redirect: Url,
    pkce: PkcePair,
    state: CsrfState,
}

impl IdentityBrokerSession {
    /// Validate the credentials and prepare fresh PKCE and CSRF material.
    pub fn start(credentials: &BrokerCredentials) -> Result<Self, AuthError> {
        let broker_host = credentials.broker_host.trim();
        if broker_host.is_empty()
            || credentials.username.is_empty()
            || credentials.password.is_empty()
        {
            return Err(AuthError::InvalidConfiguration(
                "broker host, username and password must all be set".into(),
            ));
        }
        let base = https_base(broker_host);
        let redirect = Url::parse(REDIRECT_URI)
            .map_err(|e| AuthError::InvalidConfiguration(format!("redirect uri: {e}")))?;

        Ok(Self {
            broker_host: broker_host.to_string(),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            authorize_url: format!("{base}{AUTHORIZE_PATH}"),
            token_url: format!("{base}{TOKEN_PATH}"),
            redirect,
            pkce: PkcePair::generate()?,
            state: CsrfState::generate()?,
        })
    }

    pub fn broker_host(&self) -> &str {
        &self.broker_host
    }

    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// The authorization GET: credentials as headers, PKCE and state in the
    /// query, redirects captured.
    pub fn authorization_request(&self) -> HttpRequest {
        let query = encode_form(&[
            ("response_type", "code"),
            ("client_id", CLIENT_ID),
            ("redirect_uri", REDIRECT_URI),
            ("scope", SCOPES),
            ("state", self.state.as_str()),
            ("code_challenge", self.pkce.challenge()),
            ("code_challenge_method", self.pkce.method()),
        ]);
        HttpRequest::new(HttpMethod::GET, format!("{}?{query}", self.authorize_url))
            .header(USERNAME_HEADER, self.username.clone())
            .header(PASSWORD_HEADER, self.password.clone())
            .timeout(AUTHORIZE_TIMEOUT)
            .redirect_policy(RedirectPolicy::None)
    }

    fn token_request(&self, code: &str) -> HttpRequest {
        let body = encode_form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", CLIENT_ID),
            ("code_verifier", self.pkce.verifier()),
        ]);
        HttpRequest::new(HttpMethod::POST, self.token_url.clone())
            .form(body)
            .header("Accept", "application/json")
            .timeout(TOKEN_TIMEOUT)
            .redirect_policy(RedirectPolicy::None)
    }

    /// Run the whole flow: authorize, validate the redirect, redeem the code.
    #[instrument(skip_all, fields(broker = %self.broker_host), level = "debug")]
    pub async fn login<C: HttpTransport>(self, http: &C) -> Result<TokenSet, AuthError> {
        let response = http
            .execute(self.authorization_request())
            .await
            .map_err(|source| AuthError::Transport {
                endpoint: self.authorize_url.clone(),
                source,
            })?;

        let location = redirect_location(&response)?;
        let code = authorization_code(location, &self.redirect, &self.state)?;
        debug!("Authorization redirect validated");

        let tokens = self.redeem(http, &code).await.map_err(|source| AuthError::Broker {
            host: self.broker_host.clone(),
            source: Box::new(source),
        })?;
        info!(has_id_token = tokens.id_token.is_some(), "Logged in to identity broker");
        Ok(tokens)
    }

    async fn redeem<C: HttpTransport>(&self, http: &C, code: &str) -> Result<TokenSet, AuthError> {
        let response = http
            .execute(self.token_request(code))
            .await
            .map_err(|source| AuthError::Transport { endpoint: self.token_url.clone(), source })?;

        if !response.is_success() {
            if let Ok(body) = serde_json::from_slice::<OAuthErrorBody>(&response.body) {
                return Err(AuthError::IdentityRejection {
                    error: body.error,
                    description: body.error_description.unwrap_or_default(),
                });
            }
            return Err(AuthError::Service {
                endpoint: self.token_url.clone(),
                status: response.status,
                body: truncate_body(&response.text()),
            });
        }

        let token: BrokerTokenResponse = serde_json::from_slice(&response.body)
            .map_err(|source| AuthError::Decode { endpoint: self.token_url.clone(), source })?;
        Ok(token.into_token_set())
    }
}

impl fmt::Debug for IdentityBrokerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityBrokerSession")
            .field("broker_host", &self.broker_host)
            .field("username", &self.username)
            .field("pkce", &self.pkce)
            .finish_non_exhaustive()
    }
}

/// The `Location` of a captured redirect; anything else is a protocol violation.
fn redirect_location(response: &HttpResponse) -> Result<&str, AuthError> {
    if !response.is_redirect() {
        return Err(AuthError::NotRedirected { status: response.status });
    }
    response
        .header("location")
        .ok_or_else(|| {
            AuthError::MalformedLocation("redirect response has no Location header".into())
        })
}
