//! Self-managed mode: browser-less OAuth2 Authorization Code + PKCE login
//! against the local identity broker.

pub mod redirect;
pub mod session;

use mgmt_auth_core::{HeaderSet, HttpTransport};

pub use self::session::{BrokerCredentials, IdentityBrokerSession};

use crate::oauth_core::error::AuthError;
use crate::oauth_core::headers::{bearer_headers, ID_TOKEN_HEADER, REFRESH_TOKEN_HEADER};
use crate::oauth_core::types::TokenSet;

pub const AUTHORIZE_PATH: &str = "/provider/pinniped/oauth2/authorize";
pub const TOKEN_PATH: &str = "/provider/pinniped/oauth2/token";
pub const CLIENT_ID: &str = "pinniped-cli";
/// Loopback redirect target; nothing listens there, the redirect is captured instead.
pub const REDIRECT_URI: &str = "http://127.0.0.1/callback";
pub const SCOPES: &str = "openid offline_access username groups";
pub const USERNAME_HEADER: &str = "Pinniped-Username";
pub const PASSWORD_HEADER: &str = "Pinniped-Password";

/// Headers for a broker token set: authorization, refresh token and, when present, the ID token.
pub fn broker_headers(tokens: &TokenSet) -> HeaderSet {
    let mut headers = bearer_headers(tokens);
    headers.insert(REFRESH_TOKEN_HEADER, tokens.refresh_token.clone().unwrap_or_default());
    if let Some(id_token) = &tokens.id_token {
        headers.insert(ID_TOKEN_HEADER, id_token.clone());
    }
    headers
}

/// One full login with a fresh session, turned into headers.
pub async fn self_managed_headers<C: HttpTransport>(
    http: &C,
    credentials: &BrokerCredentials,
) -> Result<HeaderSet, AuthError> {
    let session = IdentityBrokerSession::start(credentials)?;
    let tokens = session.login(http).await?;
    Ok(broker_headers(&tokens))
}
