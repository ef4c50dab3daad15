use mgmt_auth_core::HeaderSet;

use super::types::TokenSet;

pub const AUTHORIZATION_HEADER: &str = "authorization";
/// Carries the raw refresh token of a self-managed session.
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";
/// Carries the OIDC ID token (user identity) of a self-managed session.
pub const ID_TOKEN_HEADER: &str = "x-id-token";

pub fn bearer(access_token: &str) -> String {
    format!("Bearer {access_token}")
}

/// Header set with only the authorization header.
pub fn bearer_headers(tokens: &TokenSet) -> HeaderSet {
    HeaderSet::new().with(AUTHORIZATION_HEADER, bearer(&tokens.access_token))
}
