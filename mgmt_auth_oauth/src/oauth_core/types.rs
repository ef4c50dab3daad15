//! Token shapes produced by the exchanges and returned by the token endpoints.
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Result of a successful credential exchange. Lives in memory only.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Token set holding only an access token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            id_token: None,
            expiry: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("expiry", &self.expiry)
            .finish()
    }
}

fn expiry_from(expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in
        .filter(|secs| *secs > 0)
        .and_then(Duration::try_seconds)
        .map(|lifetime| Utc::now() + lifetime)
}

/// Response of the SaaS api-token authorize endpoint.
///
/// Every field is parsed; the exchange only uses `access_token`.
#[derive(Debug, Clone, Deserialize)]
pub struct SaasTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl SaasTokenResponse {
    pub fn into_token_set(self) -> TokenSet {
        TokenSet::bearer(self.access_token)
    }
}

/// Standard OAuth2 token fields.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Identity broker token response: the standard fields plus everything else
/// the broker returned, where the OIDC ID token lives.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerTokenResponse {
    #[serde(flatten)]
    pub token: StandardToken,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BrokerTokenResponse {
    /// Normalise into a [`TokenSet`], re-attaching the ID token from the extra fields.
    pub fn into_token_set(self) -> TokenSet {
        let id_token = self
            .extra
            .get("id_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        TokenSet {
            access_token: self.token.access_token,
            refresh_token: self.token.refresh_token,
            id_token,
            expiry: expiry_from(self.token.expires_in),
        }
    }
}

/// OAuth2 error body (`error`, `error_description`).
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}
