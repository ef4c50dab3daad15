use mgmt_auth_core::TransportError;

/// Failures of the credential exchanges.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing or empty credentials or endpoints. Never retried.
    #[error("invalid auth configuration: {0}")]
    InvalidConfiguration(String),
    /// Every connect attempt failed at the socket level.
    #[error("could not connect to {endpoint} after {attempts} attempts: {source}")]
    TransientNetwork {
        endpoint: String,
        attempts: usize,
        #[source]
        source: TransportError,
    },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: TransportError,
    },
    /// The identity provider answered with an unexpected status.
    #[error("{endpoint} responded with status {status}: {body}")]
    Service {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Explicit rejection by the identity provider (bad credentials, policy).
    #[error("identity provider rejected the login: {error}: {description}")]
    IdentityRejection { error: String, description: String },
    #[error("CSRF state validation failed: redirect state does not match the request")]
    CsrfMismatch,
    #[error("redirect target {actual} does not match expected {expected}")]
    RedirectMismatch { expected: String, actual: String },
    #[error("expected to be redirected, but response status was {status}")]
    NotRedirected { status: u16 },
    #[error("malformed redirect: {0}")]
    MalformedLocation(String),
    #[error("failed to decode token response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to generate {0}")]
    Crypto(&'static str),
    /// Token endpoint failure, with the broker it happened against.
    #[error("token exchange with identity broker {host} failed: {source}")]
    Broker {
        host: String,
        #[source]
        source: Box<AuthError>,
    },
}

impl AuthError {
    /// Whether a coarse retry of the whole exchange could succeed: the
    /// identity provider was unreachable or answered with a server error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TransientNetwork { .. } | Self::Transport { .. } => true,
            Self::Service { status, .. } => *status >= 500 || *status == 429,
            Self::Broker { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Error status and description returned by the identity provider, if any.
    pub fn rejection(&self) -> Option<(&str, &str)> {
        match self {
            Self::IdentityRejection { error, description } => Some((error, description)),
            Self::Broker { source, .. } => source.rejection(),
            _ => None,
        }
    }
}

/// Keep error bodies short enough for logs and messages.
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 512;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgmt_auth_core::TransportErrorKind;

    #[test]
    fn transient_classification() {
        let transport = AuthError::Transport {
            endpoint: "e".into(),
            source: TransportError::new(TransportErrorKind::Timeout, "slow"),
        };
        assert!(transport.is_transient());
        let service = |status| AuthError::Service {
            endpoint: "e".into(),
            status,
            body: String::new(),
        };
        assert!(service(503).is_transient());
        assert!(!service(401).is_transient());
        assert!(!AuthError::CsrfMismatch.is_transient());
        assert!(!AuthError::InvalidConfiguration("x".into()).is_transient());
    }

    #[test]
    fn truncates_long_bodies() {
        let long = "x".repeat(600);
        assert_eq!(truncate_body(&long).len(), 515);
        assert_eq!(truncate_body("short"), "short");
    }
}
