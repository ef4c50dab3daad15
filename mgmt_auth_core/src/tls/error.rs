use std::io;

use rustls::pki_types::pem;

/// Failures while turning operator supplied TLS inputs into trust material.
///
/// Every variant is a configuration error: none of them is worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("client certificate is set but the client key is missing")]
    MissingKey,
    #[error("client certificate file is set but the client key file is missing")]
    MissingKeyFile,
    #[error("client key is set but the client certificate is missing")]
    MissingCert,
    #[error("client key file is set but the client certificate file is missing")]
    MissingCertFile,
    #[error("failed to load {what}: {source}")]
    LoadFailure {
        what: &'static str,
        #[source]
        source: LoadCause,
    },
    #[error("failed to append {source_kind} CA certificates to the trust pool")]
    AppendFailed { source_kind: &'static str },
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
}

/// Underlying reason a certificate or key could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadCause {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("PEM error: {0}")]
    Pem(#[from] pem::Error),
    #[error("no certificates found")]
    Empty,
    #[error("certificate and key do not form a usable pair: {0}")]
    Pair(rustls::Error),
}

impl TrustError {
    pub(crate) fn load(what: &'static str, cause: impl Into<LoadCause>) -> Self {
        Self::LoadFailure { what, source: cause.into() }
    }
}

pub type Result<T> = std::result::Result<T, TrustError>;
