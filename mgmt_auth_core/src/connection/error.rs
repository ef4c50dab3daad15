use crate::http::TransportError;

use super::hook::HookError;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
    #[error("pre-request credential refresh failed: {0}")]
    Hook(#[source] HookError),
    #[error("failed to initialise the HTTP client: {0}")]
    ClientBuild(#[source] TransportError),
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
