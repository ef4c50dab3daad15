use async_trait::async_trait;

use crate::headers::HeaderSet;

/// Error type returned by pre-request hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Runs before every call sent through a [`Connection`](super::Connection).
///
/// The returned headers are applied to the connection before the call is sent.
/// A failure aborts the call.
#[async_trait]
pub trait PreRequestHook: Send + Sync + 'static {
    async fn before_request(&self) -> Result<HeaderSet, HookError>;
}
