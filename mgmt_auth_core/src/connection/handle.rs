use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::error::{ConnectionError, Result};
use super::hook::PreRequestHook;
use crate::headers::HeaderSet;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

/// Shared handle to the management API.
///
/// Owns the transport, the authentication headers every call carries and an
/// optional hook that refreshes those headers before each call. Header updates
/// happen under a single write guard, so concurrent calls see either the
/// previous or the new header set, never a mix.
pub struct Connection<T: HttpTransport> {
    endpoint: String,
    transport: T,
    headers: RwLock<HeaderSet>,
    hook: RwLock<Option<Arc<dyn PreRequestHook>>>,
}

impl<T: HttpTransport> Connection<T> {
    /// Create a connection to `endpoint` (scheme included, trailing slash optional).
    pub fn new(endpoint: impl Into<String>, transport: T) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            endpoint,
            transport,
            headers: RwLock::new(HeaderSet::new()),
            hook: RwLock::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Replace the values of the given headers, keeping every other header.
    pub async fn apply_headers(&self, headers: HeaderSet) {
        let mut current = self.headers.write().await;
        current.merge(headers);
    }

    /// Snapshot of the headers the next call would carry.
    pub async fn headers(&self) -> HeaderSet {
        self.headers.read().await.clone()
    }

    pub async fn set_pre_request_hook(&self, hook: Arc<dyn PreRequestHook>) {
        *self.hook.write().await = Some(hook);
    }

    pub async fn has_pre_request_hook(&self) -> bool {
        self.hook.read().await.is_some()
    }

    /// Start a GET request to the API server.
    pub fn get(&self, uri: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::GET, uri)
    }

    /// Start a POST request to the API server.
    pub fn post(&self, uri: &str, body: impl Into<Vec<u8>>) -> HttpRequest {
        HttpRequest::new(HttpMethod::POST, uri)
            .header("Content-Type", "application/json")
            .body(body)
    }

    /// Start a DELETE request to the API server.
    pub fn delete(&self, uri: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::DELETE, uri)
    }

    /// Send a request to the API server.
    ///
    /// Relative URLs are resolved against the endpoint. Headers set on the
    /// request win over connection headers with the same name. Absolute URLs
    /// outside the endpoint are sent with the request headers only; the hook
    /// does not run for them.
    #[instrument(skip(self, request), fields(method = %request.method), level = "debug")]
    pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let is_absolute =
            request.url.starts_with("http://") || request.url.starts_with("https://");
        if !is_absolute {
            request.url = format!("{}/{}", self.endpoint, request.url.trim_start_matches('/'));
        }

        if self.is_own_url(&request.url) {
            let hook = self.hook.read().await.clone();
            if let Some(hook) = hook {
                let fresh = hook.before_request().await.map_err(|error| {
                    warn!(%error, "Pre-request hook failed, call not sent");
                    ConnectionError::Hook(error)
                })?;
                self.apply_headers(fresh).await;
            }
            let mut headers = self.headers().await;
            headers.merge(request.headers.drain(..).collect());
            request.headers = headers.into_iter().collect();
        } else {
            debug!("URL is outside the endpoint, connection headers not attached");
        }

        let url = request.url.clone();
        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|source| ConnectionError::Transport { url, source })?;
        debug!(status = response.status, "API call completed");
        Ok(response)
    }

    /// Whether `url` is the endpoint itself or lies below it.
    fn is_own_url(&self, url: &str) -> bool {
        let Some(prefix) = url.get(..self.endpoint.len()) else {
            return false;
        };
        prefix.eq_ignore_ascii_case(&self.endpoint)
            && matches!(url.as_bytes().get(self.endpoint.len()), None | Some(b'/' | b'?' | b'#'))
    }
}

impl<T: HttpTransport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
