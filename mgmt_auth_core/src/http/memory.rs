use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use super::client::{HttpRequest, HttpResponse, HttpTransport, TransportFuture};
use super::error::{TransportError, TransportErrorKind};

type Responder = Arc<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// In-memory HTTP client stub for testing.
///
/// URLs are matched without their query string. For each request the client
/// looks, in order, at the scripted queue for the URL, a responder closure,
/// a fixed response and finally the default response.
#[derive(Clone, Default)]
pub struct InMemoryHttpClient {
    scripted: Arc<DashMap<String, VecDeque<Result<HttpResponse, TransportError>>>>,
    responders: Arc<DashMap<String, Responder>>,
    responses: Arc<DashMap<String, HttpResponse>>,
    default_response: Option<HttpResponse>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl InMemoryHttpClient {
    /// Creates a new in-memory HTTP client with no default response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory HTTP client with a default response on miss.
    pub fn with_default(response: HttpResponse) -> Self {
        Self { default_response: Some(response), ..Self::default() }
    }

    /// Register a mock response for a specific URL.
    pub fn insert_response(&self, url: impl Into<String>, response: HttpResponse) {
        self.responses.insert(url.into(), response);
    }

    /// Queue a one-shot outcome for a URL; queued outcomes are consumed first, in order.
    pub fn push_result(
        &self,
        url: impl Into<String>,
        result: Result<HttpResponse, TransportError>,
    ) {
        self.scripted.entry(url.into()).or_default().push_back(result);
    }

    /// Compute responses for a URL from the request itself.
    pub fn respond_with<F>(&self, url: impl Into<String>, responder: F)
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        self.responders.insert(url.into(), Arc::new(responder));
    }

    /// Every request executed so far, oldest first.
    pub async fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().await.clone()
    }

    /// Requests executed so far against a URL (query string ignored).
    pub async fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| strip_query(&r.url) == url)
            .cloned()
            .collect()
    }

    fn lookup(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = strip_query(&request.url);
        if let Some(mut queue) = self.scripted.get_mut(url) {
            if let Some(result) = queue.pop_front() {
                return result;
            }
        }
        if let Some(responder) = self.responders.get(url) {
            return (responder.value())(request);
        }
        if let Some(entry) = self.responses.get(url) {
            return Ok(entry.value().clone());
        }
        if let Some(resp) = self.default_response.clone() {
            return Ok(resp);
        }
        Err(TransportError::new(TransportErrorKind::Other, format!("no mock response for {url}")))
    }
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

impl HttpTransport for InMemoryHttpClient {
    fn execute(&self, request: HttpRequest) -> TransportFuture {
        let outcome = self.lookup(&request);
        let requests = self.requests.clone();
        Box::pin(async move {
            requests.lock().await.push(request);
            outcome
        })
    }
}
