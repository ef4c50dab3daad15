use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Method};
use tracing::debug;

use super::client::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, RedirectPolicy, TransportFuture,
};
use super::error::{TransportError, TransportErrorKind};
use crate::tls::TlsMaterial;

/// String to set as the user agent in HTTP requests.
static CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Connection pool and timeout settings of the HTTPS clients.
#[derive(Debug, Clone)]
pub struct ClientTuning {
    /// Timeout for new connections initialised by the client.
    pub connect_timeout: Duration,
    /// TCP keep-alive interval.
    pub keep_alive: Duration,
    /// Idle connections kept per host.
    pub max_idle_per_host: usize,
    /// Idle connections are evicted after this long.
    pub idle_timeout: Duration,
    /// Timeout for requests made by the client.
    pub request_timeout: Duration,
    /// Redirects followed by requests using [`RedirectPolicy::Follow`].
    pub max_redirects: usize,
}

impl Default for ClientTuning {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            keep_alive: Duration::from_secs(30),
            max_idle_per_host: 200,
            idle_timeout: Duration::from_secs(90),
            request_timeout: Duration::from_secs(60),
            max_redirects: 10,
        }
    }
}

/// [`HttpTransport`] backed by `reqwest`, trusting exactly what the [`TlsMaterial`] trusts.
///
/// Proxy settings are picked up from the environment (`HTTPS_PROXY`, `NO_PROXY`, ...).
#[derive(Clone)]
pub struct ReqwestHttpClient {
    follow: Client,
    no_follow: Client,
}

impl ReqwestHttpClient {
    pub fn new(material: &TlsMaterial, tuning: &ClientTuning) -> Result<Self, TransportError> {
        let follow = builder(material, tuning)
            .redirect(Policy::limited(tuning.max_redirects))
            .build()
            .map_err(TransportError::from_reqwest)?;
        let no_follow = builder(material, tuning)
            .redirect(Policy::none())
            .build()
            .map_err(TransportError::from_reqwest)?;
        debug!(?tuning, insecure = material.is_insecure(), "Initialised HTTPS client");
        Ok(Self { follow, no_follow })
    }
}

fn builder(material: &TlsMaterial, tuning: &ClientTuning) -> ClientBuilder {
    Client::builder()
        .use_preconfigured_tls((*material.client_config()).clone())
        .connect_timeout(tuning.connect_timeout)
        .tcp_keepalive(tuning.keep_alive)
        .pool_max_idle_per_host(tuning.max_idle_per_host)
        .pool_idle_timeout(tuning.idle_timeout)
        .timeout(tuning.request_timeout)
        .user_agent(CLIENT_USER_AGENT)
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::GET => Method::GET,
            HttpMethod::POST => Method::POST,
            HttpMethod::PUT => Method::PUT,
            HttpMethod::PATCH => Method::PATCH,
            HttpMethod::DELETE => Method::DELETE,
        }
    }
}

impl HttpTransport for ReqwestHttpClient {
    fn execute(&self, request: HttpRequest) -> TransportFuture {
        let client = match request.redirect_policy {
            RedirectPolicy::None => self.no_follow.clone(),
            RedirectPolicy::Follow => self.follow.clone(),
        };
        Box::pin(async move {
            let mut builder = client.request(request.method.into(), &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }

            let response = builder.send().await.map_err(TransportError::from_reqwest)?;
            let status = response.status().as_u16();
            let mut headers = Vec::with_capacity(response.headers().len());
            for (name, value) in response.headers() {
                let value = value.to_str().map_err(|e| {
                    TransportError::new(TransportErrorKind::Body, format!("header {name}: {e}"))
                })?;
                headers.push((name.as_str().to_string(), value.to_string()));
            }
            let body = response.bytes().await.map_err(TransportError::from_reqwest)?;
            Ok(HttpResponse { status, headers, body: body.to_vec() })
        })
    }
}
