use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mgmt_auth::{
    AuthConfig, AuthError, AuthenticationContext, ConnectionError, ContextError, DeploymentMode,
    RetryPolicy,
};
use mgmt_auth_core::{HttpRequest, HttpResponse, InMemoryHttpClient};
use mgmt_auth_lib::decode_url_owned;
use serde_json::json;

const SAAS_TOKEN: &str = "https://id.example/csp/gateway/am/api/auth/api-tokens/authorize";
const BROKER_AUTHORIZE: &str =
    "https://pinniped-supervisor.mgmt.local/provider/pinniped/oauth2/authorize";
const BROKER_TOKEN: &str =
    "https://pinniped-supervisor.mgmt.local/provider/pinniped/oauth2/token";

fn config(pairs: &[(&str, &str)]) -> AuthConfig {
    let env: HashMap<String, String> =
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    AuthConfig::from_lookup(|key| env.get(key).cloned()).unwrap()
}

fn saas_config() -> AuthConfig {
    config(&[
        ("MGMT_SERVER_ENDPOINT", "api.example.com:8443"),
        ("MGMT_IDENTITY_ENDPOINT", "id.example"),
        ("MGMT_REFRESH_TOKEN", "R"),
        ("MGMT_PROJECT_ID", "p1"),
    ])
}

fn self_managed_config() -> AuthConfig {
    config(&[
        ("MGMT_SERVER_ENDPOINT", "https://mgmt.local"),
        ("MGMT_USERNAME", "admin"),
        ("MGMT_PASSWORD", "pw"),
    ])
}

fn token(access: &str) -> HttpResponse {
    let body = serde_json::to_vec(&json!({ "access_token": access })).unwrap();
    HttpResponse::new(200).with_body(body)
}

fn state_of(request: &HttpRequest) -> String {
    request
        .url
        .split_once('?')
        .map(|(_, q)| q)
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "state")
        .map(|(_, v)| decode_url_owned(v))
        .unwrap_or_default()
}

/// Broker that accepts every login and hands out ACCESS-1, ACCESS-2, ...
fn fake_broker(client: &InMemoryHttpClient) -> Arc<AtomicUsize> {
    client.respond_with(BROKER_AUTHORIZE, |request| {
        Ok(HttpResponse::new(302).with_header(
            "Location",
            format!("http://127.0.0.1/callback?code=C&state={}", state_of(request)),
        ))
    });
    let issued = Arc::new(AtomicUsize::new(0));
    let counter = issued.clone();
    client.respond_with(BROKER_TOKEN, move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let body = json!({
            "access_token": format!("ACCESS-{n}"),
            "refresh_token": "REFRESH",
            "id_token": "ID",
            "token_type": "Bearer"
        });
        Ok(HttpResponse::new(200).with_body(serde_json::to_vec(&body).unwrap()))
    });
    issued
}

#[tokio::test]
async fn saas_setup_installs_headers_without_hook() {
    let client = InMemoryHttpClient::new();
    client.insert_response(SAAS_TOKEN, token("T"));

    let mut context = AuthenticationContext::with_client(saas_config(), client.clone()).unwrap();
    assert_eq!(context.mode(), DeploymentMode::Saas);
    let connection = context.setup().await.unwrap();

    let headers = connection.headers().await;
    assert_eq!(headers.get("authorization"), Some("Bearer T"));
    assert_eq!(headers.get("Host"), Some("api.example.com:8443"));
    assert_eq!(headers.get("x-project-id"), Some("p1"));
    assert!(!connection.has_pre_request_hook().await);
    assert_eq!(connection.endpoint(), "https://api.example.com:8443");
}

#[tokio::test]
async fn saas_api_calls_carry_the_token() {
    let client = InMemoryHttpClient::new();
    client.insert_response(SAAS_TOKEN, token("T"));
    client.insert_response("https://api.example.com:8443/v1/clusters", HttpResponse::new(200));

    let mut context = AuthenticationContext::with_client(saas_config(), client.clone()).unwrap();
    let connection = context.setup().await.unwrap();
    let response = connection.send(connection.get("/v1/clusters")).await.unwrap();
    assert_eq!(response.status, 200);

    let calls = client.requests_to("https://api.example.com:8443/v1/clusters").await;
    assert_eq!(calls[0].header_value("authorization"), Some("Bearer T"));
    assert_eq!(client.requests_to(SAAS_TOKEN).await.len(), 1);
}

#[tokio::test]
async fn saas_refresh_follows_the_predicate() {
    let client = InMemoryHttpClient::new();
    client.push_result(SAAS_TOKEN, Ok(token("T1")));
    client.insert_response(SAAS_TOKEN, token("T2"));

    let mut context = AuthenticationContext::with_client(saas_config(), client.clone()).unwrap();
    let connection = context.setup().await.unwrap();

    let observed = 403u16;
    assert!(!context.refresh_if_needed(|status: &u16| *status == 401, &observed).await.unwrap());
    assert_eq!(connection.headers().await.get("authorization"), Some("Bearer T1"));
    assert_eq!(client.requests_to(SAAS_TOKEN).await.len(), 1);

    let observed = 401u16;
    assert!(context.refresh_if_needed(|status: &u16| *status == 401, &observed).await.unwrap());
    let headers = connection.headers().await;
    assert_eq!(headers.get("authorization"), Some("Bearer T2"));
    assert_eq!(headers.get("Host"), Some("api.example.com:8443"));
    assert_eq!(client.requests_to(SAAS_TOKEN).await.len(), 2);
}

#[tokio::test]
async fn saas_outer_retry_masks_service_outage() {
    let client = InMemoryHttpClient::new();
    client.push_result(SAAS_TOKEN, Ok(HttpResponse::new(503)));
    client.push_result(SAAS_TOKEN, Ok(HttpResponse::new(502)));
    client.insert_response(SAAS_TOKEN, token("T"));

    let mut context = AuthenticationContext::with_client(saas_config(), client.clone())
        .unwrap()
        .with_retry_policy(RetryPolicy::new(3, Duration::ZERO));
    context.setup().await.unwrap();
    assert_eq!(client.requests_to(SAAS_TOKEN).await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn saas_default_retry_gives_up_after_three_attempts() {
    let client = InMemoryHttpClient::new();
    client.insert_response(SAAS_TOKEN, HttpResponse::new(503));

    let mut context = AuthenticationContext::with_client(saas_config(), client.clone()).unwrap();
    let err = context.setup().await.unwrap_err();
    match &err {
        ContextError::Auth { mode, endpoint, source } => {
            assert_eq!(*mode, DeploymentMode::Saas);
            assert_eq!(endpoint, "id.example");
            assert!(matches!(source, AuthError::Service { status: 503, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.requests_to(SAAS_TOKEN).await.len(), 3);
    assert!(!context.is_set_up());
}

#[tokio::test]
async fn saas_rejection_is_not_retried() {
    let client = InMemoryHttpClient::new();
    client.insert_response(SAAS_TOKEN, HttpResponse::new(401).with_body("invalid refresh token"));

    let mut context = AuthenticationContext::with_client(saas_config(), client.clone()).unwrap();
    let err = context.setup().await.unwrap_err();
    assert!(matches!(err.auth_error(), Some(AuthError::Service { status: 401, .. })));
    assert_eq!(client.requests_to(SAAS_TOKEN).await.len(), 1);
}

#[tokio::test]
async fn refresh_before_setup_is_an_error() {
    let context =
        AuthenticationContext::with_client(saas_config(), InMemoryHttpClient::new()).unwrap();
    let err = context.refresh_if_needed(|_: &()| true, &()).await.unwrap_err();
    assert!(matches!(err, ContextError::NotSetUp));
}

#[tokio::test]
async fn teardown_drops_the_connection() {
    let client = InMemoryHttpClient::new();
    client.insert_response(SAAS_TOKEN, token("T"));

    let mut context = AuthenticationContext::with_client(saas_config(), client).unwrap();
    context.setup().await.unwrap();
    assert!(context.connection().is_ok());
    context.teardown();
    assert!(matches!(context.connection(), Err(ContextError::NotSetUp)));
}

#[tokio::test]
async fn self_managed_setup_installs_broker_headers_and_hook() {
    let client = InMemoryHttpClient::new();
    fake_broker(&client);

    let mut context =
        AuthenticationContext::with_client(self_managed_config(), client.clone()).unwrap();
    assert_eq!(context.mode(), DeploymentMode::SelfManaged);
    let connection = context.setup().await.unwrap();

    let headers = connection.headers().await;
    assert_eq!(headers.get("authorization"), Some("Bearer ACCESS-1"));
    assert_eq!(headers.get("x-refresh-token"), Some("REFRESH"));
    assert_eq!(headers.get("x-id-token"), Some("ID"));
    assert_eq!(headers.get("Host"), Some("mgmt.local"));
    assert!(headers.get("x-project-id").is_none());
    assert!(connection.has_pre_request_hook().await);
}

#[tokio::test]
async fn self_managed_logs_in_before_every_call() {
    let client = InMemoryHttpClient::new();
    let issued = fake_broker(&client);
    client.insert_response("https://mgmt.local/v1/clusters", HttpResponse::new(200));

    let mut context =
        AuthenticationContext::with_client(self_managed_config(), client.clone()).unwrap();
    let connection = context.setup().await.unwrap();
    connection.send(connection.get("v1/clusters")).await.unwrap();
    connection.send(connection.get("v1/clusters")).await.unwrap();

    assert_eq!(issued.load(Ordering::SeqCst), 3);
    let calls = client.requests_to("https://mgmt.local/v1/clusters").await;
    assert_eq!(calls[0].header_value("authorization"), Some("Bearer ACCESS-2"));
    assert_eq!(calls[1].header_value("authorization"), Some("Bearer ACCESS-3"));
    assert_eq!(calls[1].header_value("Host"), Some("mgmt.local"));
}

#[tokio::test]
async fn self_managed_refresh_is_a_no_op() {
    let client = InMemoryHttpClient::new();
    let issued = fake_broker(&client);

    let mut context = AuthenticationContext::with_client(self_managed_config(), client).unwrap();
    context.setup().await.unwrap();
    assert!(!context.refresh_if_needed(|_: &()| true, &()).await.unwrap());
    assert_eq!(issued.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_hook_aborts_the_call() {
    let client = InMemoryHttpClient::new();
    fake_broker(&client);
    client.insert_response("https://mgmt.local/v1/clusters", HttpResponse::new(200));

    let mut context =
        AuthenticationContext::with_client(self_managed_config(), client.clone()).unwrap();
    let connection = context.setup().await.unwrap();

    client.push_result(BROKER_AUTHORIZE, Ok(HttpResponse::new(200)));
    let err = connection.send(connection.get("v1/clusters")).await.unwrap_err();
    assert!(matches!(err, ConnectionError::Hook(_)));
    assert!(err.to_string().contains("expected to be redirected"));
    assert!(client.requests_to("https://mgmt.local/v1/clusters").await.is_empty());
}

#[tokio::test]
async fn self_managed_rejection_reports_the_broker() {
    let client = InMemoryHttpClient::new();
    client.respond_with(BROKER_AUTHORIZE, |request| {
        Ok(HttpResponse::new(302).with_header(
            "Location",
            format!(
                "http://127.0.0.1/callback?error=access_denied\
                 &error_description=bad+password&state={}",
                state_of(request)
            ),
        ))
    });

    let mut context =
        AuthenticationContext::with_client(self_managed_config(), client.clone()).unwrap();
    let err = context.setup().await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("self-managed"), "{message}");
    assert!(message.contains("pinniped-supervisor.mgmt.local"), "{message}");
    assert_eq!(
        err.auth_error().and_then(AuthError::rejection),
        Some(("access_denied", "bad password"))
    );
    assert!(client.requests_to(BROKER_TOKEN).await.is_empty());
}
