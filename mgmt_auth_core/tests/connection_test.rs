use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mgmt_auth_core::{
    Connection, ConnectionError, HeaderSet, HookError, HttpResponse, InMemoryHttpClient,
    PreRequestHook, TransportError,
};

const API: &str = "https://api.local";

struct CountingHook {
    calls: AtomicUsize,
}

#[async_trait]
impl PreRequestHook for CountingHook {
    async fn before_request(&self) -> Result<HeaderSet, HookError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(HeaderSet::new().with("authorization", format!("Bearer token-{n}")))
    }
}

struct FailingHook;

#[async_trait]
impl PreRequestHook for FailingHook {
    async fn before_request(&self) -> Result<HeaderSet, HookError> {
        Err("broker unavailable".into())
    }
}

#[tokio::test]
async fn test_applied_headers_are_sent() {
    let client = InMemoryHttpClient::with_default(HttpResponse::new(200));
    let conn = Connection::new(API, client.clone());
    conn.apply_headers(HeaderSet::new().with("authorization", "Bearer a").with("Host", "api.local"))
        .await;
    conn.apply_headers(HeaderSet::new().with("Authorization", "Bearer b")).await;

    let response = conn.send(conn.get("/v1/clusters")).await.unwrap();
    assert_eq!(response.status, 200);

    let sent = client.requests().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].url, "https://api.local/v1/clusters");
    assert_eq!(sent[0].header_value("authorization"), Some("Bearer b"));
    assert_eq!(sent[0].header_value("host"), Some("api.local"));
}

#[tokio::test]
async fn test_request_headers_override_connection_headers() {
    let client = InMemoryHttpClient::with_default(HttpResponse::new(201));
    let conn = Connection::new(format!("{API}/"), client.clone());
    conn.apply_headers(HeaderSet::new().with("Content-Type", "text/plain")).await;

    conn.send(conn.post("v1/clusters", b"{}".to_vec())).await.unwrap();
    let sent = client.requests().await;
    assert_eq!(sent[0].url, "https://api.local/v1/clusters");
    assert_eq!(sent[0].header_value("content-type"), Some("application/json"));
}

#[tokio::test]
async fn test_hook_runs_before_every_call() {
    let client = InMemoryHttpClient::with_default(HttpResponse::new(200));
    let conn = Connection::new(API, client.clone());
    let hook = Arc::new(CountingHook { calls: AtomicUsize::new(0) });
    conn.set_pre_request_hook(hook.clone()).await;
    assert!(conn.has_pre_request_hook().await);

    conn.send(conn.get("/a")).await.unwrap();
    conn.send(conn.get("/b")).await.unwrap();

    assert_eq!(hook.calls.load(Ordering::SeqCst), 2);
    let sent = client.requests().await;
    assert_eq!(sent[0].header_value("authorization"), Some("Bearer token-1"));
    assert_eq!(sent[1].header_value("authorization"), Some("Bearer token-2"));
}

#[tokio::test]
async fn test_hook_failure_aborts_the_call() {
    let client = InMemoryHttpClient::with_default(HttpResponse::new(200));
    let conn = Connection::new(API, client.clone());
    conn.set_pre_request_hook(Arc::new(FailingHook)).await;

    let err = conn.send(conn.get("/a")).await.unwrap_err();
    assert!(matches!(err, ConnectionError::Hook(_)));
    assert!(client.requests().await.is_empty());
}

#[tokio::test]
async fn test_credentials_stay_on_the_endpoint() {
    let client = InMemoryHttpClient::with_default(HttpResponse::new(200));
    let conn = Connection::new(API, client.clone());
    let hook = Arc::new(CountingHook { calls: AtomicUsize::new(0) });
    conn.set_pre_request_hook(hook.clone()).await;
    conn.apply_headers(HeaderSet::new().with("x-refresh-token", "R")).await;

    conn.send(conn.get("https://elsewhere.example/a").header("Accept", "*/*"))
        .await
        .unwrap();
    conn.send(conn.get("https://api.local.elsewhere.example/a")).await.unwrap();
    conn.send(conn.get("https://API.local/v1/clusters")).await.unwrap();

    let sent = client.requests().await;
    assert_eq!(sent[0].headers, vec![("Accept".to_string(), "*/*".to_string())]);
    assert!(sent[1].headers.is_empty());
    assert_eq!(sent[2].header_value("authorization"), Some("Bearer token-1"));
    assert_eq!(sent[2].header_value("x-refresh-token"), Some("R"));
    assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transport_errors_carry_the_url() {
    let client = InMemoryHttpClient::new();
    client.push_result(
        "https://api.local/a",
        Err(TransportError::socket_connect("connection refused")),
    );
    let conn = Connection::new(API, client);
    match conn.send(conn.get("/a")).await {
        Err(ConnectionError::Transport { url, source }) => {
            assert_eq!(url, "https://api.local/a");
            assert!(source.is_socket_connect());
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_concurrent_readers_never_see_partial_updates() {
    let client = InMemoryHttpClient::with_default(HttpResponse::new(200));
    let conn = Arc::new(Connection::new(API, client));

    let writer = {
        let conn = conn.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                let v = i.to_string();
                let update =
                    HeaderSet::new().with("authorization", v.clone()).with("x-id-token", v);
                conn.apply_headers(update).await;
            }
        })
    };
    for _ in 0..200 {
        let snapshot = conn.headers().await;
        assert_eq!(snapshot.get("authorization"), snapshot.get("x-id-token"));
    }
    writer.await.unwrap();
}
