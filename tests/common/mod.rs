//! Shared helpers for the mock-server integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use localline::auth::MemoryStore;
use localline::{ClientConfig, LocalLineClient, RetryConfig, ServiceKey, Settings};

pub const API: &str = "/api/backoffice/v2";
pub const TOKEN_PATH: &str = "/api/backoffice/v2/token/";
pub const REFRESH_PATH: &str = "/api/backoffice/v2/token/refresh/";
pub const STORED_REFRESH: &str = "stored-refresh-7f3a";

static INIT: Once = Once::new();

/// Initialize logging for tests
pub fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Retry policy with millisecond backoff so tests stay fast.
pub fn fast_retry() -> RetryConfig {
    RetryConfig::default()
        .with_initial_backoff(Duration::from_millis(1))
        .with_max_backoff(Duration::from_millis(5))
        .with_jitter(0.0)
}

pub fn settings_for(server: &MockServer) -> Settings {
    Settings::new(&server.uri())
        .unwrap()
        .with_proof_customer("744150")
        .with_client_config(ClientConfig::default().with_retry(fast_retry()))
}

/// A client whose store already holds a refresh token.
pub fn client_with_token(server: &MockServer) -> (LocalLineClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_token(&ServiceKey::default(), STORED_REFRESH));
    let client = LocalLineClient::new(settings_for(server), store.clone()).unwrap();
    (client, store)
}

/// A client with an empty store.
pub fn client_without_token(server: &MockServer) -> (LocalLineClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let client = LocalLineClient::new(settings_for(server), store.clone()).unwrap();
    (client, store)
}

/// An unsigned JWT whose `exp` claim is `secs` from now.
pub fn jwt_expiring_in(secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + secs;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
    format!("{}.{}.sig", header, claims)
}

/// Refresh endpoint answering with `access`.
pub async fn mount_refresh(server: &MockServer, access: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access": access,
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub fn api(rest: &str) -> String {
    format!("{}/{}", API, rest.trim_start_matches('/'))
}

/// Number of requests the server received for `request_path`.
pub async fn hits(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
