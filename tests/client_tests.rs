//! Resilient request execution and pagination against a mock server.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::Method;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use common::*;
use localline::auth::MemoryStore;
use localline::client::Payload;
use localline::models::Vendor;
use localline::{ClientConfig, Error, ErrorCode, LocalLineClient, RetryConfig, ServiceKey};

/// Responder that plays `responses` in order, repeating the last one.
fn sequence(
    responses: Vec<ResponseTemplate>,
) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync + 'static {
    let calls = Arc::new(AtomicUsize::new(0));
    move |_req: &Request| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        responses[n.min(responses.len() - 1)].clone()
    }
}

async fn authed(server: &MockServer) -> LocalLineClient {
    mount_refresh(server, &jwt_expiring_in(3600), 1).await;
    client_with_token(server).0
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("vendors/")))
        .respond_with(sequence(vec![
            ResponseTemplate::new(429).insert_header("retry-after", "1"),
            ResponseTemplate::new(429),
            ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])),
        ]))
        .expect(3)
        .mount(&server)
        .await;
    let client = authed(&server).await;

    let started = Instant::now();
    let vendors = client.vendors().list().await.unwrap();

    assert_eq!(vendors.len(), 2);
    // The announced Retry-After is honoured.
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_rate_limit_without_retry_after_backs_off() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("vendors/")))
        .respond_with(sequence(vec![
            ResponseTemplate::new(429),
            ResponseTemplate::new(429),
            ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])),
        ]))
        .expect(3)
        .mount(&server)
        .await;
    mount_refresh(&server, &jwt_expiring_in(3600), 1).await;
    let retry = RetryConfig::default()
        .with_initial_backoff(Duration::from_millis(250))
        .with_max_backoff(Duration::from_secs(2));
    let settings = settings_for(&server).with_client_config(ClientConfig::default().with_retry(retry));
    let store = Arc::new(MemoryStore::with_token(&ServiceKey::default(), STORED_REFRESH));
    let client = LocalLineClient::new(settings, store).unwrap();

    let started = Instant::now();
    client.vendors().list().await.unwrap();

    // 250 ms then 500 ms; jitter only ever lengthens the wait.
    assert!(started.elapsed() >= Duration::from_millis(750));
}

#[tokio::test]
async fn test_rate_limit_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("vendors/")))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .expect(4)
        .mount(&server)
        .await;
    let client = authed(&server).await;

    let err = client.vendors().list().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::RateLimited);
    assert!(matches!(
        err,
        Error::RateLimited {
            attempts: 4,
            retry_after_secs: Some(0)
        }
    ));
}

#[tokio::test]
async fn test_server_errors_retry_then_surface() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("vendors/")))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "maintenance"})))
        .expect(4)
        .mount(&server)
        .await;
    let client = authed(&server).await;

    let err = client.vendors().list().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::UpstreamUnavailable);
    assert!(err.to_string().contains("maintenance"));
}

#[tokio::test]
async fn test_transient_server_error_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("vendors/")))
        .respond_with(sequence(vec![
            ResponseTemplate::new(502),
            ResponseTemplate::new(200).set_body_json(json!([{"id": 5}])),
        ]))
        .expect(2)
        .mount(&server)
        .await;
    let client = authed(&server).await;

    assert_eq!(client.vendors().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api("orders/create-vendor-picklists/")))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"detail": "batch already exists"})))
        .expect(1)
        .mount(&server)
        .await;
    let client = authed(&server).await;

    let err = client
        .request(
            Method::POST,
            "orders/create-vendor-picklists/",
            &[],
            Payload::Json(json!({"name": "x"})),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::RequestInvalid);
    match err {
        Error::RequestInvalid {
            status,
            message,
            body,
        } => {
            assert_eq!(status, 409);
            assert_eq!(message, "batch already exists");
            assert_eq!(body["detail"], "batch already exists");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_refreshes_once_and_replays() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("vendors/")))
        .respond_with(sequence(vec![
            ResponseTemplate::new(401),
            ResponseTemplate::new(200).set_body_json(json!([{"id": 9}])),
        ]))
        .expect(2)
        .mount(&server)
        .await;
    // One refresh to obtain the first token, one forced by the 401.
    mount_refresh(&server, "access-a", 2).await;
    let (client, _) = client_with_token(&server);

    let vendors = client.vendors().list().await.unwrap();
    assert_eq!(vendors[0].id.as_str(), "9");
}

#[tokio::test]
async fn test_second_unauthorized_is_auth_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("vendors/")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "nope"})))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(&server, "access-a", 2).await;
    let (client, _) = client_with_token(&server);

    let err = client.vendors().list().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AuthFailed);
    assert!(err.fix().is_some());
}

#[tokio::test]
async fn test_forbidden_is_treated_like_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("vendors/")))
        .respond_with(sequence(vec![
            ResponseTemplate::new(403),
            ResponseTemplate::new(200).set_body_json(json!([])),
        ]))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(&server, "access-a", 2).await;
    let (client, _) = client_with_token(&server);

    assert!(client.vendors().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_json_and_empty_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api("customers/email")))
        .respond_with(ResponseTemplate::new(200).set_body_string("Email queued"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("noop/")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    let client = authed(&server).await;

    let body = client
        .request(Method::POST, "customers/email", &[], Payload::None)
        .await
        .unwrap();
    assert_eq!(body, json!({"raw": "Email queued"}));

    let body = client
        .request(Method::POST, "noop/", &[], Payload::None)
        .await
        .unwrap();
    assert_eq!(body, Value::Null);
}

fn orders_page(server: &MockServer, ids: &[u32], next: Option<u32>) -> Value {
    json!({
        "count": 5,
        "next": next.map(|n| format!("{}{}?page={}", server.uri(), api("orders/"), n)),
        "previous": null,
        "results": ids.iter().map(|id| json!({"id": id, "total": "10.00"})).collect::<Vec<_>>(),
    })
}

async fn mount_three_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(api("orders/")))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(orders_page(server, &[3, 4], Some(3))))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("orders/")))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(orders_page(server, &[5], None)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("orders/")))
        .and(query_param("start_date", "2026-10-16"))
        .and(query_param("end_date", "2026-10-22"))
        .and(query_param("expand", "order_entries.package_price_list_entry"))
        .and(query_param("page_size", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(orders_page(server, &[1, 2], Some(2))))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pages_stream_in_order() {
    let server = MockServer::start().await;
    mount_three_pages(&server).await;
    let client = authed(&server).await;
    let range = localline::DateRange::parse("2026-10-16", "2026-10-22").unwrap();

    let mut pages = client.orders().pages(&range).unwrap();
    let mut sizes = Vec::new();
    while let Some(page) = pages.next().await {
        sizes.push(page.unwrap().items.len());
    }

    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(pages.pages_fetched(), 3);
    assert_eq!(hits(&server, &api("orders/")).await, 3);
}

#[tokio::test]
async fn test_early_stop_and_resume() {
    let server = MockServer::start().await;
    mount_three_pages(&server).await;
    let client = authed(&server).await;
    let range = localline::DateRange::parse("2026-10-16", "2026-10-22").unwrap();

    let mut pages = client.orders().pages(&range).unwrap();
    let first = pages.next().await.unwrap().unwrap();
    let cursor = first.next.clone().unwrap();
    drop(pages);
    assert_eq!(hits(&server, &api("orders/")).await, 1);

    let rest = client
        .resume::<localline::models::OrderRecord>(&cursor)
        .unwrap()
        .collect_items()
        .await
        .unwrap();
    let ids: Vec<&str> = rest.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["3", "4", "5"]);
}

#[tokio::test]
async fn test_foreign_next_link_is_not_followed() {
    let server = MockServer::start().await;
    let elsewhere = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("vendors/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": format!("{}/collect?page=2", elsewhere.uri()),
            "results": [{"id": 1}],
        })))
        .mount(&server)
        .await;
    let client = authed(&server).await;

    let mut stream = client.vendors().stream().unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.items.len(), 1);
    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::UpstreamUnavailable);
    assert!(elsewhere.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_generic_paginate_decodes_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("vendors/")))
        .and(query_param("connected", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "name": "Hillside Farm", "connected": false}
        ])))
        .mount(&server)
        .await;
    let client = authed(&server).await;

    let vendors: Vec<Vendor> = client
        .paginate("vendors/", &[("connected", "false".to_string())])
        .unwrap()
        .collect_items()
        .await
        .unwrap();
    assert_eq!(vendors[0].name.as_deref(), Some("Hillside Farm"));
}
