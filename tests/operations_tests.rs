//! Operation handlers end to end against a mock Local Line server.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use localline::api::Operation;
use localline::auth::MemoryStore;
use localline::models::PicklistId;
use localline::{DateRange, ErrorCode, LocalLineClient, Outcome, PicklistRequest, ServiceKey};

fn week() -> DateRange {
    DateRange::parse("2026-10-16", "2026-10-22").unwrap()
}

async fn authed(server: &MockServer) -> LocalLineClient {
    mount_refresh(server, &jwt_expiring_in(3600), 1).await;
    client_with_token(server).0
}

#[tokio::test]
async fn test_picklists_for_managed_vendors() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("vendors/")))
        .and(query_param("page_size", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": null,
            "results": [
                {"id": 11, "name": "Hillside Farm"},
                {"id": 12, "name": "Own Store Dairy", "connected": true},
                {"id": 13, "name": "River Bend", "connected": false}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("orders/create-vendor-picklists/")))
        .and(query_param("fulfillment_date_start", "2026-10-16"))
        .and(query_param("fulfillment_date_end", "2026-10-22"))
        .and(query_param("status", "OPEN"))
        .and(query_param("status", "NEEDS_APPROVAL"))
        .and(query_param("status", "CANCELLED"))
        .and(query_param("status", "CLOSED"))
        .and(body_json(json!({
            "name": "Thursday, Oct 22nd Deliveries",
            "hub_note": "Cooler 2 is out",
            "send_to_all": true,
            "vendor_ids": [11, 13],
            "copy_on_emails": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 801}, {"id": 802}])))
        .expect(1)
        .mount(&server)
        .await;
    let client = authed(&server).await;

    let created = client
        .picklists()
        .create(&PicklistRequest::new(week()).with_note("Cooler 2 is out"))
        .await
        .unwrap();

    assert_eq!(created.picklist_ids, vec![PicklistId::new("801"), PicklistId::new("802")]);
    assert_eq!(created.vendor_count, 2);
    assert_eq!(created.name, "Thursday, Oct 22nd Deliveries");
}

fn order_json(id: u32) -> Value {
    json!({
        "id": id,
        "customer": {"id": 100 + id, "name": format!("Customer {}", id)},
        "order_entries": [{"product_name": "Eggs", "quantity": "2", "price": "12.00"}],
        "subtotal": "12.00",
        "tax": "0.78",
        "total": "12.78",
        "created_at": "2026-10-14T09:30:00-04:00",
        "fulfillment_date": "2026-10-16",
        "status": "OPEN"
    })
}

async fn mount_order_pages(server: &MockServer) {
    let page = |ids: &[u32], next: Option<u32>| {
        json!({
            "count": 5,
            "next": next.map(|n| format!("{}{}?page={}", server.uri(), api("orders/"), n)),
            "results": ids.iter().map(|id| order_json(*id)).collect::<Vec<_>>(),
        })
    };
    Mock::given(method("GET"))
        .and(path(api("orders/")))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[3, 4], Some(3))))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("orders/")))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[5], None)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("orders/")))
        .and(query_param("start_date", "2026-10-16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1, 2], Some(2))))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_export_collects_every_page_in_order() {
    let server = MockServer::start().await;
    mount_order_pages(&server).await;
    let client = authed(&server).await;

    let export = client.orders().export(&week()).await.unwrap();

    let ids: Vec<&str> = export.records.iter().map(|r| r.order_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(export.records[2].customer_name.as_deref(), Some("Customer 3"));
    assert_eq!(export.records[2].total, "12.78");
    assert_eq!(export.records[2].date_placed.as_deref(), Some("2026-10-14T13:30:00Z"));
    assert_eq!(hits(&server, &api("orders/")).await, 3);
}

#[tokio::test]
async fn test_export_is_byte_identical_across_runs() {
    let server = MockServer::start().await;
    mount_order_pages(&server).await;
    let client = authed(&server).await;

    let first = client.orders().export(&week()).await.unwrap();
    let second = client.orders().export(&week()).await.unwrap();

    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(first.to_csv().unwrap(), second.to_csv().unwrap());
    assert_eq!(first.to_csv().unwrap().lines().count(), 6);
    assert!(!first.to_json().unwrap().contains(STORED_REFRESH));
}

#[tokio::test]
async fn test_export_rejects_unrecognised_list_bodies() {
    for body in [
        ResponseTemplate::new(200).set_body_json(json!({"data": [order_json(1), order_json(2)]})),
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string("<html>maintenance</html>"),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api("orders/")))
            .respond_with(body)
            .expect(1)
            .mount(&server)
            .await;
        let client = authed(&server).await;

        let err = client.orders().export(&week()).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::UpstreamUnavailable);
        assert!(err.to_string().contains("unrecognised list envelope"), "{}", err);
    }
}

#[tokio::test]
async fn test_invalid_input_makes_no_request() {
    let server = MockServer::start().await;
    let (client, _) = client_with_token(&server);

    let err = DateRange::parse("2026-10-22", "2026-10-16").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);

    let err = client.customers().send_all("  ", "<p>hi</p>").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);
    let err = client.customers().send_proof("Hi", "").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_proof_requires_configured_recipient() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::with_token(&ServiceKey::default(), STORED_REFRESH));
    let mut settings = settings_for(&server);
    settings.proof_customer_id = None;
    let client = LocalLineClient::new(settings, store).unwrap();

    let err = client.customers().send_proof("Hi", "<p>hi</p>").await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::ValidationError);
    assert!(err.to_string().contains("LOCAL_LINE_PROOF_CUSTOMER_ID"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_proof_goes_to_operator_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api("customers/email")))
        .and(query_param("id", "744150"))
        .and(body_string_contains("subject=Pickup+moved"))
        .and(body_string_contains("send_to_all=false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sent": 1})))
        .expect(1)
        .mount(&server)
        .await;
    let client = authed(&server).await;

    let receipt = client
        .customers()
        .send_proof("Pickup moved", "<p>Friday now</p>")
        .await
        .unwrap();

    assert_eq!(receipt.customer_id.as_str(), "744150");
    assert_eq!(receipt.subject, "Pickup moved");
    assert_eq!(hits(&server, &api("customers/")).await, 0);
}

async fn mount_customers(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(api("customers/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 5,
            "next": null,
            "results": [
                {"id": 1, "email": "a@example.com"},
                {"id": 2, "email": "b@example.com", "active": true},
                {"id": 3, "email": "bounced@example"},
                {"id": 4, "email": "d@example.com"},
                {"id": 5, "email": "gone@example.com", "active": false}
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_send_all_counts_failures_and_continues() {
    let server = MockServer::start().await;
    mount_customers(&server).await;
    Mock::given(method("POST"))
        .and(path(api("customers/email")))
        .and(query_param("id", "3"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "invalid email address"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("customers/email")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sent": 1})))
        .expect(3)
        .mount(&server)
        .await;
    let client = authed(&server).await;

    let report = client
        .customers()
        .send_all("Pickup moved", "<p>Friday now</p>")
        .await
        .unwrap();

    assert_eq!(report.sent, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped_inactive, 1);
    assert_eq!(report.failures[0].customer_id.as_str(), "3");
    assert_eq!(report.failures[0].code, ErrorCode::RequestInvalid);
}

#[tokio::test]
async fn test_send_all_stops_on_auth_failure() {
    let server = MockServer::start().await;
    mount_customers(&server).await;
    Mock::given(method("POST"))
        .and(path(api("customers/email")))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    // Initial token plus the single forced refresh.
    mount_refresh(&server, "access-a", 2).await;
    let (client, _) = client_with_token(&server);

    let report = client
        .customers()
        .send_all("Pickup moved", "<p>Friday now</p>")
        .await
        .unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 0);
    let abort = report.aborted.as_ref().unwrap();
    assert_eq!(abort.code, ErrorCode::AuthFailed);
    assert!(abort.fix.is_some());

    let outcome = Outcome::from_broadcast(&Ok(report));
    assert_eq!(outcome.exit_code(), 3);
}

#[tokio::test]
async fn test_send_all_reports_progress_when_customer_list_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("customers/")))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api("customers/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 4,
            "next": format!("{}{}?page=2", server.uri(), api("customers/")),
            "results": [
                {"id": 1, "email": "a@example.com"},
                {"id": 2, "email": "b@example.com"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("customers/email")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sent": 1})))
        .expect(2)
        .mount(&server)
        .await;
    let client = authed(&server).await;

    let result = client
        .customers()
        .send_all("Pickup moved", "<p>Friday now</p>")
        .await;

    let report = result.as_ref().unwrap();
    assert_eq!(report.sent, 2);
    assert!(!report.is_complete());
    assert_eq!(
        report.aborted.as_ref().unwrap().code,
        ErrorCode::UpstreamUnavailable
    );

    let outcome = Outcome::from_broadcast(&result);
    assert!(!outcome.ok);
    assert_eq!(outcome.exit_code(), 5);
    let rendered: Value = serde_json::from_str(&outcome.to_json().unwrap()).unwrap();
    assert_eq!(rendered["status"], "UPSTREAM_UNAVAILABLE");
    assert_eq!(rendered["data"]["sent"], 2);
    assert!(rendered["reason"]
        .as_str()
        .unwrap()
        .starts_with("broadcast stopped after 2 sent"));
}

#[tokio::test]
async fn test_outcome_envelopes() {
    let server = MockServer::start().await;
    let (client, _) = client_without_token(&server);

    let outcome = Outcome::from_auth_status(&client.auth().status().await);
    assert!(!outcome.ok);
    assert_eq!(outcome.exit_code(), 3);
    let rendered: Value = serde_json::from_str(&outcome.to_json().unwrap()).unwrap();
    assert_eq!(rendered["operation"], "auth.status");
    assert_eq!(rendered["status"], "AUTH_FAILED");
    assert!(rendered["fix"].as_str().unwrap().contains("auth-bootstrap"));

    let result = client.customers().send_all("", "<p>x</p>").await;
    let outcome = Outcome::from_broadcast(&result);
    assert_eq!(outcome.operation, Operation::CustomersEmailSendAll);
    assert_eq!(outcome.exit_code(), 2);
    assert_eq!(
        serde_json::to_value(&outcome).unwrap()["status"],
        "VALIDATION_ERROR"
    );
}
