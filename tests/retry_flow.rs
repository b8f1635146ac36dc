//! Integration tests for the failed-delivery outbox and the retry pass.
//!
//! Each test runs against a wiremock notification service and a scratch
//! outbox file, driving the same components the daemon wires together:
//! queue on create failure, redeliver on drain, escalate after the attempt
//! ceiling, and never let a broken drain propagate.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notifyd::client::NotificationClient;
use notifyd::delivery::{DeliveryOutcome, DeliveryService};
use notifyd::jobs::retry::drain_outbox;
use notifyd::models::notification::{CreateNotification, FailedDelivery, NotificationKind};
use notifyd::notification::system::SystemEmitter;
use notifyd::outbox::Outbox;
use notifyd::store::NotificationStore;

const MAX_ATTEMPTS: u32 = 3;

fn scratch_outbox(tag: &str) -> (Outbox, PathBuf) {
    let path =
        std::env::temp_dir().join(format!("notifyd-retry-{tag}-{}.json", uuid::Uuid::new_v4()));
    (Outbox::new(&path), path)
}

fn client_for(server: &MockServer) -> Arc<NotificationClient> {
    Arc::new(NotificationClient::new(
        format!("{}/api/v1", server.uri()),
        None,
    ))
}

fn request(title: &str) -> CreateNotification {
    CreateNotification::new("u1", NotificationKind::TaskAssigned, title, "msg")
        .with_data(json!({"taskId": "T-1"}))
}

fn created_response(id: &str, kind: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(json!({
        "id": id,
        "userId": "u1",
        "type": kind,
        "title": "t",
        "message": "m",
        "read": false,
        "createdAt": "2026-08-06T10:00:00Z"
    }))
}

#[tokio::test]
async fn failed_create_is_queued_with_zero_attempts() {
    // nothing listens on port 1: create fails, send() parks the request
    let client = Arc::new(NotificationClient::new("http://127.0.0.1:1/api/v1", None));
    let store = NotificationStore::new(client, "u1");
    let (outbox, path) = scratch_outbox("queue");
    let delivery = DeliveryService::new(store, outbox.clone());

    let cmd = request("unreachable");
    let key = cmd.idempotency_key;
    let outcome = delivery.send(cmd).await.unwrap();
    assert!(matches!(outcome, DeliveryOutcome::Queued));

    let queued = outbox.load().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].attempts, 0);
    assert_eq!(queued[0].request.idempotency_key, key);
    assert_eq!(queued[0].request.title, "unreachable");

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn successful_retry_removes_entry_and_emits_recovery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/notifications"))
        .and(body_partial_json(json!({"type": "task_assigned"})))
        .respond_with(created_response("n-redelivered", "task_assigned"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/notifications"))
        .and(body_partial_json(json!({"type": "system_recovery"})))
        .respond_with(created_response("sys-1", "system_recovery"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let emitter = SystemEmitter::new(client.clone(), "u1");
    let (outbox, outbox_path) = scratch_outbox("recover");
    outbox.append(FailedDelivery::new(request("parked"))).await.unwrap();

    let outcome = drain_outbox(&client, &outbox, &emitter, MAX_ATTEMPTS).await;
    assert_eq!(outcome.delivered.len(), 1);
    assert_eq!(outcome.still_failed, 0);
    assert_eq!(outcome.escalated, 0);
    assert!(outbox.load().await.unwrap().is_empty());

    // empty queue: the next drain is a no-op with zero network calls, so
    // the expect(1) counts above still hold when the server verifies
    let outcome = drain_outbox(&client, &outbox, &emitter, MAX_ATTEMPTS).await;
    assert!(outcome.delivered.is_empty());

    let _ = std::fs::remove_file(&outbox_path);
}

#[tokio::test]
async fn failed_retry_increments_attempts_until_escalation() {
    let server = MockServer::start().await;
    // the user-facing create keeps failing
    Mock::given(method("POST"))
        .and(path("/api/v1/notifications"))
        .and(body_partial_json(json!({"type": "task_assigned"})))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;
    // the escalation goes through
    Mock::given(method("POST"))
        .and(path("/api/v1/notifications"))
        .and(body_partial_json(json!({"type": "system_error"})))
        .respond_with(created_response("sys-err", "system_error"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let emitter = SystemEmitter::new(client.clone(), "u1");
    let (outbox, outbox_path) = scratch_outbox("escalate");

    let cmd = request("doomed");
    let key = cmd.idempotency_key.to_string();
    outbox.append(FailedDelivery::new(cmd)).await.unwrap();

    for expected_attempts in 1..=MAX_ATTEMPTS {
        let outcome = drain_outbox(&client, &outbox, &emitter, MAX_ATTEMPTS).await;
        assert!(outcome.delivered.is_empty());
        assert_eq!(outcome.still_failed, 1);
        let queued = outbox.load().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].attempts, expected_attempts);
    }

    // fourth pass: ceiling reached, entry dropped and escalated once
    let outcome = drain_outbox(&client, &outbox, &emitter, MAX_ATTEMPTS).await;
    assert_eq!(outcome.escalated, 1);
    assert_eq!(outcome.still_failed, 0);
    assert!(outbox.load().await.unwrap().is_empty());

    // the system_error references the dropped request's idempotency key
    let requests = server.received_requests().await.unwrap();
    let escalation = requests
        .iter()
        .find(|r| String::from_utf8_lossy(&r.body).contains("system_error"))
        .expect("escalation request not sent");
    assert!(String::from_utf8_lossy(&escalation.body).contains(&key));

    // a further drain does nothing: the entry must not resurface
    let outcome = drain_outbox(&client, &outbox, &emitter, MAX_ATTEMPTS).await;
    assert_eq!(outcome.escalated, 0);
    assert!(outcome.delivered.is_empty());

    let _ = std::fs::remove_file(&outbox_path);
}

#[tokio::test]
async fn entry_at_ceiling_is_not_retried_over_the_network() {
    let server = MockServer::start().await;
    // only the escalation may arrive; a redelivery attempt would 404 and
    // show up as an unexpected received request
    Mock::given(method("POST"))
        .and(path("/api/v1/notifications"))
        .and(body_partial_json(json!({"type": "system_error"})))
        .respond_with(created_response("sys-err", "system_error"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let emitter = SystemEmitter::new(client.clone(), "u1");
    let (outbox, outbox_path) = scratch_outbox("ceiling");

    let mut entry = FailedDelivery::new(request("exhausted"));
    entry.attempts = MAX_ATTEMPTS;
    outbox.append(entry).await.unwrap();

    let outcome = drain_outbox(&client, &outbox, &emitter, MAX_ATTEMPTS).await;
    assert_eq!(outcome.escalated, 1);
    assert!(outcome.delivered.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "only the escalation should hit the wire");

    let _ = std::fs::remove_file(&outbox_path);
}

#[tokio::test]
async fn broken_outbox_emits_critical_error_and_does_not_propagate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/notifications"))
        .and(body_partial_json(json!({"type": "system_error"})))
        .respond_with(created_response("sys-crit", "system_error"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let emitter = SystemEmitter::new(client.clone(), "u1");

    // a directory is unreadable as a queue file: load() errors
    let dir = std::env::temp_dir().join(format!("notifyd-outbox-dir-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let outbox = Outbox::new(&dir);

    let outcome = drain_outbox(&client, &outbox, &emitter, MAX_ATTEMPTS).await;
    assert!(outcome.delivered.is_empty());
    assert_eq!(outcome.still_failed, 0);
    assert_eq!(outcome.escalated, 0);

    let requests = server.received_requests().await.unwrap();
    assert!(
        String::from_utf8_lossy(&requests[0].body).contains("critical_system_error"),
        "critical escalation should carry the error type"
    );

    let _ = std::fs::remove_dir_all(&dir);
}
