// crates/connector-server/tests/admin_http_tests.rs
// ============================================================================
// Module: Admin Surface Tests
// Description: Broker, catalog, and identity administration over HTTP.
// ============================================================================

//! ## Overview
//! Drives the `/admin` surface over HTTP and checks replies, store state,
//! broker deliveries, and admin auth audit events.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions."
)]

mod common;

use common::ADMIN_TOKEN;
use common::TestServer;
use common::entry;
use common::identity;
use connector_core::BrokerId;
use connector_core::BrokerStatus;
use connector_core::BrokerStore;
use connector_core::ConfigProvider;
use connector_core::EntryId;
use connector_core::EntryStatus;
use connector_core::StoreFault;
use connector_server::ReplyStatus;
use reqwest::Method;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const BROKER: &str = "http://broker.example.com/infrastructure";

fn add_body(url: &str) -> Option<String> {
    Some(serde_json::json!({ "url": url }).to_string())
}

// ============================================================================
// SECTION: Brokers
// ============================================================================

#[tokio::test]
async fn add_then_list_brokers() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    let reply = server.admin_ok(Method::POST, "/brokers", add_body(BROKER)).await;
    assert_eq!(reply.status, ReplyStatus::Ok);
    assert_eq!(reply.data.unwrap()["url"], BROKER);
    assert_eq!(server.transport.delivered(), vec![BROKER.to_string()]);

    let reply = server.admin_ok(Method::GET, "/brokers", None).await;
    let brokers = reply.data.unwrap();
    assert_eq!(brokers.as_array().unwrap().len(), 1);
    assert_eq!(brokers[0]["status"], "REGISTERED");
}

#[tokio::test]
async fn failed_add_is_a_business_error_and_leaves_no_row() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    server.transport.fail(BROKER);
    let reply = server.admin_ok(Method::POST, "/brokers", add_body(BROKER)).await;
    assert_eq!(reply.status, ReplyStatus::Error);
    assert_eq!(reply.kind.as_deref(), Some("delivery"));
    assert!(server.store.brokers().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_broker_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    for path in ["/brokers/9/register", "/brokers/9/unregister"] {
        let reply = server.admin_ok(Method::POST, path, None).await;
        assert_eq!(reply.kind.as_deref(), Some("not_found"), "{path}");
    }
    let reply = server.admin_ok(Method::DELETE, "/brokers/9", None).await;
    assert_eq!(reply.kind.as_deref(), Some("not_found"));
}

#[tokio::test]
async fn unregister_register_and_delete_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    let broker = server.store.insert_broker(BROKER).await.unwrap();
    let id = broker.id.get();

    let reply = server.admin_ok(Method::POST, &format!("/brokers/{id}/unregister"), None).await;
    assert_eq!(reply.status, ReplyStatus::Ok);
    let stored = server.store.broker(BrokerId::new(id)).await.unwrap().unwrap();
    assert_eq!(stored.status, BrokerStatus::Unregistered);

    server.admin_ok(Method::POST, &format!("/brokers/{id}/register"), None).await;
    let stored = server.store.broker(BrokerId::new(id)).await.unwrap().unwrap();
    assert_eq!(stored.status, BrokerStatus::Registered);

    server.admin_ok(Method::DELETE, &format!("/brokers/{id}"), None).await;
    assert!(server.store.broker(BrokerId::new(id)).await.unwrap().is_none());
    assert_eq!(server.transport.delivered().len(), 3);
}

#[tokio::test]
async fn invalid_body_is_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    let reply = server.admin_ok(Method::POST, "/brokers", Some("{".to_string())).await;
    assert_eq!(reply.kind.as_deref(), Some("invalid_input"));
}

#[tokio::test]
async fn broker_list_store_fault_is_500() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    server.store.inject_fault(StoreFault::BrokerRead);
    let (status, reply) = server.admin(Method::GET, "/brokers", None, None).await;
    assert_eq!(status, 500);
    assert_eq!(reply.unwrap().kind.as_deref(), Some("store"));
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

#[tokio::test]
async fn publish_updates_brokers_and_counts() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    server.store.upsert_entry(entry(1, EntryStatus::Approved), Vec::new()).unwrap();
    server.store.upsert_entry(entry(2, EntryStatus::Approved), Vec::new()).unwrap();
    server.store.insert_broker(BROKER).await.unwrap();

    let reply = server.admin_ok(Method::POST, "/catalog/1/publish", None).await;
    assert_eq!(reply.status, ReplyStatus::Ok);
    assert_eq!(reply.data.unwrap()["delivered"], 1);

    let counts = server.admin_ok(Method::GET, "/catalog/counts", None).await.data.unwrap();
    assert_eq!(counts["total"], 2);
    assert_eq!(counts["published"], 1);

    server.admin_ok(Method::POST, "/catalog/publish_all", None).await;
    let counts = server.admin_ok(Method::GET, "/catalog/counts", None).await.data.unwrap();
    assert_eq!(counts["published"], 2);

    server.admin_ok(Method::POST, "/catalog/unpublish_all", None).await;
    let stored = server.store.entry(EntryId::new(2)).unwrap().unwrap();
    assert_eq!(stored.status, EntryStatus::Approved);
}

#[tokio::test]
async fn publish_with_failed_update_reports_fan_out() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    server.store.upsert_entry(entry(1, EntryStatus::Published), Vec::new()).unwrap();
    server.store.insert_broker(BROKER).await.unwrap();
    server.transport.fail(BROKER);
    let reply = server.admin_ok(Method::POST, "/catalog/1/unpublish", None).await;
    assert_eq!(reply.kind.as_deref(), Some("fan_out"));
    let stored = server.store.entry(EntryId::new(1)).unwrap().unwrap();
    assert_eq!(stored.status, EntryStatus::Approved);
}

#[tokio::test]
async fn update_with_no_brokers_delivers_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    let reply = server.admin_ok(Method::POST, "/update", None).await;
    assert_eq!(reply.data.unwrap()["delivered"], 0);
}

// ============================================================================
// SECTION: Identity
// ============================================================================

#[tokio::test]
async fn identity_get_and_edit() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    let reply = server.admin_ok(Method::GET, "/identity", None).await;
    assert_eq!(reply.data.unwrap()["title"], "Connector");

    let body = serde_json::to_string(&identity("Renamed")).unwrap();
    let reply = server.admin_ok(Method::PUT, "/identity", Some(body)).await;
    assert_eq!(reply.status, ReplyStatus::Ok);
    assert_eq!(server.store.identity().await.unwrap().title, "Renamed");
}

#[tokio::test]
async fn identity_edit_stops_when_unsubscribe_fails() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    server.store.insert_broker(BROKER).await.unwrap();
    let body = serde_json::to_string(&identity("Renamed")).unwrap();
    server.transport.fail(BROKER);
    let reply = server.admin_ok(Method::PUT, "/identity", Some(body)).await;
    assert_eq!(reply.status, ReplyStatus::Error);
    assert_eq!(reply.kind.as_deref(), Some("fan_out"));
    assert_eq!(server.store.identity().await.unwrap().title, "Connector");
}

// ============================================================================
// SECTION: Auth
// ============================================================================

#[tokio::test]
async fn bearer_mode_requires_token() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start_bearer(dir.path()).await;
    let response =
        server.client.get(format!("{}/admin/brokers", server.base)).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(response.headers().get("WWW-Authenticate").unwrap(), "Bearer");

    let (status, _) = server.admin(Method::GET, "/brokers", None, Some("wrong")).await;
    assert_eq!(status, 401);
    let (status, reply) = server.admin(Method::GET, "/brokers", None, Some(ADMIN_TOKEN)).await;
    assert_eq!(status, 200);
    assert_eq!(reply.unwrap().status, ReplyStatus::Ok);

    let decisions: Vec<&str> =
        server.audit.admin_events().iter().map(|event| event.decision).collect();
    assert_eq!(decisions, vec!["deny", "deny", "allow"]);
    let allowed = &server.audit.admin_events()[2];
    assert_eq!(allowed.action, "GET /admin/brokers");
    assert_eq!(allowed.token_fingerprint.as_ref().map(String::len), Some(64));
}

#[tokio::test]
async fn admin_audit_records_full_request_path() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path()).await;
    let (status, _) = server.admin(Method::POST, "/brokers/7/register", None, None).await;
    assert_eq!(status, 200);
    let actions: Vec<String> =
        server.audit.admin_events().iter().map(|event| event.action.clone()).collect();
    assert_eq!(actions, vec!["POST /admin/brokers/7/register".to_string()]);
}

#[tokio::test]
async fn protocol_endpoints_skip_admin_auth() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start_bearer(dir.path()).await;
    let response = server.client.get(format!("{}/", server.base)).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(server.audit.admin_events().is_empty());
}
