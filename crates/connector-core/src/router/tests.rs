// crates/connector-core/src/router/tests.rs
// ============================================================================
// Module: Message Router Tests
// Description: Dispatch, authentication, and rejection behavior.
// Purpose: Every inbound message yields exactly one parseable reply.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! Unit tests for [`super::MessageRouter`] over the in-memory store and fakes.

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

use std::sync::Arc;

use bytes::Bytes;

use super::InboundMessage;
use super::MessageRouter;
use super::RouterDependencies;
use super::RouterPolicy;
use super::artifact_id;
use crate::assembler::SelfDescriptionAssembler;
use crate::audit::MemoryAuditSink;
use crate::audit::ProtocolOutcome;
use crate::envelope::Envelope;
use crate::envelope::Payload;
use crate::interfaces::ArtifactSource;
use crate::interfaces::TokenAuthenticator;
use crate::interfaces::TokenIssuer;
use crate::memory::InMemoryConnectorStore;
use crate::memory::StoreFault;
use crate::model::DistributionId;
use crate::model::EntryStatus;
use crate::protocol::MessageHeader;
use crate::protocol::MessageKind;
use crate::protocol::ProtocolMessage;
use crate::protocol::RejectionReason;
use crate::protocol::SecurityToken;
use crate::test_support::BASE_URL;
use crate::test_support::CountingIssuer;
use crate::test_support::FailingIssuer;
use crate::test_support::FixedAuthenticator;
use crate::test_support::MissingArtifacts;
use crate::test_support::OfflineAuthenticator;
use crate::test_support::StaticArtifacts;
use crate::test_support::distribution;
use crate::test_support::entry;
use crate::test_support::identity;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const REQUEST_ID: &str = "https://peer.example.com/message/1";

struct Harness {
    store: InMemoryConnectorStore,
    audit: Arc<MemoryAuditSink>,
    router: MessageRouter,
}

struct HarnessBuilder {
    issuer: Arc<dyn TokenIssuer>,
    authenticator: Arc<dyn TokenAuthenticator>,
    artifacts: Arc<dyn ArtifactSource>,
    policy: RouterPolicy,
}

impl HarnessBuilder {
    fn new() -> Self {
        Self {
            issuer: Arc::new(CountingIssuer::default()),
            authenticator: Arc::new(FixedAuthenticator),
            artifacts: Arc::new(StaticArtifacts),
            policy: RouterPolicy {
                placeholder_token: Some("valid-token".to_string()),
                fallback_correlation_uri: "http://example.org".to_string(),
            },
        }
    }

    fn build(self) -> Harness {
        let store = InMemoryConnectorStore::with_identity(identity());
        let published = entry(1, EntryStatus::Published);
        store.upsert_entry(published, vec![distribution(10, "res-1")]).unwrap();
        let approved = entry(2, EntryStatus::Approved);
        store.upsert_entry(approved, vec![distribution(20, "res-2")]).unwrap();
        let shared = Arc::new(store.clone());
        let audit = Arc::new(MemoryAuditSink::new());
        let router = MessageRouter::new(
            RouterDependencies {
                config: shared.clone(),
                catalog: shared.clone(),
                assembler: SelfDescriptionAssembler::new(shared, self.issuer),
                artifacts: self.artifacts,
                authenticator: self.authenticator,
                audit: audit.clone(),
            },
            self.policy,
        );
        Harness {
            store,
            audit,
            router,
        }
    }
}

fn request(message: ProtocolMessage, token: Option<&str>) -> MessageHeader {
    MessageHeader {
        id: REQUEST_ID.to_string(),
        message,
        issued: "2026-01-01T00:00:00Z".to_string(),
        model_version: "4.0.0".to_string(),
        issuer_connector: "https://peer.example.com#Connector".to_string(),
        correlation_message: None,
        security_token: token.map(SecurityToken::new),
    }
}

fn inbound(header: MessageHeader, expected: Option<MessageKind>) -> InboundMessage {
    let encoded = Envelope::header_only(header).encode().unwrap();
    InboundMessage {
        content_type: Some(encoded.content_type),
        body: encoded.body,
        expected,
    }
}

fn artifact_request(uri: &str) -> InboundMessage {
    inbound(
        request(
            ProtocolMessage::ArtifactRequest {
                requested_artifact: uri.to_string(),
            },
            Some("valid-token"),
        ),
        None,
    )
}

fn rejection_reason(envelope: &Envelope) -> RejectionReason {
    assert!(envelope.payload.is_none(), "rejections carry no payload");
    match envelope.header.message {
        ProtocolMessage::Rejection {
            rejection_reason,
        } => rejection_reason,
        ref other => panic!("expected rejection, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

#[tokio::test]
async fn description_request_returns_document() {
    let harness = HarnessBuilder::new().build();
    let reply = harness
        .router
        .route(inbound(request(ProtocolMessage::DescriptionRequest, Some("valid-token")), None))
        .await;
    assert_eq!(reply.header.kind(), MessageKind::DescriptionResponse);
    assert_eq!(reply.header.correlation_message.as_deref(), Some(REQUEST_ID));
    let Some(Payload::Document(document)) = reply.payload else {
        panic!("expected document payload");
    };
    assert_eq!(document["@id"], format!("{BASE_URL}#Connector"));
    let events = harness.audit.protocol_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, ProtocolOutcome::Response);
    assert_eq!(events[0].message_kind, Some("description_request"));
}

#[tokio::test]
async fn artifact_request_returns_binary_payload() {
    let harness = HarnessBuilder::new().build();
    let reply = harness.router.route(artifact_request(&format!("{BASE_URL}/Artifact/10"))).await;
    assert_eq!(reply.header.kind(), MessageKind::ArtifactResponse);
    assert_eq!(reply.header.correlation_message.as_deref(), Some(REQUEST_ID));
    let Some(Payload::Binary {
        filename,
        bytes,
        ..
    }) = reply.payload
    else {
        panic!("expected binary payload");
    };
    assert_eq!(filename, "file-10.csv");
    assert_eq!(bytes, Bytes::from_static(b"abc"));
}

#[tokio::test]
async fn unknown_or_unpublished_artifacts_are_not_found() {
    let harness = HarnessBuilder::new().build();
    for uri in [
        format!("{BASE_URL}/Artifact/404"),
        format!("{BASE_URL}/Artifact/twenty"),
        format!("{BASE_URL}/Artifact/20"),
    ] {
        let reply = harness.router.route(artifact_request(&uri)).await;
        assert_eq!(rejection_reason(&reply), RejectionReason::NotFound, "{uri}");
        assert_eq!(reply.header.correlation_message.as_deref(), Some(REQUEST_ID));
    }
}

#[tokio::test]
async fn artifact_uri_query_and_fragment_are_ignored() {
    let harness = HarnessBuilder::new().build();
    for uri in [
        format!("{BASE_URL}/Artifact/10?format=csv"),
        format!("{BASE_URL}/Artifact/10#part"),
        format!("{BASE_URL}/Artifact/10/"),
    ] {
        let reply = harness.router.route(artifact_request(&uri)).await;
        assert_eq!(reply.header.kind(), MessageKind::ArtifactResponse, "{uri}");
    }
}

#[test]
fn artifact_id_reads_last_path_segment() {
    assert_eq!(
        artifact_id("https://peer.example.com/Artifact/7?x=1"),
        Some(DistributionId::new(7))
    );
    assert_eq!(artifact_id("Artifact/8#frag"), Some(DistributionId::new(8)));
    assert_eq!(artifact_id("https://peer.example.com/Artifact/"), None);
    assert_eq!(artifact_id("https://peer.example.com/7/Artifact"), None);
}

#[tokio::test]
async fn unhandled_kinds_are_not_supported() {
    let harness = HarnessBuilder::new().build();
    let reply = harness
        .router
        .route(inbound(request(ProtocolMessage::ConnectorUpdate, Some("valid-token")), None))
        .await;
    assert_eq!(rejection_reason(&reply), RejectionReason::MessageTypeNotSupported);
}

#[tokio::test]
async fn endpoint_kind_mismatch_is_malformed() {
    let harness = HarnessBuilder::new().build();
    let reply = harness
        .router
        .route(inbound(
            request(ProtocolMessage::DescriptionRequest, Some("valid-token")),
            Some(MessageKind::ArtifactRequest),
        ))
        .await;
    assert_eq!(rejection_reason(&reply), RejectionReason::MalformedMessage);
    assert_eq!(reply.header.correlation_message.as_deref(), Some(REQUEST_ID));
}

// ============================================================================
// SECTION: Malformed Input
// ============================================================================

#[tokio::test]
async fn unparseable_body_correlates_to_fallback() {
    let harness = HarnessBuilder::new().build();
    let reply = harness
        .router
        .route(InboundMessage {
            content_type: Some("application/json".to_string()),
            body: Bytes::from_static(b"{}"),
            expected: None,
        })
        .await;
    assert_eq!(rejection_reason(&reply), RejectionReason::MalformedMessage);
    assert_eq!(reply.header.correlation_message.as_deref(), Some("http://example.org"));
    assert_eq!(reply.header.issuer_connector, format!("{BASE_URL}#Connector"));
}

#[tokio::test]
async fn unreadable_body_is_malformed_and_audited() {
    let harness = HarnessBuilder::new().build();
    let reply = harness
        .router
        .reject_unreadable(Some(MessageKind::ArtifactRequest), "length limit exceeded")
        .await;
    assert_eq!(rejection_reason(&reply), RejectionReason::MalformedMessage);
    assert_eq!(reply.header.correlation_message.as_deref(), Some("http://example.org"));
    let events = harness.audit.protocol_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, ProtocolOutcome::Rejection);
    assert_eq!(events[0].detail.as_deref(), Some("length limit exceeded"));
}

#[tokio::test]
async fn unknown_type_correlates_to_recovered_id() {
    let harness = HarnessBuilder::new().build();
    let body = Bytes::from(
        "--b\r\nContent-Disposition: form-data; name=\"header\"\r\n\r\n\
         {\"@id\":\"urn:peer:7\",\"@type\":\"ids:QueryMessage\"}\r\n--b--\r\n",
    );
    let reply = harness
        .router
        .route(InboundMessage {
            content_type: Some("multipart/form-data; boundary=b".to_string()),
            body,
            expected: None,
        })
        .await;
    assert_eq!(rejection_reason(&reply), RejectionReason::MalformedMessage);
    assert_eq!(reply.header.correlation_message.as_deref(), Some("urn:peer:7"));
    let events = harness.audit.protocol_events();
    assert_eq!(events[0].message_id.as_deref(), Some("urn:peer:7"));
    assert_eq!(events[0].rejection_reason, Some("malformed_message"));
}

// ============================================================================
// SECTION: Authentication
// ============================================================================

#[tokio::test]
async fn missing_token_uses_placeholder_when_permissive() {
    let harness = HarnessBuilder::new().build();
    let message = request(ProtocolMessage::DescriptionRequest, None);
    let reply = harness.router.route(inbound(message, None)).await;
    assert_eq!(reply.header.kind(), MessageKind::DescriptionResponse);
}

#[tokio::test]
async fn missing_token_is_rejected_when_strict() {
    let mut builder = HarnessBuilder::new();
    builder.policy.placeholder_token = None;
    let harness = builder.build();
    let message = request(ProtocolMessage::DescriptionRequest, None);
    let reply = harness.router.route(inbound(message, None)).await;
    assert_eq!(rejection_reason(&reply), RejectionReason::NotAuthenticated);
}

#[tokio::test]
async fn invalid_token_is_not_authenticated() {
    let harness = HarnessBuilder::new().build();
    let reply = harness
        .router
        .route(inbound(request(ProtocolMessage::DescriptionRequest, Some("forged")), None))
        .await;
    assert_eq!(rejection_reason(&reply), RejectionReason::NotAuthenticated);
}

#[tokio::test]
async fn unreachable_authenticator_is_internal_error() {
    let mut builder = HarnessBuilder::new();
    builder.authenticator = Arc::new(OfflineAuthenticator);
    let harness = builder.build();
    let reply = harness
        .router
        .route(inbound(request(ProtocolMessage::DescriptionRequest, Some("valid-token")), None))
        .await;
    assert_eq!(rejection_reason(&reply), RejectionReason::InternalRecipientError);
}

// ============================================================================
// SECTION: Dependency Failures
// ============================================================================

#[tokio::test]
async fn issuer_failure_yields_tokenless_rejection() {
    let mut builder = HarnessBuilder::new();
    builder.issuer = Arc::new(FailingIssuer);
    let harness = builder.build();
    let reply = harness
        .router
        .route(inbound(request(ProtocolMessage::DescriptionRequest, Some("valid-token")), None))
        .await;
    assert_eq!(rejection_reason(&reply), RejectionReason::InternalRecipientError);
    assert!(reply.header.security_token.is_none());
    assert_eq!(reply.header.correlation_message.as_deref(), Some(REQUEST_ID));
}

#[tokio::test]
async fn identity_failure_uses_fallback_origin() {
    let harness = HarnessBuilder::new().build();
    harness.store.inject_fault(StoreFault::IdentityRead);
    let reply = harness
        .router
        .route(inbound(request(ProtocolMessage::DescriptionRequest, Some("valid-token")), None))
        .await;
    assert_eq!(rejection_reason(&reply), RejectionReason::InternalRecipientError);
    assert_eq!(reply.header.issuer_connector, "http://example.org");
    assert!(reply.header.id.starts_with("http://example.org/message/"));
}

#[tokio::test]
async fn missing_artifact_file_is_internal_error() {
    let mut builder = HarnessBuilder::new();
    builder.artifacts = Arc::new(MissingArtifacts);
    let harness = builder.build();
    let reply = harness.router.route(artifact_request(&format!("{BASE_URL}/Artifact/10"))).await;
    assert_eq!(rejection_reason(&reply), RejectionReason::InternalRecipientError);
}

#[tokio::test]
async fn catalog_failure_is_internal_error() {
    let harness = HarnessBuilder::new().build();
    harness.store.inject_fault(StoreFault::CatalogRead);
    let reply = harness.router.route(artifact_request(&format!("{BASE_URL}/Artifact/10"))).await;
    assert_eq!(rejection_reason(&reply), RejectionReason::InternalRecipientError);
    let events = harness.audit.protocol_events();
    assert!(events[0].detail.as_deref().unwrap_or_default().contains("injected fault"));
}

#[tokio::test]
async fn self_description_reflects_catalog() {
    let harness = HarnessBuilder::new().build();
    let document = harness.router.self_description().await.unwrap();
    assert_eq!(document.resource_catalog[0].offered_resource.len(), 1);
}
