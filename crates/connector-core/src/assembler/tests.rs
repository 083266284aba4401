// crates/connector-core/src/assembler/tests.rs
// ============================================================================
// Module: Self-Description Assembler Tests
// Description: Determinism, filtering, and token handling of the assembler.
// Purpose: Pin the document shape peers and brokers depend on.
// Dependencies: proptest, tokio
// ============================================================================

//! ## Overview
//! Unit tests for document assembly and header construction.

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

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use super::AssemblyError;
use super::HeaderOrigin;
use super::METADATA_SEPARATOR;
use super::NotificationKind;
use super::SelfDescriptionAssembler;
use super::assemble_connector;
use super::flatten_metadata;
use super::keywords;
use crate::envelope::Payload;
use crate::memory::InMemoryConnectorStore;
use crate::memory::StoreFault;
use crate::model::CatalogSnapshot;
use crate::model::EntryStatus;
use crate::protocol::MessageKind;
use crate::protocol::ProtocolMessage;
use crate::protocol::RejectionReason;
use crate::test_support::BASE_URL;
use crate::test_support::CountingIssuer;
use crate::test_support::FailingIssuer;
use crate::test_support::distribution;
use crate::test_support::entry;
use crate::test_support::identity;

fn snapshot() -> CatalogSnapshot {
    CatalogSnapshot {
        entries: vec![entry(2, EntryStatus::Published), entry(1, EntryStatus::Published)],
        distributions: vec![
            distribution(11, "res-1"),
            distribution(10, "res-1"),
            distribution(20, "res-2"),
            distribution(99, "res-missing"),
        ],
    }
}

fn published_store() -> InMemoryConnectorStore {
    let store = InMemoryConnectorStore::with_identity(identity());
    store.upsert_entry(entry(1, EntryStatus::Published), vec![distribution(10, "res-1")]).unwrap();
    store.upsert_entry(entry(2, EntryStatus::Approved), vec![distribution(20, "res-2")]).unwrap();
    store
}

// ============================================================================
// SECTION: Pure Assembly
// ============================================================================

#[test]
fn documents_differ_only_in_token_and_issued() {
    let identity = identity();
    let first = assemble_connector(&identity, &snapshot(), "a".to_string(), "t1".to_string());
    let mut second = assemble_connector(&identity, &snapshot(), "b".to_string(), "t2".to_string());
    assert_ne!(first, second);
    second.security_token = first.security_token.clone();
    second.issued = first.issued.clone();
    assert_eq!(first, second);
}

#[test]
fn resources_are_ordered_and_dangling_distributions_dropped() {
    let document =
        assemble_connector(&identity(), &snapshot(), "t".to_string(), "now".to_string());
    let resources = &document.resource_catalog[0].offered_resource;
    let ids: Vec<&str> = resources.iter().map(|resource| resource.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![format!("{BASE_URL}/DataResource/1"), format!("{BASE_URL}/DataResource/2")]
    );
    let endpoints: Vec<&str> = resources[0]
        .resource_endpoint
        .iter()
        .map(|endpoint| endpoint.access_url.as_str())
        .collect();
    assert_eq!(endpoints, vec![format!("{BASE_URL}/data/10"), format!("{BASE_URL}/data/11")]);
    let total: usize = resources.iter().map(|resource| resource.resource_endpoint.len()).sum();
    assert_eq!(total, 3);
}

#[test]
fn document_identifiers_derive_from_base_url() {
    let mut identity = identity();
    identity.base_url = format!("{BASE_URL}/");
    let document = assemble_connector(&identity, &snapshot(), "t".to_string(), "now".to_string());
    assert_eq!(document.id, format!("{BASE_URL}#Connector"));
    assert_eq!(document.resource_catalog[0].id, format!("{BASE_URL}#Catalog"));
    assert_eq!(document.has_default_endpoint.access_url, format!("{BASE_URL}/infrastructure"));
    assert_eq!(document.has_endpoint.len(), 4);
    let artifact = document.resource_catalog[0].offered_resource[0].resource_endpoint[0]
        .endpoint_artifact
        .clone()
        .unwrap();
    assert_eq!(artifact.id, format!("{BASE_URL}/Artifact/10"));
    assert_eq!(artifact.file_name, "file-10.csv");
}

#[test]
fn empty_fields_are_omitted_from_json() {
    let mut snapshot = snapshot();
    snapshot.entries[0].description = String::new();
    snapshot.entries[0].tags = BTreeSet::from([String::new(), "  ".to_string()]);
    let document = assemble_connector(&identity(), &snapshot, "t".to_string(), "now".to_string());
    let value = serde_json::to_value(&document).unwrap();
    let resource = &value["resourceCatalog"][0]["offeredResource"][1];
    assert_eq!(resource["@id"], format!("{BASE_URL}/DataResource/2"));
    assert!(resource.get("description").is_none());
    assert!(resource.get("keyword").is_none());
    assert_eq!(value["securityToken"]["tokenValue"], "t");
    assert_eq!(value["@type"], "ids:BaseConnector");
}

#[test]
fn metadata_values_are_joined() {
    let metadata = BTreeMap::from([(
        "spatial".to_string(),
        BTreeSet::from(["Berlin".to_string(), "Hamburg".to_string()]),
    )]);
    let flattened = flatten_metadata(&metadata);
    assert_eq!(flattened["spatial"], "Berlin, Hamburg");
}

proptest! {
    #[test]
    fn keywords_never_contain_blank_tags(
        tags in proptest::collection::btree_set("[ a-z]{0,6}", 0..8)
    ) {
        match keywords(&tags) {
            Some(kept) => {
                prop_assert!(!kept.is_empty());
                prop_assert!(kept.iter().all(|tag| !tag.trim().is_empty()));
            }
            None => prop_assert!(tags.iter().all(|tag| tag.trim().is_empty())),
        }
    }

    #[test]
    fn flattened_values_split_back_without_separator(
        values in proptest::collection::btree_set("[a-z]{1,6}", 1..6)
    ) {
        let metadata = BTreeMap::from([("k".to_string(), values.clone())]);
        let flattened = flatten_metadata(&metadata);
        let split: BTreeSet<String> =
            flattened["k"].split(METADATA_SEPARATOR).map(str::to_string).collect();
        prop_assert_eq!(split, values);
    }
}

// ============================================================================
// SECTION: Assembler
// ============================================================================

#[tokio::test]
async fn connector_only_lists_published_entries() {
    let store = Arc::new(published_store());
    let assembler = SelfDescriptionAssembler::new(store, Arc::new(CountingIssuer::default()));
    let document = assembler.build_connector(&identity()).await.unwrap();
    let resources = &document.resource_catalog[0].offered_resource;
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].resource_endpoint.len(), 1);
}

#[tokio::test]
async fn response_document_and_header_carry_distinct_tokens() {
    let store = Arc::new(published_store());
    let assembler = SelfDescriptionAssembler::new(store, Arc::new(CountingIssuer::default()));
    let envelope = assembler.build_response("urn:request", &identity()).await.unwrap();
    assert_eq!(envelope.header.kind(), MessageKind::DescriptionResponse);
    assert_eq!(envelope.header.correlation_message.as_deref(), Some("urn:request"));
    let header_token = envelope.header.token_value().unwrap().to_string();
    let Some(Payload::Document(document)) = envelope.payload else {
        panic!("expected document payload");
    };
    let document_token = document["securityToken"]["tokenValue"].as_str().unwrap();
    assert_ne!(header_token, document_token);
}

#[tokio::test]
async fn token_failure_aborts_assembly() {
    let store = Arc::new(published_store());
    let assembler = SelfDescriptionAssembler::new(store, Arc::new(FailingIssuer));
    let err = assembler.build_notification(NotificationKind::Update, &identity()).await;
    assert!(matches!(err, Err(AssemblyError::Token(_))));
}

#[tokio::test]
async fn catalog_failure_aborts_assembly() {
    let store = published_store();
    store.inject_fault(StoreFault::CatalogRead);
    let assembler =
        SelfDescriptionAssembler::new(Arc::new(store), Arc::new(CountingIssuer::default()));
    let err = assembler.build_connector(&identity()).await;
    assert!(matches!(err, Err(AssemblyError::Catalog(_))));
}

#[tokio::test]
async fn notifications_have_no_correlation() {
    let store = Arc::new(published_store());
    let assembler = SelfDescriptionAssembler::new(store, Arc::new(CountingIssuer::default()));
    let envelope =
        assembler.build_notification(NotificationKind::Unavailable, &identity()).await.unwrap();
    assert_eq!(envelope.header.message, ProtocolMessage::ConnectorUnavailable);
    assert!(envelope.header.correlation_message.is_none());
    assert_eq!(envelope.header.issuer_connector, format!("{BASE_URL}#Connector"));
}

#[tokio::test]
async fn rejection_survives_issuer_failure() {
    let store = Arc::new(published_store());
    let assembler = SelfDescriptionAssembler::new(store, Arc::new(FailingIssuer));
    let origin = HeaderOrigin::fallback("http://example.org");
    let envelope =
        assembler.build_rejection(&origin, "urn:request", RejectionReason::NotFound).await;
    assert!(envelope.header.security_token.is_none());
    assert!(envelope.payload.is_none());
    assert_eq!(envelope.header.issuer_connector, "http://example.org");
    assert!(envelope.header.id.starts_with("http://example.org/message/"));
    assert_eq!(
        envelope.header.message,
        ProtocolMessage::Rejection {
            rejection_reason: RejectionReason::NotFound,
        }
    );
}
