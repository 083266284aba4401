// crates/connector-broker/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures and a scripted transport for broker sync tests.
// Purpose: Drive the coordinator against deterministic remote behavior.
// Dependencies: connector-broker, connector-core
// ============================================================================

//! ## Overview
//! [`ScriptedTransport`] records every delivery (URL and message kind) and
//! fails deliveries according to a per-URL script. [`Harness`] wires a
//! coordinator to an in-memory store, the scripted transport, and a
//! recording audit sink.

#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Shared test helpers may be unused in some cases."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use connector_broker::BrokerSyncCoordinator;
use connector_broker::SyncDependencies;
use connector_core::CatalogEntry;
use connector_core::ConnectorIdentity;
use connector_core::EncodedEnvelope;
use connector_core::EntryId;
use connector_core::EntryStatus;
use connector_core::InMemoryConnectorStore;
use connector_core::MessageKind;
use connector_core::Payload;
use connector_core::RegistryTransport;
use connector_core::SelfDescriptionAssembler;
use connector_core::TokenError;
use connector_core::TokenIssuer;
use connector_core::TransportError;
use connector_core::audit::MemoryAuditSink;
use connector_core::envelope;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds a valid identity.
pub fn identity(title: &str) -> ConnectorIdentity {
    ConnectorIdentity {
        base_url: "https://connector.example.com".to_string(),
        maintainer_uri: "https://example.com/maintainer".to_string(),
        curator_uri: "https://example.com/curator".to_string(),
        country_uri: "https://example.com/country/DE".to_string(),
        title: title.to_string(),
        supported_protocol_versions: BTreeSet::from(["4.0.0".to_string()]),
        outbound_protocol_version: "4.0.0".to_string(),
        declared_version: "2.0.0".to_string(),
    }
}

/// Builds a catalog entry without distributions.
pub fn entry(id: i64, status: EntryStatus) -> CatalogEntry {
    CatalogEntry {
        id: EntryId::new(id),
        resource_id: format!("res-{id}"),
        title: format!("Dataset {id}"),
        description: String::new(),
        publisher: String::new(),
        license: String::new(),
        version: String::new(),
        tags: BTreeSet::new(),
        status,
        additional_metadata: BTreeMap::new(),
    }
}

// ============================================================================
// SECTION: Fakes
// ============================================================================

/// Token issuer returning a fixed token.
pub struct FixedIssuer;

#[async_trait]
impl TokenIssuer for FixedIssuer {
    async fn issue_token(&self) -> Result<String, TokenError> {
        Ok("token".to_string())
    }
}

/// One recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Target URL.
    pub url: String,
    /// Delivered message kind.
    pub kind: MessageKind,
    /// Connector title carried by the payload.
    pub title: Option<String>,
}

/// Transport that records deliveries and fails them by script.
#[derive(Default)]
pub struct ScriptedTransport {
    /// Recorded deliveries in call order.
    deliveries: Mutex<Vec<Delivery>>,
    /// Queued outcomes per URL; an empty queue succeeds.
    script: Mutex<BTreeMap<String, VecDeque<Result<(), TransportError>>>>,
}

impl ScriptedTransport {
    /// Queues `error` as the next outcome for `url`.
    pub fn fail_next(&self, url: &str, error: TransportError) {
        self.push(url, Err(error));
    }

    /// Queues a success as the next outcome for `url`.
    pub fn succeed_next(&self, url: &str) {
        self.push(url, Ok(()));
    }

    /// Queues an outcome for `url`.
    fn push(&self, url: &str, outcome: Result<(), TransportError>) {
        self.script.lock().unwrap().entry(url.to_string()).or_default().push_back(outcome);
    }

    /// Returns recorded deliveries.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryTransport for ScriptedTransport {
    async fn deliver(&self, url: &str, encoded: &EncodedEnvelope) -> Result<(), TransportError> {
        let decoded =
            envelope::decode(Some(&encoded.content_type), encoded.body.clone()).await.unwrap();
        let title = match decoded.payload {
            Some(Payload::Document(document)) => document["title"].as_str().map(str::to_string),
            _ => None,
        };
        self.deliveries.lock().unwrap().push(Delivery {
            url: url.to_string(),
            kind: decoded.header.kind(),
            title,
        });
        let next = self.script.lock().unwrap().get_mut(url).and_then(VecDeque::pop_front);
        next.unwrap_or(Ok(()))
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Coordinator wired to in-memory collaborators.
pub struct Harness {
    /// Backing store.
    pub store: InMemoryConnectorStore,
    /// Scripted transport.
    pub transport: Arc<ScriptedTransport>,
    /// Recording audit sink.
    pub audit: Arc<MemoryAuditSink>,
    /// Coordinator under test.
    pub coordinator: BrokerSyncCoordinator,
}

impl Harness {
    /// Builds a harness with an identity titled `Connector`.
    pub fn new() -> Self {
        let store = InMemoryConnectorStore::with_identity(identity("Connector"));
        let shared = Arc::new(store.clone());
        let transport = Arc::new(ScriptedTransport::default());
        let audit = Arc::new(MemoryAuditSink::new());
        let coordinator = BrokerSyncCoordinator::new(SyncDependencies {
            config: shared.clone(),
            catalog: shared.clone(),
            brokers: shared.clone(),
            assembler: SelfDescriptionAssembler::new(shared, Arc::new(FixedIssuer)),
            transport: transport.clone(),
            audit: audit.clone(),
        });
        Self {
            store,
            transport,
            audit,
            coordinator,
        }
    }

    /// Delivered kinds in call order.
    pub fn kinds(&self) -> Vec<MessageKind> {
        self.transport.deliveries().into_iter().map(|delivery| delivery.kind).collect()
    }
}
