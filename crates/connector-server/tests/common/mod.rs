// crates/connector-server/tests/common/mod.rs
// ============================================================================
// Module: Server Test Harness
// Description: Spawns a connector server on loopback with fake collaborators.
// Purpose: Drive the HTTP surfaces end to end in integration tests.
// Dependencies: connector-server, connector-core, reqwest, tokio
// ============================================================================

//! ## Overview
//! [`TestServer`] runs the real axum application on an ephemeral loopback
//! port over an in-memory store, a recording broker transport, a static
//! token issuer, and a recording audit sink.

#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Shared test helpers may be unused in some suites."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use connector_config::AdminAuthConfig;
use connector_config::AdminAuthMode;
use connector_core::CatalogEntry;
use connector_core::ConnectorIdentity;
use connector_core::Distribution;
use connector_core::DistributionId;
use connector_core::EncodedEnvelope;
use connector_core::EntryId;
use connector_core::EntryStatus;
use connector_core::Envelope;
use connector_core::InMemoryConnectorStore;
use connector_core::MessageHeader;
use connector_core::ProtocolMessage;
use connector_core::RegistryTransport;
use connector_core::RouterPolicy;
use connector_core::TransportError;
use connector_core::audit::MemoryAuditSink;
use connector_core::envelope;
use connector_core::protocol::SecurityToken;
use connector_server::AcceptAllAuthenticator;
use connector_server::AdminAuthz;
use connector_server::AdminReply;
use connector_server::ConnectorServer;
use connector_server::DirectoryArtifactSource;
use connector_server::ServerParts;
use connector_server::StaticTokenIssuer;
use connector_server::StoreHandles;
use tokio::net::TcpListener;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Admin token used by bearer-mode servers.
pub const ADMIN_TOKEN: &str = "admin-secret";

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

/// Builds a catalog entry.
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

/// Builds a distribution of entry `res-<entry>` backed by `filename`.
pub fn distribution(id: i64, entry: i64, filename: &str) -> Distribution {
    Distribution {
        id: DistributionId::new(id),
        resource_id: format!("dist-{id}"),
        dataset_id: format!("res-{entry}"),
        title: None,
        description: None,
        filename: filename.to_string(),
        filetype: "csv".to_string(),
        byte_size: 0,
        license: String::new(),
        created_at: String::new(),
        additional_metadata: BTreeMap::new(),
    }
}

/// Builds an inbound request header.
pub fn request(message: ProtocolMessage, token: Option<&str>) -> MessageHeader {
    MessageHeader {
        id: "https://peer.example.com/message/42".to_string(),
        message,
        issued: "2026-01-01T00:00:00Z".to_string(),
        model_version: "4.0.0".to_string(),
        issuer_connector: "https://peer.example.com#Connector".to_string(),
        correlation_message: None,
        security_token: token.map(SecurityToken::new),
    }
}

/// Encodes a header-only request.
pub fn encode(header: MessageHeader) -> EncodedEnvelope {
    Envelope::header_only(header).encode().unwrap()
}

// ============================================================================
// SECTION: Recording Transport
// ============================================================================

/// Records deliveries and fails configured URLs.
#[derive(Default)]
pub struct RecordingTransport {
    /// Delivered URLs, in call order.
    delivered: Mutex<Vec<String>>,
    /// URLs that fail with a timeout.
    failing: Mutex<BTreeSet<String>>,
}

impl RecordingTransport {
    /// Makes every delivery to `url` fail.
    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    /// Returns delivered URLs.
    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryTransport for RecordingTransport {
    async fn deliver(&self, url: &str, encoded: &EncodedEnvelope) -> Result<(), TransportError> {
        envelope::decode(Some(&encoded.content_type), encoded.body.clone()).await.unwrap();
        self.delivered.lock().unwrap().push(url.to_string());
        if self.failing.lock().unwrap().contains(url) {
            return Err(TransportError::Timeout("scripted".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// A connector server running on loopback.
pub struct TestServer {
    /// Base URL (`http://127.0.0.1:<port>`).
    pub base: String,
    /// Backing store.
    pub store: Arc<InMemoryConnectorStore>,
    /// Broker transport.
    pub transport: Arc<RecordingTransport>,
    /// Audit sink.
    pub audit: Arc<MemoryAuditSink>,
    /// HTTP client.
    pub client: reqwest::Client,
}

impl TestServer {
    /// Starts a local-only server with artifacts under `artifacts`.
    pub async fn start(artifacts: &Path) -> Self {
        Self::start_with(artifacts, AdminAuthConfig::default()).await
    }

    /// Starts a bearer-token server.
    pub async fn start_bearer(artifacts: &Path) -> Self {
        let auth = AdminAuthConfig {
            mode: AdminAuthMode::BearerToken,
            bearer_tokens: vec![ADMIN_TOKEN.to_string()],
        };
        Self::start_with(artifacts, auth).await
    }

    /// Starts a server with explicit admin auth.
    pub async fn start_with(artifacts: &Path, admin_auth: AdminAuthConfig) -> Self {
        let store = Arc::new(InMemoryConnectorStore::with_identity(identity("Connector")));
        let transport = Arc::new(RecordingTransport::default());
        let audit = Arc::new(MemoryAuditSink::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let server = ConnectorServer::from_parts(
            addr,
            ServerParts {
                stores: StoreHandles::shared(Arc::clone(&store)),
                issuer: Arc::new(StaticTokenIssuer::new("server-token")),
                authenticator: Arc::new(AcceptAllAuthenticator),
                artifacts: Arc::new(DirectoryArtifactSource::new(artifacts)),
                transport: transport.clone(),
                audit: audit.clone(),
                policy: RouterPolicy::default(),
                admin_authz: AdminAuthz::from_config(&admin_auth),
                max_body_bytes: 64 * 1024,
            },
        );
        tokio::spawn(server.serve_listener(listener));
        Self {
            base: format!("http://{addr}"),
            store,
            transport,
            audit,
            client: reqwest::Client::new(),
        }
    }

    /// POSTs an encoded envelope and decodes the reply envelope.
    pub async fn post_envelope(&self, path: &str, encoded: EncodedEnvelope) -> Envelope {
        self.post_raw(path, &encoded.content_type, encoded.body).await
    }

    /// POSTs raw bytes and decodes the reply envelope.
    pub async fn post_raw(&self, path: &str, content_type: &str, body: Bytes) -> Envelope {
        let response = self
            .client
            .post(format!("{}{path}", self.base))
            .header("Content-Type", content_type)
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let content_type = response
            .headers()
            .get("Content-Type")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.unwrap();
        envelope::decode(content_type.as_deref(), body).await.unwrap()
    }

    /// Sends an admin request and returns status and reply.
    pub async fn admin(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<String>,
        token: Option<&str>,
    ) -> (u16, Option<AdminReply>) {
        let mut request = self.client.request(method, format!("{}/admin{path}", self.base));
        if let Some(body) = body {
            request = request.header("Content-Type", "application/json").body(body);
        }
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        let bytes = response.bytes().await.unwrap();
        (status, serde_json::from_slice(&bytes).ok())
    }

    /// Sends a local-only admin request expecting HTTP 200.
    pub async fn admin_ok(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<String>,
    ) -> AdminReply {
        let (status, reply) = self.admin(method, path, body, None).await;
        assert_eq!(status, 200, "{path}");
        reply.unwrap()
    }
}
