// crates/connector-server/src/server.rs
// ============================================================================
// Module: Connector Server
// Description: HTTP server for protocol messages, self-description, admin.
// Purpose: Wire configured components together and expose them over axum.
// Dependencies: axum, connector-broker, connector-config, connector-core,
//               connector-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! [`ConnectorServer`] builds every collaborator from [`ConnectorConfig`]
//! (stores, token issuer and authenticator, artifact source, broker
//! transport, audit sink) and serves three surfaces:
//! - protocol endpoints (`POST /infrastructure`, `/about`, `/data`) answered
//!   by the [`MessageRouter`] with a multipart envelope;
//! - the self-description document (`GET /`, `GET /about`);
//! - the admin surface under `/admin`, see [`crate::admin`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use connector_broker::BrokerSyncCoordinator;
use connector_broker::HttpRegistryTransport;
use connector_broker::HttpTransportConfig;
use connector_broker::SyncDependencies;
use connector_config::AuditConfig;
use connector_config::ConnectorConfig;
use connector_config::ProtocolConfig;
use connector_config::StoreType;
use connector_config::TokenIssuerConfig;
use connector_core::ArtifactSource;
use connector_core::BrokerStore;
use connector_core::CatalogStore;
use connector_core::ConfigProvider;
use connector_core::InMemoryConnectorStore;
use connector_core::InboundMessage;
use connector_core::MessageKind;
use connector_core::MessageRouter;
use connector_core::RegistryTransport;
use connector_core::RouterDependencies;
use connector_core::RouterPolicy;
use connector_core::SelfDescriptionAssembler;
use connector_core::StoreError;
use connector_core::TokenAuthenticator;
use connector_core::TokenIssuer;
use connector_core::audit::ConnectorAuditSink;
use connector_core::audit::FileAuditSink;
use connector_core::audit::NoopAuditSink;
use connector_core::audit::StderrAuditSink;
use connector_store_sqlite::SqliteConnectorStore;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin;
use crate::artifacts::DirectoryArtifactSource;
use crate::auth::AdminAuthz;
use crate::tokens::AcceptAllAuthenticator;
use crate::tokens::AllowListAuthenticator;
use crate::tokens::HttpTokenIssuer;
use crate::tokens::StaticTokenIssuer;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Store handles, usually three views of one backend.
#[derive(Clone)]
pub struct StoreHandles {
    /// Identity source.
    pub config: Arc<dyn ConfigProvider>,
    /// Catalog.
    pub catalog: Arc<dyn CatalogStore>,
    /// Broker rows.
    pub brokers: Arc<dyn BrokerStore>,
}

impl StoreHandles {
    /// Uses one backend for all three views.
    #[must_use]
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ConfigProvider + CatalogStore + BrokerStore + 'static,
    {
        Self {
            config: store.clone(),
            catalog: store.clone(),
            brokers: store,
        }
    }
}

/// Every collaborator the server needs.
pub struct ServerParts {
    /// Store handles.
    pub stores: StoreHandles,
    /// Outbound token issuer.
    pub issuer: Arc<dyn TokenIssuer>,
    /// Inbound token validation.
    pub authenticator: Arc<dyn TokenAuthenticator>,
    /// Artifact bytes.
    pub artifacts: Arc<dyn ArtifactSource>,
    /// Broker delivery.
    pub transport: Arc<dyn RegistryTransport>,
    /// Audit sink.
    pub audit: Arc<dyn ConnectorAuditSink>,
    /// Router policy.
    pub policy: RouterPolicy,
    /// Admin auth policy.
    pub admin_authz: AdminAuthz,
    /// Maximum request body size.
    pub max_body_bytes: usize,
}

/// Shared state of all handlers.
pub struct ServerState {
    /// Protocol router.
    pub(crate) router: MessageRouter,
    /// Broker sync coordinator.
    pub(crate) coordinator: BrokerSyncCoordinator,
    /// Identity source.
    pub(crate) config: Arc<dyn ConfigProvider>,
    /// Catalog.
    pub(crate) catalog: Arc<dyn CatalogStore>,
    /// Broker rows.
    pub(crate) brokers: Arc<dyn BrokerStore>,
    /// Admin auth policy.
    pub(crate) admin_authz: AdminAuthz,
    /// Audit sink.
    pub(crate) audit: Arc<dyn ConnectorAuditSink>,
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Connector HTTP server.
pub struct ConnectorServer {
    /// Bind address.
    bind: SocketAddr,
    /// Handler state.
    state: Arc<ServerState>,
    /// Maximum request body size.
    max_body_bytes: usize,
}

impl ConnectorServer {
    /// Builds a server from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or a component
    /// cannot be initialized.
    pub async fn from_config(config: &ConnectorConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let bind = config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let stores = build_stores(config).await?;
        let transport = HttpRegistryTransport::new(HttpTransportConfig {
            connect_timeout: config.transport.connect_timeout(),
            request_timeout: config.transport.request_timeout(),
        })
        .map_err(|err| ServerError::Init(err.to_string()))?;
        let parts = ServerParts {
            stores,
            issuer: build_issuer(&config.token_issuer)?,
            authenticator: build_authenticator(&config.protocol),
            artifacts: Arc::new(DirectoryArtifactSource::new(config.artifacts.root.clone())),
            transport: Arc::new(transport),
            audit: build_audit_sink(&config.server.audit)?,
            policy: router_policy(&config.protocol),
            admin_authz: AdminAuthz::from_config(&config.server.admin_auth),
            max_body_bytes: config.server.max_body_bytes,
        };
        Ok(Self::from_parts(bind, parts))
    }

    /// Builds a server from explicit collaborators.
    #[must_use]
    pub fn from_parts(bind: SocketAddr, parts: ServerParts) -> Self {
        let assembler = SelfDescriptionAssembler::new(parts.stores.catalog.clone(), parts.issuer);
        let router = MessageRouter::new(
            RouterDependencies {
                config: parts.stores.config.clone(),
                catalog: parts.stores.catalog.clone(),
                assembler: assembler.clone(),
                artifacts: parts.artifacts,
                authenticator: parts.authenticator,
                audit: parts.audit.clone(),
            },
            parts.policy,
        );
        let coordinator = BrokerSyncCoordinator::new(SyncDependencies {
            config: parts.stores.config.clone(),
            catalog: parts.stores.catalog.clone(),
            brokers: parts.stores.brokers.clone(),
            assembler,
            transport: parts.transport,
            audit: parts.audit.clone(),
        });
        let state = Arc::new(ServerState {
            router,
            coordinator,
            config: parts.stores.config,
            catalog: parts.stores.catalog,
            brokers: parts.stores.brokers,
            admin_authz: parts.admin_authz,
            audit: parts.audit,
        });
        Self {
            bind,
            state,
            max_body_bytes: parts.max_body_bytes,
        }
    }

    /// Returns the configured bind address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Builds the axum application.
    #[must_use]
    pub fn app(&self) -> Router {
        let admin = Router::new()
            .route("/brokers", get(admin::list_brokers).post(admin::add_broker))
            .route("/brokers/{id}", axum::routing::delete(admin::delete_broker))
            .route("/brokers/{id}/register", post(admin::register_broker))
            .route("/brokers/{id}/unregister", post(admin::unregister_broker))
            .route("/update", post(admin::update))
            .route("/catalog/counts", get(admin::counts))
            .route("/catalog/publish_all", post(admin::publish_all))
            .route("/catalog/unpublish_all", post(admin::unpublish_all))
            .route("/catalog/{id}/publish", post(admin::publish))
            .route("/catalog/{id}/unpublish", post(admin::unpublish))
            .route("/identity", get(admin::get_identity).put(admin::edit_identity));
        Router::new()
            .route("/", get(self_description))
            .route("/about", get(self_description).post(about_message))
            .route("/infrastructure", post(infrastructure_message))
            .route("/data", post(data_message))
            .nest("/admin", admin)
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves until the process stops.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|err| ServerError::Transport(format!("bind {} failed: {err}", self.bind)))?;
        self.serve_listener(listener).await
    }

    /// Serves on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when serving fails.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let app = self.app();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
    }
}

// ============================================================================
// SECTION: Protocol Handlers
// ============================================================================

/// `POST /infrastructure`: any message kind.
async fn infrastructure_message(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    route_message(&state, &headers, body, None).await
}

/// `POST /about`: description requests only.
async fn about_message(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    route_message(&state, &headers, body, Some(MessageKind::DescriptionRequest)).await
}

/// `POST /data`: artifact requests only.
async fn data_message(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    route_message(&state, &headers, body, Some(MessageKind::ArtifactRequest)).await
}

/// Routes one protocol message and encodes the reply envelope.
///
/// Bodies that cannot be read, including those over the size limit, are
/// answered with a malformed-message rejection.
async fn route_message(
    state: &ServerState,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
    expected: Option<MessageKind>,
) -> Response {
    let envelope = match body {
        Ok(body) => {
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            state
                .router
                .route(InboundMessage {
                    content_type,
                    body,
                    expected,
                })
                .await
        }
        Err(rejection) => state.router.reject_unreadable(expected, rejection.body_text()).await,
    };
    match envelope.encode() {
        Ok(encoded) => ([(CONTENT_TYPE, encoded.content_type)], encoded.body).into_response(),
        Err(err) => {
            report_fault("envelope_encode", &err.to_string());
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /` and `GET /about`: the self-description document.
async fn self_description(State(state): State<Arc<ServerState>>) -> Response {
    match state.router.self_description().await {
        Ok(document) => Json(document).into_response(),
        Err(err) => {
            report_fault("self_description", &err.to_string());
            (StatusCode::INTERNAL_SERVER_ERROR, "self-description unavailable").into_response()
        }
    }
}

// ============================================================================
// SECTION: Component Builders
// ============================================================================

/// Opens the configured store and seeds its identity.
async fn build_stores(config: &ConnectorConfig) -> Result<StoreHandles, ServerError> {
    let seed = config.identity.as_ref().map(connector_config::IdentityConfig::to_identity);
    match config.store.store_type {
        StoreType::Memory => {
            let identity = seed.ok_or_else(|| {
                ServerError::Config("memory store requires an [identity] section".to_string())
            })?;
            Ok(StoreHandles::shared(Arc::new(InMemoryConnectorStore::with_identity(identity))))
        }
        StoreType::Sqlite => {
            let sqlite = config.store.sqlite().ok_or_else(|| {
                ServerError::Config("sqlite store requires path".to_string())
            })?;
            let store = SqliteConnectorStore::open(&sqlite)
                .map_err(|err| ServerError::Init(err.to_string()))?;
            if let Some(identity) = &seed {
                store
                    .seed_identity_if_absent(identity)
                    .map_err(|err| ServerError::Init(err.to_string()))?;
            }
            match store.identity().await {
                Ok(_) => {}
                Err(StoreError::NotFound(_)) => {
                    return Err(ServerError::Config(
                        "store has no identity; add an [identity] section".to_string(),
                    ));
                }
                Err(err) => return Err(ServerError::Init(err.to_string())),
            }
            Ok(StoreHandles::shared(Arc::new(store)))
        }
    }
}

/// Builds the outbound token issuer.
fn build_issuer(config: &TokenIssuerConfig) -> Result<Arc<dyn TokenIssuer>, ServerError> {
    match config {
        TokenIssuerConfig::Static {
            token,
        } => Ok(Arc::new(StaticTokenIssuer::new(token.clone()))),
        TokenIssuerConfig::Http {
            url,
            timeout_ms,
        } => {
            let issuer = HttpTokenIssuer::new(url, Duration::from_millis(*timeout_ms))
                .map_err(|err| ServerError::Init(err.to_string()))?;
            Ok(Arc::new(issuer))
        }
    }
}

/// Builds the inbound token authenticator.
fn build_authenticator(config: &ProtocolConfig) -> Arc<dyn TokenAuthenticator> {
    if config.accepted_tokens.is_empty() {
        Arc::new(AcceptAllAuthenticator)
    } else {
        Arc::new(AllowListAuthenticator::new(config.accepted_tokens.iter().cloned()))
    }
}

/// Builds the router policy.
fn router_policy(config: &ProtocolConfig) -> RouterPolicy {
    RouterPolicy {
        placeholder_token: config.permissive.then(|| config.placeholder_token.clone()),
        fallback_correlation_uri: config.fallback_correlation_uri.clone(),
    }
}

/// Builds the audit sink.
fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn ConnectorAuditSink>, ServerError> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| ServerError::Init(format!("audit log {path}: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Writes an unexpected server fault as a JSON line to stderr.
fn report_fault(context: &str, detail: &str) {
    let line = json!({
        "event": "server_fault",
        "context": context,
        "detail": detail,
    });
    let _ = writeln!(std::io::stderr(), "{line}");
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Connector server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
