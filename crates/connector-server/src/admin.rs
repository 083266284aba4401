// crates/connector-server/src/admin.rs
// ============================================================================
// Module: Admin Surface
// Description: Administrative REST handlers for brokers, catalog, identity.
// Purpose: Drive broker sync operations and report outcomes as JSON replies.
// Dependencies: axum, connector-broker, connector-core, serde_json
// ============================================================================

//! ## Overview
//! Every admin handler is guarded by [`Admitted`], which applies the
//! configured [`crate::auth::AdminAuthz`] and audits the decision. Business
//! failures (unknown ids, delivery failures, consistency faults) are HTTP 200
//! replies with `status = "error"` and a stable `kind`; only unexpected store
//! faults on plain reads produce a 5xx.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::FromRequestParts;
use axum::extract::OriginalUri;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::response::Response;
use connector_broker::EditOutcome;
use connector_broker::FanOutSummary;
use connector_broker::SyncError;
use connector_config::AdminAuthMode;
use connector_core::BrokerId;
use connector_core::ConnectorIdentity;
use connector_core::EntryId;
use connector_core::StoreError;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;

use crate::auth::RequestContext;
use crate::auth::allowed_event;
use crate::auth::denied_event;
use crate::server::ServerState;

// ============================================================================
// SECTION: Replies
// ============================================================================

/// Admin reply status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    /// Operation succeeded.
    Ok,
    /// Operation succeeded with a caveat.
    Info,
    /// Operation failed.
    Error,
}

/// JSON body of every admin reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminReply {
    /// Outcome.
    pub status: ReplyStatus,
    /// Human-readable summary.
    pub text: String,
    /// Stable error kind for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Result data, when the operation returns any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AdminReply {
    /// Builds a success reply.
    fn ok(text: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Ok,
            text: text.into(),
            kind: None,
            data: None,
        }
    }

    /// Builds a failure reply.
    fn error(kind: &str, text: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            text: text.into(),
            kind: Some(kind.to_string()),
            data: None,
        }
    }

    /// Attaches result data.
    fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Sends the reply with HTTP 200.
    fn send(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

impl From<SyncError> for AdminReply {
    fn from(err: SyncError) -> Self {
        Self::error(err.kind(), err.to_string())
    }
}

/// Sends a fan-out outcome.
fn fan_out_reply(text: &str, result: Result<FanOutSummary, SyncError>) -> Response {
    match result {
        Ok(summary) => AdminReply::ok(text)
            .with_data(json!({ "delivered": summary.delivered }))
            .send(),
        Err(err) => AdminReply::from(err).send(),
    }
}

/// Sends a unit outcome.
fn unit_reply(text: &str, result: Result<(), SyncError>) -> Response {
    match result {
        Ok(()) => AdminReply::ok(text).send(),
        Err(err) => AdminReply::from(err).send(),
    }
}

/// Sends a store read fault as a 5xx.
fn store_fault(err: &StoreError) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(AdminReply::error("store", err.to_string())))
        .into_response()
}

/// Parses a JSON request body into `T`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|err| {
        AdminReply::error("invalid_input", format!("invalid request body: {err}")).send()
    })
}

// ============================================================================
// SECTION: Admission
// ============================================================================

/// Marker extractor for an authorized admin request.
pub struct Admitted;

impl FromRequestParts<Arc<ServerState>> for Admitted {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerState>,
    ) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext {
            peer_ip: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(peer)| peer.ip()),
            auth_header: parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        };
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map_or_else(|| parts.uri.path(), |OriginalUri(uri)| uri.path());
        let action = format!("{} {path}", parts.method);
        match state.admin_authz.authorize(&ctx) {
            Ok(auth) => {
                state.audit.record_admin_auth(&allowed_event(&ctx, &action, &auth));
                Ok(Self)
            }
            Err(err) => {
                state.audit.record_admin_auth(&denied_event(&ctx, &action, &err));
                let mut response = (
                    StatusCode::UNAUTHORIZED,
                    Json(AdminReply::error("unauthenticated", err.to_string())),
                )
                    .into_response();
                if state.admin_authz.mode() == AdminAuthMode::BearerToken {
                    response
                        .headers_mut()
                        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                }
                Err(response)
            }
        }
    }
}

// ============================================================================
// SECTION: Broker Handlers
// ============================================================================

/// `POST /admin/brokers` body.
#[derive(Debug, Deserialize)]
struct AddBrokerRequest {
    /// Broker infrastructure endpoint.
    url: String,
}

/// Adds and subscribes a broker.
pub async fn add_broker(
    _admitted: Admitted,
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Response {
    let request: AddBrokerRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.coordinator.add(&request.url).await {
        Ok(broker) => AdminReply::ok("broker added")
            .with_data(serde_json::to_value(&broker).unwrap_or(Value::Null))
            .send(),
        Err(err) => AdminReply::from(err).send(),
    }
}

/// Lists every broker row.
pub async fn list_brokers(_admitted: Admitted, State(state): State<Arc<ServerState>>) -> Response {
    match state.brokers.brokers().await {
        Ok(brokers) => AdminReply::ok(format!("{} brokers", brokers.len()))
            .with_data(serde_json::to_value(&brokers).unwrap_or(Value::Null))
            .send(),
        Err(err) => store_fault(&err),
    }
}

/// Subscribes a broker.
pub async fn register_broker(
    _admitted: Admitted,
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Response {
    unit_reply("broker registered", state.coordinator.register(BrokerId::new(id)).await)
}

/// Unsubscribes a broker.
pub async fn unregister_broker(
    _admitted: Admitted,
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Response {
    unit_reply("broker unregistered", state.coordinator.unregister(BrokerId::new(id)).await)
}

/// Unsubscribes and deletes a broker.
pub async fn delete_broker(
    _admitted: Admitted,
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Response {
    unit_reply("broker deleted", state.coordinator.delete(BrokerId::new(id)).await)
}

/// Sends an update to every registered broker.
pub async fn update(_admitted: Admitted, State(state): State<Arc<ServerState>>) -> Response {
    fan_out_reply("brokers updated", state.coordinator.update().await)
}

// ============================================================================
// SECTION: Catalog Handlers
// ============================================================================

/// Publishes one entry.
pub async fn publish(
    _admitted: Admitted,
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Response {
    fan_out_reply("entry published", state.coordinator.publish(EntryId::new(id)).await)
}

/// Unpublishes one entry.
pub async fn unpublish(
    _admitted: Admitted,
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Response {
    fan_out_reply("entry unpublished", state.coordinator.unpublish(EntryId::new(id)).await)
}

/// Publishes every entry.
pub async fn publish_all(_admitted: Admitted, State(state): State<Arc<ServerState>>) -> Response {
    fan_out_reply("all entries published", state.coordinator.publish_all().await)
}

/// Unpublishes every entry.
pub async fn unpublish_all(
    _admitted: Admitted,
    State(state): State<Arc<ServerState>>,
) -> Response {
    fan_out_reply("all entries unpublished", state.coordinator.unpublish_all().await)
}

/// Reports entry counts.
pub async fn counts(_admitted: Admitted, State(state): State<Arc<ServerState>>) -> Response {
    match state.catalog.counts().await {
        Ok(counts) => AdminReply::ok(format!("{} of {} published", counts.published, counts.total))
            .with_data(serde_json::to_value(counts).unwrap_or(Value::Null))
            .send(),
        Err(err) => store_fault(&err),
    }
}

// ============================================================================
// SECTION: Identity Handlers
// ============================================================================

/// Returns the current identity.
pub async fn get_identity(_admitted: Admitted, State(state): State<Arc<ServerState>>) -> Response {
    match state.config.identity().await {
        Ok(identity) => AdminReply::ok("identity")
            .with_data(serde_json::to_value(&identity).unwrap_or(Value::Null))
            .send(),
        Err(err) => store_fault(&err),
    }
}

/// Replaces the identity and re-announces it.
pub async fn edit_identity(
    _admitted: Admitted,
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Response {
    let identity: ConnectorIdentity = match parse_body(&body) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    match state.coordinator.edit_identity(identity).await {
        Ok(EditOutcome::Applied) => AdminReply::ok("identity updated").send(),
        Ok(EditOutcome::Partial {
            detail,
        }) => AdminReply {
            status: ReplyStatus::Info,
            text: format!("identity updated; re-subscribe incomplete: {detail}"),
            kind: Some("partial".to_string()),
            data: None,
        }
        .send(),
        Err(err) => AdminReply::from(err).send(),
    }
}
