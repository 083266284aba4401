// crates/connector-core/src/protocol.rs
// ============================================================================
// Module: Protocol Messages
// Description: Message headers exchanged with peers and brokers.
// Purpose: Closed set of protocol message types with JSON-LD serialization.
// Dependencies: rand, serde, time
// ============================================================================

//! ## Overview
//! Every protocol message is a [`MessageHeader`]: common fields plus a
//! [`ProtocolMessage`] variant selected by the JSON-LD `@type` key. The set of
//! variants is closed; unknown `@type` values fail deserialization and are
//! answered as malformed input by the router.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// JSON-LD type label for dynamic attribute tokens.
const TOKEN_TYPE: &str = "ids:DynamicAttributeToken";

// ============================================================================
// SECTION: Message Types
// ============================================================================

/// Protocol message variants, tagged by `@type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ProtocolMessage {
    /// Request for the connector self-description.
    #[serde(rename = "ids:DescriptionRequestMessage")]
    DescriptionRequest,
    /// Request for an artifact.
    #[serde(rename = "ids:ArtifactRequestMessage")]
    ArtifactRequest {
        /// URI of the requested artifact; its last path segment is the id.
        #[serde(rename = "requestedArtifact")]
        requested_artifact: String,
    },
    /// Response carrying the self-description.
    #[serde(rename = "ids:DescriptionResponseMessage")]
    DescriptionResponse,
    /// Response carrying an artifact.
    #[serde(rename = "ids:ArtifactResponseMessage")]
    ArtifactResponse,
    /// Broker subscribe notification.
    #[serde(rename = "ids:ConnectorUpdateMessage")]
    ConnectorUpdate,
    /// Broker subscribe notification for a newly available connector.
    #[serde(rename = "ids:ConnectorAvailableMessage")]
    ConnectorAvailable,
    /// Broker unsubscribe notification.
    #[serde(rename = "ids:ConnectorUnavailableMessage")]
    ConnectorUnavailable,
    /// Structured rejection.
    #[serde(rename = "ids:RejectionMessage")]
    Rejection {
        /// Rejection reason.
        #[serde(rename = "rejectionReason")]
        rejection_reason: RejectionReason,
    },
}

impl ProtocolMessage {
    /// Returns the payload-free kind of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::DescriptionRequest => MessageKind::DescriptionRequest,
            Self::ArtifactRequest {
                ..
            } => MessageKind::ArtifactRequest,
            Self::DescriptionResponse => MessageKind::DescriptionResponse,
            Self::ArtifactResponse => MessageKind::ArtifactResponse,
            Self::ConnectorUpdate => MessageKind::ConnectorUpdate,
            Self::ConnectorAvailable => MessageKind::ConnectorAvailable,
            Self::ConnectorUnavailable => MessageKind::ConnectorUnavailable,
            Self::Rejection {
                ..
            } => MessageKind::Rejection,
        }
    }
}

/// Message kind without variant data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// See [`ProtocolMessage::DescriptionRequest`].
    DescriptionRequest,
    /// See [`ProtocolMessage::ArtifactRequest`].
    ArtifactRequest,
    /// See [`ProtocolMessage::DescriptionResponse`].
    DescriptionResponse,
    /// See [`ProtocolMessage::ArtifactResponse`].
    ArtifactResponse,
    /// See [`ProtocolMessage::ConnectorUpdate`].
    ConnectorUpdate,
    /// See [`ProtocolMessage::ConnectorAvailable`].
    ConnectorAvailable,
    /// See [`ProtocolMessage::ConnectorUnavailable`].
    ConnectorUnavailable,
    /// See [`ProtocolMessage::Rejection`].
    Rejection,
}

impl MessageKind {
    /// Returns a stable label for audit output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DescriptionRequest => "description_request",
            Self::ArtifactRequest => "artifact_request",
            Self::DescriptionResponse => "description_response",
            Self::ArtifactResponse => "artifact_response",
            Self::ConnectorUpdate => "connector_update",
            Self::ConnectorAvailable => "connector_available",
            Self::ConnectorUnavailable => "connector_unavailable",
            Self::Rejection => "rejection",
        }
    }
}

/// Rejection reasons reported to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    /// Input could not be parsed or did not match the endpoint.
    MalformedMessage,
    /// Security token missing or invalid.
    NotAuthenticated,
    /// Message type is known but not handled here.
    MessageTypeNotSupported,
    /// A dependency of this connector failed.
    InternalRecipientError,
    /// Requested artifact does not exist.
    NotFound,
}

impl RejectionReason {
    /// Returns a stable label for audit output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::MalformedMessage => "malformed_message",
            Self::NotAuthenticated => "not_authenticated",
            Self::MessageTypeNotSupported => "message_type_not_supported",
            Self::InternalRecipientError => "internal_recipient_error",
            Self::NotFound => "not_found",
        }
    }
}

// ============================================================================
// SECTION: Header
// ============================================================================

/// Security token attached to a message header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityToken {
    /// JSON-LD type label.
    #[serde(rename = "@type", default = "default_token_type")]
    pub token_type: String,
    /// Opaque token value.
    #[serde(rename = "tokenValue")]
    pub token_value: String,
}

impl SecurityToken {
    /// Wraps an opaque token value.
    #[must_use]
    pub fn new(token_value: impl Into<String>) -> Self {
        Self {
            token_type: default_token_type(),
            token_value: token_value.into(),
        }
    }
}

/// Protocol message header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    /// Message identifier.
    #[serde(rename = "@id")]
    pub id: String,
    /// Variant data, including the `@type` tag.
    #[serde(flatten)]
    pub message: ProtocolMessage,
    /// Issue time (RFC 3339).
    pub issued: String,
    /// Protocol model version.
    pub model_version: String,
    /// Identifier of the issuing connector.
    pub issuer_connector: String,
    /// Identifier of the message this one answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_message: Option<String>,
    /// Security token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_token: Option<SecurityToken>,
}

impl MessageHeader {
    /// Returns the kind of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.message.kind()
    }

    /// Returns the security token value, if present.
    #[must_use]
    pub fn token_value(&self) -> Option<&str> {
        self.security_token.as_ref().map(|token| token.token_value.as_str())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns a fresh message identifier rooted at `base`.
#[must_use]
pub fn new_message_id(base: &str) -> String {
    let nonce: u128 = rand::thread_rng().r#gen();
    format!("{}/message/{nonce:032x}", base.trim_end_matches('/'))
}

/// Returns the current UTC time formatted as RFC 3339.
#[must_use]
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// Returns the default token type label.
fn default_token_type() -> String {
    TOKEN_TYPE.to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
