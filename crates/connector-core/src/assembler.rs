// crates/connector-core/src/assembler.rs
// ============================================================================
// Module: Self-Description Assembler
// Description: Builds the connector self-description and outbound headers.
// Purpose: Deterministic, token-bearing documents from identity and catalog.
// Dependencies: serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! The assembler turns a [`ConnectorIdentity`] and a published
//! [`CatalogSnapshot`] into a [`ConnectorDocument`], and builds every header
//! the connector sends. Each document and header carries a freshly issued
//! token; when the issuer fails the assembly fails and nothing partial is
//! returned. Rejections are the exception: they fall back to no token so a
//! peer always receives a reply.
//!
//! For unchanged inputs two documents differ only in `securityToken` and
//! `issued`: identifiers derive from stable ids and every collection is
//! ordered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::envelope::Envelope;
use crate::envelope::Payload;
use crate::interfaces::CatalogStore;
use crate::interfaces::TokenIssuer;
use crate::model::CatalogEntry;
use crate::model::CatalogSnapshot;
use crate::model::ConnectorIdentity;
use crate::model::DEFAULT_MODEL_VERSION;
use crate::model::Distribution;
use crate::protocol::MessageHeader;
use crate::protocol::ProtocolMessage;
use crate::protocol::RejectionReason;
use crate::protocol::SecurityToken;
use crate::protocol::new_message_id;
use crate::protocol::now_rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator used when flattening multi-valued metadata.
pub const METADATA_SEPARATOR: &str = ", ";

/// Static endpoint names, paths, and descriptions.
const STATIC_ENDPOINTS: [(&str, &str, &str); 4] = [
    (
        "infrastructure",
        "infrastructure",
        "All IDS Multipart messages should be sent to this endpoint.",
    ),
    (
        "data",
        "data",
        "IDS ArtifactRequestMessages can be sent to this endpoint via POST request.",
    ),
    (
        "about-message",
        "about",
        "IDS DescriptionRequestMessages can be sent to this endpoint via POST request.",
    ),
    (
        "about",
        "about",
        "The Connector SelfDescription can be obtained from this endpoint via GET request.",
    ),
];

// ============================================================================
// SECTION: Document Types
// ============================================================================

/// Connector self-description document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorDocument {
    /// Connector identifier (`<base>#Connector`).
    #[serde(rename = "@id")]
    pub id: String,
    /// JSON-LD type.
    #[serde(rename = "@type")]
    pub doc_type: String,
    /// Connector title.
    pub title: String,
    /// Maintainer URI.
    pub maintainer: String,
    /// Curator URI.
    pub curator: String,
    /// Jurisdiction country URI.
    pub physical_location: String,
    /// Accepted inbound protocol versions.
    pub inbound_model_version: Vec<String>,
    /// Emitted outbound protocol version.
    pub outbound_model_version: String,
    /// Connector software version.
    pub version: String,
    /// Default endpoint.
    pub has_default_endpoint: Endpoint,
    /// Static endpoints, including the default one.
    pub has_endpoint: Vec<Endpoint>,
    /// Resource catalogs (always exactly one).
    pub resource_catalog: Vec<ResourceCatalog>,
    /// Token issued for this document.
    pub security_token: SecurityToken,
    /// Issue time (RFC 3339).
    pub issued: String,
}

/// Endpoint descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Endpoint identifier.
    #[serde(rename = "@id")]
    pub id: String,
    /// JSON-LD type.
    #[serde(rename = "@type")]
    pub endpoint_type: String,
    /// Access URL.
    pub access_url: String,
    /// Human-readable usage note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_information: Option<String>,
    /// Artifact served by this endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_artifact: Option<ArtifactDescriptor>,
    /// `dct:title` property.
    #[serde(rename = "dct:title", default, skip_serializing_if = "Option::is_none")]
    pub dct_title: Option<String>,
    /// `dct:description` property.
    #[serde(rename = "dct:description", default, skip_serializing_if = "Option::is_none")]
    pub dct_description: Option<String>,
    /// `dct:format` property.
    #[serde(rename = "dct:format", default, skip_serializing_if = "Option::is_none")]
    pub dct_format: Option<String>,
    /// `dct:license` property.
    #[serde(rename = "dct:license", default, skip_serializing_if = "Option::is_none")]
    pub dct_license: Option<String>,
    /// Flattened additional metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// Artifact descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    /// Artifact identifier (`<base>/Artifact/<distribution id>`).
    #[serde(rename = "@id")]
    pub id: String,
    /// JSON-LD type.
    #[serde(rename = "@type")]
    pub artifact_type: String,
    /// File name.
    pub file_name: String,
    /// Size in bytes.
    pub byte_size: u64,
    /// Creation date.
    pub creation_date: String,
}

/// Resource catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCatalog {
    /// Catalog identifier (`<base>#Catalog`).
    #[serde(rename = "@id")]
    pub id: String,
    /// JSON-LD type.
    #[serde(rename = "@type")]
    pub catalog_type: String,
    /// Offered resources ordered by entry id.
    pub offered_resource: Vec<Resource>,
}

/// Resource descriptor for one published catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Resource identifier (`<base>/DataResource/<entry id>`).
    #[serde(rename = "@id")]
    pub id: String,
    /// JSON-LD type.
    #[serde(rename = "@type")]
    pub resource_type: String,
    /// Title.
    pub title: String,
    /// Description; omitted when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Keywords; omitted when no non-empty tag exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<Vec<String>>,
    /// Publisher.
    pub publisher: String,
    /// License reference.
    pub standard_license: String,
    /// Version label.
    pub version: String,
    /// Per-distribution endpoints ordered by distribution id.
    pub resource_endpoint: Vec<Endpoint>,
    /// Flattened additional metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// Broker notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Subscribe (connector available).
    Available,
    /// Unsubscribe (connector unavailable).
    Unavailable,
    /// Self-description changed.
    Update,
}

impl NotificationKind {
    /// Returns the protocol message for this notification.
    #[must_use]
    pub const fn message(self) -> ProtocolMessage {
        match self {
            Self::Available => ProtocolMessage::ConnectorAvailable,
            Self::Unavailable => ProtocolMessage::ConnectorUnavailable,
            Self::Update => ProtocolMessage::ConnectorUpdate,
        }
    }
}

/// Issuer fields placed on a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderOrigin {
    /// Base used for message identifiers.
    pub base: String,
    /// Issuer connector identifier.
    pub issuer_connector: String,
    /// Model version.
    pub model_version: String,
}

impl HeaderOrigin {
    /// Header origin for a known identity.
    #[must_use]
    pub fn from_identity(identity: &ConnectorIdentity) -> Self {
        Self {
            base: identity.base().to_string(),
            issuer_connector: identity.connector_id(),
            model_version: identity.outbound_protocol_version.clone(),
        }
    }

    /// Header origin used when the identity cannot be read.
    #[must_use]
    pub fn fallback(uri: &str) -> Self {
        Self {
            base: uri.trim_end_matches('/').to_string(),
            issuer_connector: uri.to_string(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Assembly failures.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Connector identity could not be read.
    #[error("identity unavailable: {0}")]
    Identity(String),
    /// Catalog could not be read.
    #[error("catalog unavailable: {0}")]
    Catalog(String),
    /// Token could not be issued.
    #[error("token unavailable: {0}")]
    Token(String),
    /// Document could not be serialized.
    #[error("document serialization failed: {0}")]
    Serialization(String),
}

// ============================================================================
// SECTION: Assembler
// ============================================================================

/// Builds self-descriptions and outbound headers.
#[derive(Clone)]
pub struct SelfDescriptionAssembler {
    /// Catalog of offered datasets.
    catalog: Arc<dyn CatalogStore>,
    /// Token issuer.
    issuer: Arc<dyn TokenIssuer>,
}

impl SelfDescriptionAssembler {
    /// Creates an assembler.
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogStore>, issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            catalog,
            issuer,
        }
    }

    /// Builds the connector document from a fresh catalog snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] when the catalog or the issuer fails.
    pub async fn build_connector(
        &self,
        identity: &ConnectorIdentity,
    ) -> Result<ConnectorDocument, AssemblyError> {
        let (snapshot, token) =
            tokio::join!(self.catalog.published_snapshot(), self.issuer.issue_token());
        let snapshot = snapshot.map_err(|err| AssemblyError::Catalog(err.to_string()))?;
        let token = token.map_err(|err| AssemblyError::Token(err.to_string()))?;
        Ok(assemble_connector(identity, &snapshot, token, now_rfc3339()))
    }

    /// Builds a header for `message`, issuing a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Token`] when the issuer fails.
    pub async fn build_header(
        &self,
        message: ProtocolMessage,
        identity: &ConnectorIdentity,
        correlation: Option<&str>,
    ) -> Result<MessageHeader, AssemblyError> {
        let token =
            self.issuer.issue_token().await.map_err(|err| AssemblyError::Token(err.to_string()))?;
        Ok(make_header(
            message,
            &HeaderOrigin::from_identity(identity),
            correlation,
            Some(token),
        ))
    }

    /// Builds a description response envelope correlated to `correlation`.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] when assembly or token issuance fails.
    pub async fn build_response(
        &self,
        correlation: &str,
        identity: &ConnectorIdentity,
    ) -> Result<Envelope, AssemblyError> {
        let (document, header) = tokio::join!(
            self.build_connector(identity),
            self.build_header(ProtocolMessage::DescriptionResponse, identity, Some(correlation)),
        );
        document_envelope(header?, &document?)
    }

    /// Builds an artifact response header correlated to `correlation`.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Token`] when the issuer fails.
    pub async fn build_artifact_response(
        &self,
        correlation: &str,
        identity: &ConnectorIdentity,
    ) -> Result<MessageHeader, AssemblyError> {
        self.build_header(ProtocolMessage::ArtifactResponse, identity, Some(correlation)).await
    }

    /// Builds a broker notification carrying the connector document.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] when assembly or token issuance fails.
    pub async fn build_notification(
        &self,
        kind: NotificationKind,
        identity: &ConnectorIdentity,
    ) -> Result<Envelope, AssemblyError> {
        let (document, header) = tokio::join!(
            self.build_connector(identity),
            self.build_header(kind.message(), identity, None),
        );
        document_envelope(header?, &document?)
    }

    /// Builds a rejection; the token is omitted when the issuer fails.
    pub async fn build_rejection(
        &self,
        origin: &HeaderOrigin,
        correlation: &str,
        reason: RejectionReason,
    ) -> Envelope {
        let token = self.issuer.issue_token().await.ok();
        Envelope::header_only(make_header(
            ProtocolMessage::Rejection {
                rejection_reason: reason,
            },
            origin,
            Some(correlation),
            token,
        ))
    }
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Assembles a connector document from already-fetched inputs.
#[must_use]
pub fn assemble_connector(
    identity: &ConnectorIdentity,
    snapshot: &CatalogSnapshot,
    token: String,
    issued: String,
) -> ConnectorDocument {
    let base = identity.base();
    let (name, path, information) = STATIC_ENDPOINTS[0];
    let default_endpoint = static_endpoint(base, name, path, information);
    let endpoints = STATIC_ENDPOINTS
        .iter()
        .map(|(name, path, information)| static_endpoint(base, name, path, information))
        .collect();

    ConnectorDocument {
        id: identity.connector_id(),
        doc_type: "ids:BaseConnector".to_string(),
        title: identity.title.clone(),
        maintainer: identity.maintainer_uri.clone(),
        curator: identity.curator_uri.clone(),
        physical_location: identity.country_uri.clone(),
        inbound_model_version: identity.supported_protocol_versions.iter().cloned().collect(),
        outbound_model_version: identity.outbound_protocol_version.clone(),
        version: identity.declared_version.clone(),
        has_default_endpoint: default_endpoint,
        has_endpoint: endpoints,
        resource_catalog: vec![ResourceCatalog {
            id: identity.catalog_id(),
            catalog_type: "ids:ResourceCatalog".to_string(),
            offered_resource: assemble_resources(base, snapshot),
        }],
        security_token: SecurityToken::new(token),
        issued,
    }
}

/// Builds resources; distributions without a parent entry are dropped.
fn assemble_resources(base: &str, snapshot: &CatalogSnapshot) -> Vec<Resource> {
    let mut entries: Vec<&CatalogEntry> = snapshot.entries.iter().collect();
    entries.sort_by_key(|entry| entry.id);
    let mut by_resource: BTreeMap<&str, Vec<&Distribution>> =
        entries.iter().map(|entry| (entry.resource_id.as_str(), Vec::new())).collect();
    for distribution in &snapshot.distributions {
        if let Some(children) = by_resource.get_mut(distribution.dataset_id.as_str()) {
            children.push(distribution);
        }
    }
    entries
        .into_iter()
        .map(|entry| {
            let mut children =
                by_resource.get(entry.resource_id.as_str()).cloned().unwrap_or_default();
            children.sort_by_key(|distribution| distribution.id);
            resource(base, entry, &children)
        })
        .collect()
}

/// Builds one resource descriptor.
fn resource(base: &str, entry: &CatalogEntry, distributions: &[&Distribution]) -> Resource {
    Resource {
        id: format!("{base}/DataResource/{}", entry.id),
        resource_type: "ids:DataResource".to_string(),
        title: entry.title.clone(),
        description: non_empty(&entry.description),
        keyword: keywords(&entry.tags),
        publisher: entry.publisher.clone(),
        standard_license: entry.license.clone(),
        version: entry.version.clone(),
        resource_endpoint: distributions
            .iter()
            .map(|distribution| distribution_endpoint(base, distribution))
            .collect(),
        properties: flatten_metadata(&entry.additional_metadata),
    }
}

/// Builds the endpoint for one distribution.
fn distribution_endpoint(base: &str, distribution: &Distribution) -> Endpoint {
    Endpoint {
        id: format!("{base}/ConnectorEndpoint/{}", distribution.id),
        endpoint_type: "ids:ConnectorEndpoint".to_string(),
        access_url: format!("{base}/data/{}", distribution.id),
        endpoint_information: Some(format!(
            "The file {} can be obtained from this endpoint via GET request.",
            distribution.filename
        )),
        endpoint_artifact: Some(ArtifactDescriptor {
            id: format!("{base}/Artifact/{}", distribution.id),
            artifact_type: "ids:Artifact".to_string(),
            file_name: distribution.filename.clone(),
            byte_size: distribution.byte_size,
            creation_date: distribution.created_at.clone(),
        }),
        dct_title: distribution.title.as_deref().and_then(non_empty),
        dct_description: distribution.description.as_deref().and_then(non_empty),
        dct_format: non_empty(&distribution.filetype),
        dct_license: non_empty(&distribution.license),
        properties: flatten_metadata(&distribution.additional_metadata),
    }
}

/// Builds one static endpoint.
fn static_endpoint(base: &str, name: &str, path: &str, information: &str) -> Endpoint {
    Endpoint {
        id: format!("{base}/ConnectorEndpoint/{name}"),
        endpoint_type: "ids:ConnectorEndpoint".to_string(),
        access_url: format!("{base}/{path}"),
        endpoint_information: Some(information.to_string()),
        endpoint_artifact: None,
        dct_title: None,
        dct_description: None,
        dct_format: None,
        dct_license: None,
        properties: BTreeMap::new(),
    }
}

/// Returns non-empty tags in order, or `None` when none remain.
#[must_use]
pub fn keywords(tags: &BTreeSet<String>) -> Option<Vec<String>> {
    let kept: Vec<String> = tags.iter().filter(|tag| !tag.trim().is_empty()).cloned().collect();
    if kept.is_empty() { None } else { Some(kept) }
}

/// Joins each metadata value set with [`METADATA_SEPARATOR`].
///
/// This is lossy: values containing the separator cannot be recovered.
#[must_use]
pub fn flatten_metadata(
    metadata: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, String> {
    metadata
        .iter()
        .map(|(key, values)| {
            let joined =
                values.iter().map(String::as_str).collect::<Vec<_>>().join(METADATA_SEPARATOR);
            (key.clone(), joined)
        })
        .collect()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a header from its parts.
fn make_header(
    message: ProtocolMessage,
    origin: &HeaderOrigin,
    correlation: Option<&str>,
    token: Option<String>,
) -> MessageHeader {
    MessageHeader {
        id: new_message_id(&origin.base),
        message,
        issued: now_rfc3339(),
        model_version: origin.model_version.clone(),
        issuer_connector: origin.issuer_connector.clone(),
        correlation_message: correlation.map(str::to_string),
        security_token: token.map(SecurityToken::new),
    }
}

/// Wraps a header and a connector document into an envelope.
fn document_envelope(
    header: MessageHeader,
    document: &ConnectorDocument,
) -> Result<Envelope, AssemblyError> {
    let value = serde_json::to_value(document)
        .map_err(|err| AssemblyError::Serialization(err.to_string()))?;
    Ok(Envelope {
        header,
        payload: Some(Payload::Document(value)),
    })
}

/// Returns `Some` for non-blank strings.
fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value.to_string()) }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
