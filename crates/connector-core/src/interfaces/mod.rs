// crates/connector-core/src/interfaces/mod.rs
// ============================================================================
// Module: Connector Interfaces
// Description: Backend-agnostic traits for stores, tokens, artifacts, transport.
// Purpose: Narrow seams the router and broker sync are written against.
// Dependencies: async-trait, bytes, thiserror
// ============================================================================

//! ## Overview
//! The router, assembler, and broker sync coordinator never touch a database,
//! an HTTP client, or a token service directly. They depend on the traits in
//! this module, which are implemented by the `SQLite` store, the in-memory
//! store, the HTTP transport, and the server's token and artifact adapters.
//! All traits are object safe and shared as `Arc<dyn Trait>`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::envelope::EncodedEnvelope;
use crate::model::BrokerId;
use crate::model::BrokerRegistration;
use crate::model::BrokerStatus;
use crate::model::CatalogCounts;
use crate::model::CatalogSnapshot;
use crate::model::ConnectorIdentity;
use crate::model::Distribution;
use crate::model::DistributionId;
use crate::model::EntryId;
use crate::model::EntryStatus;
use crate::protocol::RejectionReason;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Store errors shared by all persistence traits.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Store data is corrupted.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Store schema version is incompatible.
    #[error("store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data or input is invalid.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Store reported an error.
    #[error("store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Stores
// ============================================================================

/// Source of the connector's own identity.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Returns the current identity snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the identity cannot be read.
    async fn identity(&self) -> Result<ConnectorIdentity, StoreError>;

    /// Replaces the stored identity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the identity cannot be written.
    async fn save_identity(&self, identity: &ConnectorIdentity) -> Result<(), StoreError>;
}

/// Catalog of offered datasets.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns published entries and their distributions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the catalog cannot be read.
    async fn published_snapshot(&self) -> Result<CatalogSnapshot, StoreError>;

    /// Returns a distribution whose parent entry is published.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the catalog cannot be read.
    async fn published_distribution(
        &self,
        id: DistributionId,
    ) -> Result<Option<Distribution>, StoreError>;

    /// Sets the status of one entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown entries, or another
    /// [`StoreError`] when the write fails.
    async fn set_entry_status(&self, id: EntryId, status: EntryStatus) -> Result<(), StoreError>;

    /// Sets the status of every entry and returns the number changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    async fn set_all_entry_status(&self, status: EntryStatus) -> Result<u64, StoreError>;

    /// Returns entry counts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the catalog cannot be read.
    async fn counts(&self) -> Result<CatalogCounts, StoreError>;
}

/// Persistence for broker registrations.
#[async_trait]
pub trait BrokerStore: Send + Sync {
    /// Inserts a new `REGISTERED` row for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    async fn insert_broker(&self, url: &str) -> Result<BrokerRegistration, StoreError>;

    /// Returns one registration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    async fn broker(&self, id: BrokerId) -> Result<Option<BrokerRegistration>, StoreError>;

    /// Returns all registrations ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    async fn brokers(&self) -> Result<Vec<BrokerRegistration>, StoreError>;

    /// Returns `REGISTERED` registrations ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    async fn registered_brokers(&self) -> Result<Vec<BrokerRegistration>, StoreError>;

    /// Updates the status of one registration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown rows, or another
    /// [`StoreError`] when the write fails.
    async fn set_broker_status(&self, id: BrokerId, status: BrokerStatus)
    -> Result<(), StoreError>;

    /// Deletes one registration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown rows, or another
    /// [`StoreError`] when the delete fails.
    async fn delete_broker(&self, id: BrokerId) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Tokens
// ============================================================================

/// Token issuance failures.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Issuer could not be reached or refused to issue.
    #[error("token issuer unavailable: {0}")]
    Unavailable(String),
}

/// Issues security tokens for outbound documents and headers.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issues a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when no token can be issued.
    async fn issue_token(&self) -> Result<String, TokenError>;
}

/// Token validation failures.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// Token is invalid.
    #[error("token rejected: {0}")]
    Rejected(String),
    /// Authenticator could not be reached.
    #[error("authenticator unavailable: {0}")]
    Unavailable(String),
}

/// Validates inbound security tokens.
#[async_trait]
pub trait TokenAuthenticator: Send + Sync {
    /// Validates a token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError`] when the token is rejected or cannot be
    /// checked.
    async fn authenticate(&self, token: &str) -> Result<(), AuthenticationError>;
}

// ============================================================================
// SECTION: Artifacts
// ============================================================================

/// Bytes of one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPayload {
    /// File name advertised to the peer.
    pub filename: String,
    /// Content type of the bytes.
    pub content_type: String,
    /// Artifact bytes.
    pub bytes: Bytes,
}

/// Artifact source failures.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Backing file or object is missing.
    #[error("artifact missing: {0}")]
    Missing(String),
    /// Backing storage failed.
    #[error("artifact io error: {0}")]
    Io(String),
}

/// Turns a distribution into payload bytes.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Fetches the bytes of a distribution.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] when the bytes cannot be produced.
    async fn fetch(&self, distribution: &Distribution) -> Result<ArtifactPayload, ArtifactError>;
}

// ============================================================================
// SECTION: Registry Transport
// ============================================================================

/// Broker delivery failures.
///
/// # Invariants
/// - Variants are stable for error classification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Broker URL is malformed.
    #[error("invalid broker url: {0}")]
    InvalidUrl(String),
    /// Broker host name could not be resolved.
    #[error("broker unreachable: {0}")]
    HostUnreachable(String),
    /// Connection to a resolved broker host failed (refused, reset, TLS).
    #[error("broker connection failed: {0}")]
    ConnectionFailed(String),
    /// Connect or request timeout elapsed.
    #[error("broker timeout: {0}")]
    Timeout(String),
    /// Broker answered with a rejection message.
    #[error("broker rejected message: {}", reason.label())]
    RemoteRejected {
        /// Rejection reason reported by the broker.
        reason: RejectionReason,
    },
    /// Broker answered with an error status and no rejection message.
    #[error("broker http status {0}")]
    HttpStatus(u16),
    /// Other I/O failure.
    #[error("broker io error: {0}")]
    Io(String),
}

impl TransportError {
    /// Returns true when the broker is considered already gone.
    ///
    /// Only malformed URLs and unresolvable host names qualify; a broker that
    /// refuses connections may still hold the subscription.
    #[must_use]
    pub const fn broker_is_gone(&self) -> bool {
        matches!(self, Self::InvalidUrl(_) | Self::HostUnreachable(_))
    }

    /// Returns a stable label for audit output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::HostUnreachable(_) => "host_unreachable",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::Timeout(_) => "timeout",
            Self::RemoteRejected {
                ..
            } => "remote_rejected",
            Self::HttpStatus(_) => "http_status",
            Self::Io(_) => "io",
        }
    }
}

/// Delivers encoded envelopes to broker endpoints.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// POSTs an envelope to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on network failure or remote rejection.
    async fn deliver(&self, url: &str, envelope: &EncodedEnvelope) -> Result<(), TransportError>;
}
