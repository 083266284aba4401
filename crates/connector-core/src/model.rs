// crates/connector-core/src/model.rs
// ============================================================================
// Module: Connector Data Model
// Description: Identity, catalog, and broker registration records.
// Purpose: Shared value types exchanged between stores, assembly, and sync.
// Dependencies: serde, url
// ============================================================================

//! ## Overview
//! Plain data records for the connector. Records are snapshots: stores hand
//! out owned copies and nothing in this module performs I/O.
//!
//! Distributions reference their parent entry by `dataset_id`, which holds the
//! parent's `resource_id`. The reference is denormalized and may dangle; the
//! self-description assembler drops dangling distributions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol model version emitted on outbound messages by default.
pub const DEFAULT_MODEL_VERSION: &str = "4.0.0";
/// Connector software version declared in the self-description by default.
pub const DEFAULT_CONNECTOR_VERSION: &str = "2.0.0";

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Declares an integer-backed record identifier.
macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw identifier value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Broker registration row identifier.
    BrokerId
);
record_id!(
    /// Catalog entry identifier.
    EntryId
);
record_id!(
    /// Distribution identifier.
    DistributionId
);

// ============================================================================
// SECTION: Identity
// ============================================================================

/// The connector's own identity.
///
/// # Invariants
/// - `base_url` is an absolute URL; derived identifiers strip a trailing `/`.
/// - Snapshots are immutable; edits replace the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorIdentity {
    /// Public base URL of this connector.
    pub base_url: String,
    /// Maintainer (operator) URI.
    pub maintainer_uri: String,
    /// Curator URI.
    pub curator_uri: String,
    /// Jurisdiction country URI.
    pub country_uri: String,
    /// Human-readable connector title.
    pub title: String,
    /// Protocol model versions accepted inbound.
    pub supported_protocol_versions: BTreeSet<String>,
    /// Protocol model version emitted outbound.
    pub outbound_protocol_version: String,
    /// Declared connector software version.
    pub declared_version: String,
}

impl ConnectorIdentity {
    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Returns the connector document identifier.
    #[must_use]
    pub fn connector_id(&self) -> String {
        format!("{}#Connector", self.base())
    }

    /// Returns the resource catalog identifier.
    #[must_use]
    pub fn catalog_id(&self) -> String {
        format!("{}#Catalog", self.base())
    }

    /// Validates the identity record.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when a field is missing or malformed.
    pub fn validate(&self) -> Result<(), IdentityError> {
        let parsed = Url::parse(&self.base_url)
            .map_err(|err| IdentityError(format!("base_url is not a valid url: {err}")))?;
        if parsed.cannot_be_a_base() {
            return Err(IdentityError("base_url must be hierarchical".to_string()));
        }
        for (field, value) in [
            ("maintainer_uri", &self.maintainer_uri),
            ("curator_uri", &self.curator_uri),
            ("country_uri", &self.country_uri),
            ("title", &self.title),
            ("outbound_protocol_version", &self.outbound_protocol_version),
            ("declared_version", &self.declared_version),
        ] {
            if value.trim().is_empty() {
                return Err(IdentityError(format!("{field} must be non-empty")));
            }
        }
        if self.supported_protocol_versions.is_empty() {
            return Err(IdentityError(
                "supported_protocol_versions must list at least one version".to_string(),
            ));
        }
        Ok(())
    }
}

/// Invalid connector identity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid connector identity: {0}")]
pub struct IdentityError(pub String);

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Publication status of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// Imported but not yet reviewed.
    Unapproved,
    /// Reviewed and eligible for publication.
    Approved,
    /// Exposed to peers.
    Published,
}

impl EntryStatus {
    /// Returns the persisted label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unapproved => "UNAPPROVED",
            Self::Approved => "APPROVED",
            Self::Published => "PUBLISHED",
        }
    }

    /// Parses a persisted label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "UNAPPROVED" => Some(Self::Unapproved),
            "APPROVED" => Some(Self::Approved),
            "PUBLISHED" => Some(Self::Published),
            _ => None,
        }
    }
}

/// A dataset offered by this connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Row identifier.
    pub id: EntryId,
    /// Stable resource identifier referenced by distributions.
    pub resource_id: String,
    /// Dataset title.
    pub title: String,
    /// Dataset description (may be empty).
    #[serde(default)]
    pub description: String,
    /// Publisher URI or name.
    #[serde(default)]
    pub publisher: String,
    /// License reference.
    #[serde(default)]
    pub license: String,
    /// Dataset version label.
    #[serde(default)]
    pub version: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Publication status.
    pub status: EntryStatus,
    /// Extra metadata; each key may carry several values.
    #[serde(default)]
    pub additional_metadata: BTreeMap<String, BTreeSet<String>>,
}

/// A downloadable representation of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    /// Row identifier; the artifact identifier peers request.
    pub id: DistributionId,
    /// Stable resource identifier of this distribution.
    pub resource_id: String,
    /// Parent entry `resource_id`.
    pub dataset_id: String,
    /// Optional distribution title.
    #[serde(default)]
    pub title: Option<String>,
    /// Optional distribution description.
    #[serde(default)]
    pub description: Option<String>,
    /// File name served by the artifact source.
    pub filename: String,
    /// File type label (for example `csv`).
    #[serde(default)]
    pub filetype: String,
    /// Size of the artifact in bytes.
    #[serde(default)]
    pub byte_size: u64,
    /// License reference.
    #[serde(default)]
    pub license: String,
    /// Creation date (RFC 3339).
    #[serde(default)]
    pub created_at: String,
    /// Extra metadata; each key may carry several values.
    #[serde(default)]
    pub additional_metadata: BTreeMap<String, BTreeSet<String>>,
}

/// Read-only catalog snapshot handed to the assembler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    /// Catalog entries.
    pub entries: Vec<CatalogEntry>,
    /// Distributions, joined to entries by `dataset_id`.
    pub distributions: Vec<Distribution>,
}

/// Catalog entry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCounts {
    /// Total number of entries.
    pub total: u64,
    /// Number of published entries.
    pub published: u64,
}

// ============================================================================
// SECTION: Brokers
// ============================================================================

/// Last attempted registration state at a broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerStatus {
    /// Subscribe was the last attempted remote action.
    Registered,
    /// Unsubscribe was the last attempted remote action.
    Unregistered,
}

impl BrokerStatus {
    /// Returns the persisted label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "REGISTERED",
            Self::Unregistered => "UNREGISTERED",
        }
    }

    /// Parses a persisted label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "REGISTERED" => Some(Self::Registered),
            "UNREGISTERED" => Some(Self::Unregistered),
            _ => None,
        }
    }
}

/// A broker the connector advertises itself at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerRegistration {
    /// Row identifier.
    pub id: BrokerId,
    /// Broker infrastructure endpoint.
    pub url: String,
    /// Last attempted remote state.
    pub status: BrokerStatus,
    /// Creation time (milliseconds since epoch).
    pub created_at_ms: i64,
    /// Last update time (milliseconds since epoch).
    pub updated_at_ms: i64,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current unix epoch in milliseconds.
#[must_use]
pub fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
