// crates/connector-core/src/test_support.rs
// ============================================================================
// Module: Test Support
// Description: Fixtures and fake adapters shared by unit tests.
// Purpose: Keep per-module tests focused on behavior.
// Dependencies: async-trait, bytes
// ============================================================================

//! ## Overview
//! Fixture builders and trait fakes for the connector core unit tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only fixtures."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use bytes::Bytes;

use crate::interfaces::ArtifactError;
use crate::interfaces::ArtifactPayload;
use crate::interfaces::ArtifactSource;
use crate::interfaces::AuthenticationError;
use crate::interfaces::TokenAuthenticator;
use crate::interfaces::TokenError;
use crate::interfaces::TokenIssuer;
use crate::model::CatalogEntry;
use crate::model::ConnectorIdentity;
use crate::model::Distribution;
use crate::model::DistributionId;
use crate::model::EntryId;
use crate::model::EntryStatus;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Base URL used by fixture identities.
pub const BASE_URL: &str = "https://connector.example.com";

/// Builds a valid identity rooted at [`BASE_URL`].
pub fn identity() -> ConnectorIdentity {
    ConnectorIdentity {
        base_url: BASE_URL.to_string(),
        maintainer_uri: "https://example.com/maintainer".to_string(),
        curator_uri: "https://example.com/curator".to_string(),
        country_uri: "https://example.com/country/DE".to_string(),
        title: "Test Connector".to_string(),
        supported_protocol_versions: BTreeSet::from(["4.0.0".to_string()]),
        outbound_protocol_version: "4.0.0".to_string(),
        declared_version: "2.0.0".to_string(),
    }
}

/// Builds an entry with resource id `res-<id>`.
pub fn entry(id: i64, status: EntryStatus) -> CatalogEntry {
    CatalogEntry {
        id: EntryId::new(id),
        resource_id: format!("res-{id}"),
        title: format!("Dataset {id}"),
        description: format!("Description {id}"),
        publisher: "https://example.com/publisher".to_string(),
        license: "https://example.com/license".to_string(),
        version: "1".to_string(),
        tags: BTreeSet::from(["mobility".to_string()]),
        status,
        additional_metadata: BTreeMap::new(),
    }
}

/// Builds a distribution under `dataset_id`.
pub fn distribution(id: i64, dataset_id: &str) -> Distribution {
    Distribution {
        id: DistributionId::new(id),
        resource_id: format!("dist-{id}"),
        dataset_id: dataset_id.to_string(),
        title: Some(format!("File {id}")),
        description: None,
        filename: format!("file-{id}.csv"),
        filetype: "csv".to_string(),
        byte_size: 3,
        license: String::new(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
        additional_metadata: BTreeMap::new(),
    }
}

// ============================================================================
// SECTION: Fakes
// ============================================================================

/// Issues `token-<n>` with an increasing counter.
#[derive(Default)]
pub struct CountingIssuer {
    /// Tokens issued so far.
    issued: AtomicUsize,
}

#[async_trait]
impl TokenIssuer for CountingIssuer {
    async fn issue_token(&self) -> Result<String, TokenError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(format!("token-{n}"))
    }
}

/// Issuer that always fails.
pub struct FailingIssuer;

#[async_trait]
impl TokenIssuer for FailingIssuer {
    async fn issue_token(&self) -> Result<String, TokenError> {
        Err(TokenError::Unavailable("daps offline".to_string()))
    }
}

/// Authenticator accepting only `valid-token`.
pub struct FixedAuthenticator;

#[async_trait]
impl TokenAuthenticator for FixedAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<(), AuthenticationError> {
        if token == "valid-token" {
            Ok(())
        } else {
            Err(AuthenticationError::Rejected("unknown token".to_string()))
        }
    }
}

/// Authenticator that cannot be reached.
pub struct OfflineAuthenticator;

#[async_trait]
impl TokenAuthenticator for OfflineAuthenticator {
    async fn authenticate(&self, _token: &str) -> Result<(), AuthenticationError> {
        Err(AuthenticationError::Unavailable("daps offline".to_string()))
    }
}

/// Artifact source serving `abc` for every distribution.
pub struct StaticArtifacts;

#[async_trait]
impl ArtifactSource for StaticArtifacts {
    async fn fetch(&self, distribution: &Distribution) -> Result<ArtifactPayload, ArtifactError> {
        Ok(ArtifactPayload {
            filename: distribution.filename.clone(),
            content_type: "text/csv".to_string(),
            bytes: Bytes::from_static(b"abc"),
        })
    }
}

/// Artifact source whose files are missing.
pub struct MissingArtifacts;

#[async_trait]
impl ArtifactSource for MissingArtifacts {
    async fn fetch(&self, distribution: &Distribution) -> Result<ArtifactPayload, ArtifactError> {
        Err(ArtifactError::Missing(distribution.filename.clone()))
    }
}
