// crates/connector-server/src/artifacts.rs
// ============================================================================
// Module: Directory Artifact Source
// Description: Serves distribution bytes from a local directory.
// Purpose: Reference artifact source with path traversal protection.
// Dependencies: connector-core, tokio
// ============================================================================

//! ## Overview
//! A distribution's `filename` is resolved under the configured root. The
//! resolved path must stay inside the root after symlink resolution, and
//! files above [`MAX_ARTIFACT_BYTES`] are refused.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::ErrorKind;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use connector_core::ArtifactError;
use connector_core::ArtifactPayload;
use connector_core::ArtifactSource;
use connector_core::Distribution;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest artifact served in one response.
pub const MAX_ARTIFACT_BYTES: u64 = 256 * 1024 * 1024;

// ============================================================================
// SECTION: Source
// ============================================================================

/// File-backed artifact source rooted at one directory.
#[derive(Debug, Clone)]
pub struct DirectoryArtifactSource {
    /// Root directory.
    root: PathBuf,
}

impl DirectoryArtifactSource {
    /// Creates a source rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Resolves `filename` under the root.
    async fn resolve(&self, filename: &str) -> Result<PathBuf, ArtifactError> {
        let relative = Path::new(filename);
        let plain = !filename.is_empty()
            && relative.components().all(|component| matches!(component, Component::Normal(_)));
        if !plain {
            return Err(ArtifactError::Missing(format!("invalid artifact filename: {filename}")));
        }
        let root = tokio::fs::canonicalize(&self.root).await.map_err(io_error)?;
        let resolved = tokio::fs::canonicalize(root.join(relative)).await.map_err(io_error)?;
        if !resolved.starts_with(&root) {
            return Err(ArtifactError::Missing("artifact escapes configured root".to_string()));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl ArtifactSource for DirectoryArtifactSource {
    async fn fetch(&self, distribution: &Distribution) -> Result<ArtifactPayload, ArtifactError> {
        let path = self.resolve(&distribution.filename).await?;
        let metadata = tokio::fs::metadata(&path).await.map_err(io_error)?;
        if !metadata.is_file() {
            return Err(ArtifactError::Missing(format!("{} is not a file", distribution.filename)));
        }
        if metadata.len() > MAX_ARTIFACT_BYTES {
            return Err(ArtifactError::Io(format!("{} exceeds size limit", distribution.filename)));
        }
        let bytes = tokio::fs::read(&path).await.map_err(io_error)?;
        Ok(ArtifactPayload {
            filename: distribution.filename.clone(),
            content_type: content_type(&distribution.filetype).to_string(),
            bytes: Bytes::from(bytes),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps an I/O error to an artifact error.
fn io_error(err: std::io::Error) -> ArtifactError {
    if err.kind() == ErrorKind::NotFound {
        ArtifactError::Missing(err.to_string())
    } else {
        ArtifactError::Io(err.to_string())
    }
}

/// Maps a file type label to a content type.
fn content_type(filetype: &str) -> &'static str {
    match filetype.trim().to_ascii_lowercase().as_str() {
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" | "text" => "text/plain",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
