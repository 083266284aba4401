// crates/connector-server/src/lib.rs
// ============================================================================
// Module: Dataspace Connector Server
// Description: HTTP surfaces and reference collaborators for the connector.
// Purpose: Serve protocol messages, the self-description, and admin calls.
// Dependencies: axum, connector-broker, connector-config, connector-core
// ============================================================================

//! ## Overview
//! This crate hosts the axum server ([`ConnectorServer`]), the admin surface
//! with its authorization policy, the reference token issuers and
//! authenticators, and the directory-backed artifact source.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod admin;
pub mod artifacts;
pub mod auth;
pub mod server;
pub mod tokens;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use admin::AdminReply;
pub use admin::ReplyStatus;
pub use artifacts::DirectoryArtifactSource;
pub use auth::AdminAuthz;
pub use auth::AuthError;
pub use auth::RequestContext;
pub use server::ConnectorServer;
pub use server::ServerError;
pub use server::ServerParts;
pub use server::StoreHandles;
pub use tokens::AcceptAllAuthenticator;
pub use tokens::AllowListAuthenticator;
pub use tokens::HttpTokenIssuer;
pub use tokens::StaticTokenIssuer;
