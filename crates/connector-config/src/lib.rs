// crates/connector-config/src/lib.rs
// ============================================================================
// Module: Dataspace Connector Config
// Description: Configuration model and validation for the connector.
// Purpose: Single source of truth for connector.toml.
// Dependencies: connector-core, connector-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Loads `connector.toml` and validates every section before any component
//! is built from it. See [`ConnectorConfig::load`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AdminAuthConfig;
pub use config::AdminAuthMode;
pub use config::ArtifactsConfig;
pub use config::AuditConfig;
pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::ConnectorConfig;
pub use config::DEFAULT_CONFIG_NAME;
pub use config::IdentityConfig;
pub use config::ProtocolConfig;
pub use config::ServerConfig;
pub use config::StoreConfig;
pub use config::StoreType;
pub use config::TokenIssuerConfig;
pub use config::TransportConfig;
