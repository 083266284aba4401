// crates/connector-store-sqlite/src/lib.rs
// ============================================================================
// Module: Dataspace Connector SQLite Store
// Description: SQLite persistence for identity, catalog, and brokers.
// Purpose: Durable backend for the connector store traits.
// Dependencies: connector-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides [`SqliteConnectorStore`], the durable implementation of
//! the connector's `ConfigProvider`, `CatalogStore`, and `BrokerStore` traits,
//! plus the catalog import used to seed it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::CatalogImport;
pub use store::ImportSummary;
pub use store::SqliteConnectorStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
