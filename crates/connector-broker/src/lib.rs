// crates/connector-broker/src/lib.rs
// ============================================================================
// Module: Dataspace Connector Broker Sync
// Description: Broker registration saga and registry transport.
// Purpose: Keep remote broker registrations aligned with local state.
// Dependencies: connector-core, futures-util, reqwest
// ============================================================================

//! ## Overview
//! This crate runs the administrative broker operations (register,
//! unregister, add, delete, publish, update, identity edits) as sagas with
//! compensating notifications, and provides the HTTP transport that delivers
//! notifications to broker infrastructure endpoints.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod coordinator;
pub mod saga;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use coordinator::BrokerSyncCoordinator;
pub use coordinator::EditOutcome;
pub use coordinator::FanOutSummary;
pub use coordinator::SyncDependencies;
pub use saga::DeliveryFailure;
pub use saga::SyncError;
pub use saga::SyncOperation;
pub use saga::SyncPhase;
pub use transport::HttpRegistryTransport;
pub use transport::HttpTransportConfig;
