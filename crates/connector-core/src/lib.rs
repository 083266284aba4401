// crates/connector-core/src/lib.rs
// ============================================================================
// Module: Dataspace Connector Core Library
// Description: Public API surface for the connector core.
// Purpose: Expose the data model, protocol codec, assembler, and router.
// Dependencies: crate::{model, protocol, envelope, interfaces, assembler, router}
// ============================================================================

//! ## Overview
//! The connector core answers inbound protocol messages and builds the
//! connector's self-description. It is backend-agnostic: identity, catalog,
//! broker rows, tokens, artifacts, and registry delivery are reached through
//! the traits in [`interfaces`]. Broker synchronization lives in
//! `connector-broker`; the HTTP surface lives in `connector-server`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod assembler;
pub mod audit;
pub mod envelope;
pub mod interfaces;
pub mod memory;
pub mod model;
pub mod protocol;
pub mod router;

#[cfg(test)]
mod test_support;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use assembler::AssemblyError;
pub use assembler::ConnectorDocument;
pub use assembler::HeaderOrigin;
pub use assembler::NotificationKind;
pub use assembler::SelfDescriptionAssembler;
pub use audit::ConnectorAuditSink;
pub use envelope::DecodeError;
pub use envelope::EncodeError;
pub use envelope::EncodedEnvelope;
pub use envelope::Envelope;
pub use envelope::Payload;
pub use interfaces::ArtifactError;
pub use interfaces::ArtifactPayload;
pub use interfaces::ArtifactSource;
pub use interfaces::AuthenticationError;
pub use interfaces::BrokerStore;
pub use interfaces::CatalogStore;
pub use interfaces::ConfigProvider;
pub use interfaces::RegistryTransport;
pub use interfaces::StoreError;
pub use interfaces::TokenAuthenticator;
pub use interfaces::TokenError;
pub use interfaces::TokenIssuer;
pub use interfaces::TransportError;
pub use memory::InMemoryConnectorStore;
pub use memory::StoreFault;
pub use model::BrokerId;
pub use model::BrokerRegistration;
pub use model::BrokerStatus;
pub use model::CatalogCounts;
pub use model::CatalogEntry;
pub use model::CatalogSnapshot;
pub use model::ConnectorIdentity;
pub use model::Distribution;
pub use model::DistributionId;
pub use model::EntryId;
pub use model::EntryStatus;
pub use protocol::MessageHeader;
pub use protocol::MessageKind;
pub use protocol::ProtocolMessage;
pub use protocol::RejectionReason;
pub use router::InboundMessage;
pub use router::MessageRouter;
pub use router::RouterDependencies;
pub use router::RouterPolicy;
