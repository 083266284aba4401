// crates/connector-broker/src/saga.rs
// ============================================================================
// Module: Broker Sync Saga
// Description: Operations, phases, errors, and phase auditing for broker sync.
// Purpose: Shared vocabulary of the broker sync coordinator.
// Dependencies: connector-core, thiserror
// ============================================================================

//! ## Overview
//! Every coordinator operation walks the phase machine
//! `Idle → BuildingPayload → Delivering → Persisting → Done`, diverting to
//! `CompensationPending → CompensationAttempted → (Done | Inconsistent)` when
//! the local step fails after the remote step succeeded. [`SagaTrace`] tracks
//! the current phase and records one audit event per phase outcome.
//!
//! # Invariants
//! - [`SyncError::ConsistencyFault`] is returned only after a compensation
//!   failed, and is always audited with [`SyncSeverity::Inconsistent`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use connector_core::BrokerId;
use connector_core::BrokerRegistration;
use connector_core::EntryId;
use connector_core::TransportError;
use connector_core::audit::ConnectorAuditSink;
use connector_core::audit::SyncAuditEvent;
use connector_core::audit::SyncAuditEventParams;
use connector_core::audit::SyncSeverity;
use thiserror::Error;

// ============================================================================
// SECTION: Operations & Phases
// ============================================================================

/// Broker sync operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    /// Subscribe one broker and mark it registered.
    Register,
    /// Unsubscribe one broker and mark it unregistered.
    Unregister,
    /// Insert and subscribe a new broker.
    Add,
    /// Unsubscribe and delete one broker.
    Delete,
    /// Publish one entry, then update all brokers.
    Publish,
    /// Unpublish one entry, then update all brokers.
    Unpublish,
    /// Publish every entry, then update all brokers.
    PublishAll,
    /// Unpublish every entry, then update all brokers.
    UnpublishAll,
    /// Send the current self-description to all brokers.
    Update,
    /// Subscribe at all registered brokers.
    SubscribeAll,
    /// Unsubscribe at all registered brokers.
    UnsubscribeAll,
    /// Replace the identity, re-announcing it to all brokers.
    EditIdentity,
}

impl SyncOperation {
    /// Returns a stable label for audit output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Unregister => "unregister",
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Publish => "publish",
            Self::Unpublish => "unpublish",
            Self::PublishAll => "publish_all",
            Self::UnpublishAll => "unpublish_all",
            Self::Update => "update",
            Self::SubscribeAll => "subscribe_all",
            Self::UnsubscribeAll => "unsubscribe_all",
            Self::EditIdentity => "edit_identity",
        }
    }
}

/// Saga phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing has happened yet.
    Idle,
    /// Building the notification envelope.
    BuildingPayload,
    /// Delivering to brokers.
    Delivering,
    /// Writing local state.
    Persisting,
    /// Finished; local and remote state agree as far as known.
    Done,
    /// Local write failed after remote success; compensation is due.
    CompensationPending,
    /// Compensation was sent.
    CompensationAttempted,
    /// Compensation failed; local and remote state may disagree.
    Inconsistent,
}

impl SyncPhase {
    /// Returns a stable label for audit output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BuildingPayload => "building_payload",
            Self::Delivering => "delivering",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::CompensationPending => "compensation_pending",
            Self::CompensationAttempted => "compensation_attempted",
            Self::Inconsistent => "inconsistent",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// One failed delivery inside a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Broker row identifier.
    pub broker_id: BrokerId,
    /// Broker URL.
    pub url: String,
    /// Transport failure.
    pub error: TransportError,
}

/// Broker sync failures.
///
/// # Invariants
/// - Variants are stable for error classification on the admin surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Broker row does not exist.
    #[error("broker {0} not found")]
    BrokerNotFound(BrokerId),
    /// Catalog entry does not exist.
    #[error("catalog entry {0} not found")]
    EntryNotFound(EntryId),
    /// Input failed validation.
    #[error("invalid input: {0}")]
    Invalid(String),
    /// Store read or write failed; no remote state was left changed.
    #[error("store error: {0}")]
    Store(String),
    /// Notification payload could not be built.
    #[error("payload assembly failed: {0}")]
    Assembly(String),
    /// Single-broker delivery failed.
    #[error("delivery to {url} failed: {error}")]
    Delivery {
        /// Broker URL.
        url: String,
        /// Transport failure.
        error: TransportError,
    },
    /// One or more fan-out deliveries failed.
    #[error("{} of {attempted} broker deliveries failed", failures.len())]
    FanOut {
        /// Number of deliveries attempted.
        attempted: usize,
        /// Failed deliveries.
        failures: Vec<DeliveryFailure>,
    },
    /// Compensation failed; local and remote state may disagree.
    #[error("consistency fault during {operation}: {detail}")]
    ConsistencyFault {
        /// Operation label.
        operation: &'static str,
        /// Original failure and compensation failure.
        detail: String,
    },
}

impl SyncError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BrokerNotFound(_) | Self::EntryNotFound(_) => "not_found",
            Self::Invalid(_) => "invalid_input",
            Self::Store(_) => "store",
            Self::Assembly(_) => "assembly",
            Self::Delivery {
                ..
            } => "delivery",
            Self::FanOut {
                ..
            } => "fan_out",
            Self::ConsistencyFault {
                ..
            } => "consistency_fault",
        }
    }

    /// Returns true for consistency faults.
    #[must_use]
    pub const fn is_consistency_fault(&self) -> bool {
        matches!(self, Self::ConsistencyFault { .. })
    }
}

// ============================================================================
// SECTION: Trace
// ============================================================================

/// Phase tracker that audits each phase outcome of one operation.
pub(crate) struct SagaTrace<'a> {
    /// Audit sink.
    audit: &'a dyn ConnectorAuditSink,
    /// Operation being traced.
    operation: SyncOperation,
    /// Current phase.
    phase: SyncPhase,
    /// Target broker row, when the operation targets one broker.
    broker_id: Option<BrokerId>,
    /// Target broker URL.
    broker_url: Option<String>,
}

impl<'a> SagaTrace<'a> {
    /// Starts a trace in [`SyncPhase::Idle`].
    pub(crate) fn start(audit: &'a dyn ConnectorAuditSink, operation: SyncOperation) -> Self {
        Self {
            audit,
            operation,
            phase: SyncPhase::Idle,
            broker_id: None,
            broker_url: None,
        }
    }

    /// Attaches the target broker.
    pub(crate) fn target(&mut self, broker: &BrokerRegistration) {
        self.broker_id = Some(broker.id);
        self.broker_url = Some(broker.url.clone());
    }

    /// Attaches a target URL before a row exists.
    pub(crate) fn target_url(&mut self, url: &str) {
        self.broker_url = Some(url.to_string());
    }

    /// Returns the operation being traced.
    pub(crate) const fn operation(&self) -> SyncOperation {
        self.operation
    }

    /// Moves to `phase`.
    pub(crate) const fn enter(&mut self, phase: SyncPhase) {
        self.phase = phase;
    }

    /// Moves to a forward `phase` unless a compensation is in progress.
    pub(crate) fn step(&mut self, phase: SyncPhase) {
        if self.phase != SyncPhase::CompensationPending {
            self.phase = phase;
        }
    }

    /// Finishes the operation successfully.
    pub(crate) fn done(&mut self, detail: Option<String>) {
        self.phase = SyncPhase::Done;
        self.record(SyncSeverity::Info, detail);
    }

    /// Records a failure in the current phase and returns `error`.
    pub(crate) fn fail(&self, error: SyncError) -> SyncError {
        let severity = if error.is_consistency_fault() {
            SyncSeverity::Inconsistent
        } else {
            SyncSeverity::Error
        };
        self.record(severity, Some(error.to_string()));
        error
    }

    /// Records a note in the current phase without finishing.
    pub(crate) fn note(&self, severity: SyncSeverity, detail: String) {
        self.record(severity, Some(detail));
    }

    /// Emits one audit event for the current phase.
    fn record(&self, severity: SyncSeverity, detail: Option<String>) {
        self.audit.record_sync(&SyncAuditEvent::new(SyncAuditEventParams {
            operation: self.operation.label(),
            phase: self.phase.label(),
            severity,
            broker_id: self.broker_id.map(BrokerId::get),
            broker_url: self.broker_url.clone(),
            detail,
        }));
    }
}
