// crates/connector-broker/src/coordinator.rs
// ============================================================================
// Module: Broker Sync Coordinator
// Description: Keeps broker registrations aligned with remote registries.
// Purpose: Run each admin operation as a saga with compensating actions.
// Dependencies: connector-core, futures-util
// ============================================================================

//! ## Overview
//! [`BrokerSyncCoordinator`] pairs every remote notification with a local
//! store write. When the remote step succeeds and the local step fails, the
//! opposite notification is sent as compensation; if that also fails the
//! operation returns [`SyncError::ConsistencyFault`].
//!
//! Fan-out operations read the registered brokers once, build and encode one
//! envelope, and deliver it to every broker concurrently. A failed delivery
//! never cancels the others; the aggregate succeeds only when all succeed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use connector_core::BrokerId;
use connector_core::BrokerRegistration;
use connector_core::BrokerStatus;
use connector_core::BrokerStore;
use connector_core::CatalogStore;
use connector_core::ConfigProvider;
use connector_core::ConnectorIdentity;
use connector_core::EncodedEnvelope;
use connector_core::EntryId;
use connector_core::EntryStatus;
use connector_core::NotificationKind;
use connector_core::RegistryTransport;
use connector_core::SelfDescriptionAssembler;
use connector_core::StoreError;
use connector_core::audit::ConnectorAuditSink;
use connector_core::audit::SyncSeverity;
use futures_util::future::join_all;

use crate::saga::DeliveryFailure;
use crate::saga::SagaTrace;
use crate::saga::SyncError;
use crate::saga::SyncOperation;
use crate::saga::SyncPhase;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Collaborators of the coordinator.
pub struct SyncDependencies {
    /// Identity source.
    pub config: Arc<dyn ConfigProvider>,
    /// Catalog for publication status changes.
    pub catalog: Arc<dyn CatalogStore>,
    /// Broker registration rows.
    pub brokers: Arc<dyn BrokerStore>,
    /// Notification builder.
    pub assembler: SelfDescriptionAssembler,
    /// Broker delivery.
    pub transport: Arc<dyn RegistryTransport>,
    /// Audit sink.
    pub audit: Arc<dyn ConnectorAuditSink>,
}

/// Result of a successful fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutSummary {
    /// Number of brokers notified.
    pub delivered: usize,
}

/// Result of an identity edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Identity saved and announced to every broker.
    Applied,
    /// Identity saved, but re-subscribing failed at some brokers.
    Partial {
        /// Failure summary.
        detail: String,
    },
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Runs broker sync operations.
pub struct BrokerSyncCoordinator {
    /// Identity source.
    config: Arc<dyn ConfigProvider>,
    /// Catalog for publication status changes.
    catalog: Arc<dyn CatalogStore>,
    /// Broker registration rows.
    brokers: Arc<dyn BrokerStore>,
    /// Notification builder.
    assembler: SelfDescriptionAssembler,
    /// Broker delivery.
    transport: Arc<dyn RegistryTransport>,
    /// Audit sink.
    audit: Arc<dyn ConnectorAuditSink>,
}

impl BrokerSyncCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(deps: SyncDependencies) -> Self {
        Self {
            config: deps.config,
            catalog: deps.catalog,
            brokers: deps.brokers,
            assembler: deps.assembler,
            transport: deps.transport,
            audit: deps.audit,
        }
    }

    // ------------------------------------------------------------------------
    // Single-broker operations
    // ------------------------------------------------------------------------

    /// Subscribes broker `id` and marks it `REGISTERED`.
    ///
    /// Registering an already registered broker subscribes again.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the broker is unknown, delivery fails, or
    /// the local write fails; [`SyncError::ConsistencyFault`] when the
    /// compensating unsubscribe also fails.
    pub async fn register(&self, id: BrokerId) -> Result<(), SyncError> {
        self.switch(
            id,
            SyncOperation::Register,
            NotificationKind::Available,
            BrokerStatus::Registered,
        )
        .await
    }

    /// Unsubscribes broker `id` and marks it `UNREGISTERED`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the broker is unknown, delivery fails, or
    /// the local write fails; [`SyncError::ConsistencyFault`] when the
    /// compensating subscribe also fails.
    pub async fn unregister(&self, id: BrokerId) -> Result<(), SyncError> {
        self.switch(
            id,
            SyncOperation::Unregister,
            NotificationKind::Unavailable,
            BrokerStatus::Unregistered,
        )
        .await
    }

    /// Inserts a `REGISTERED` row for `url`, then subscribes there.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the insert or the subscribe fails (the row
    /// is deleted again); [`SyncError::ConsistencyFault`] when that delete
    /// fails.
    pub async fn add(&self, url: &str) -> Result<BrokerRegistration, SyncError> {
        let mut trace = SagaTrace::start(self.audit.as_ref(), SyncOperation::Add);
        trace.target_url(url);
        let url = url.trim();
        if url.is_empty() {
            return Err(trace.fail(SyncError::Invalid("broker url must be non-empty".to_string())));
        }

        trace.enter(SyncPhase::Persisting);
        let broker = self.brokers.insert_broker(url).await.map_err(|err| trace.fail(store(&err)))?;
        trace.target(&broker);

        let delivered = match self.identity().await {
            Ok(identity) => {
                self.notify(&mut trace, &broker.url, NotificationKind::Available, &identity).await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = delivered {
            trace.note(SyncSeverity::Error, err.to_string());
            trace.enter(SyncPhase::CompensationPending);
            let removed = self.brokers.delete_broker(broker.id).await;
            trace.enter(SyncPhase::CompensationAttempted);
            return Err(match removed {
                Ok(()) => trace.fail(err),
                Err(delete_err) => {
                    trace.enter(SyncPhase::Inconsistent);
                    trace.fail(SyncError::ConsistencyFault {
                        operation: SyncOperation::Add.label(),
                        detail: format!("{err}; removing the row failed: {delete_err}"),
                    })
                }
            });
        }
        trace.done(None);
        Ok(broker)
    }

    /// Unsubscribes broker `id` if it is registered, then deletes the row.
    ///
    /// A broker whose host is unreachable or whose URL is malformed is treated
    /// as already gone and deleted anyway.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the broker is unknown, delivery fails, or
    /// the delete fails; [`SyncError::ConsistencyFault`] when the delete fails
    /// after a delivered unsubscribe and re-subscribing also fails.
    pub async fn delete(&self, id: BrokerId) -> Result<(), SyncError> {
        let mut trace = SagaTrace::start(self.audit.as_ref(), SyncOperation::Delete);
        let broker = self.lookup(&mut trace, id).await?;
        let mut unsubscribed = None;
        if broker.status == BrokerStatus::Registered {
            let identity = self.identity().await.map_err(|err| trace.fail(err))?;
            let kind = NotificationKind::Unavailable;
            let notified = self.notify(&mut trace, &broker.url, kind, &identity).await;
            match notified {
                Ok(()) => unsubscribed = Some(identity),
                Err(SyncError::Delivery {
                    error,
                    ..
                }) if error.broker_is_gone() => {
                    trace.note(SyncSeverity::Info, format!("broker treated as gone: {error}"));
                }
                Err(err) => return Err(trace.fail(err)),
            }
        }

        trace.enter(SyncPhase::Persisting);
        let Err(err) = self.brokers.delete_broker(id).await else {
            trace.done(None);
            return Ok(());
        };
        match unsubscribed {
            Some(identity) => Err(self
                .compensate(&mut trace, &broker.url, NotificationKind::Available, &identity, &err)
                .await),
            None => Err(trace.fail(store(&err))),
        }
    }

    // ------------------------------------------------------------------------
    // Publication
    // ------------------------------------------------------------------------

    /// Marks entry `id` `PUBLISHED`, then updates every broker.
    ///
    /// The status change is kept when the update fails.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the entry is unknown, the write fails, or
    /// the update fan-out fails.
    pub async fn publish(&self, id: EntryId) -> Result<FanOutSummary, SyncError> {
        self.set_status(SyncOperation::Publish, Some(id), EntryStatus::Published).await
    }

    /// Marks entry `id` `APPROVED`, then updates every broker.
    ///
    /// # Errors
    ///
    /// See [`Self::publish`].
    pub async fn unpublish(&self, id: EntryId) -> Result<FanOutSummary, SyncError> {
        self.set_status(SyncOperation::Unpublish, Some(id), EntryStatus::Approved).await
    }

    /// Marks every entry `PUBLISHED`, then updates every broker.
    ///
    /// # Errors
    ///
    /// See [`Self::publish`].
    pub async fn publish_all(&self) -> Result<FanOutSummary, SyncError> {
        self.set_status(SyncOperation::PublishAll, None, EntryStatus::Published).await
    }

    /// Marks every entry `APPROVED`, then updates every broker.
    ///
    /// # Errors
    ///
    /// See [`Self::publish`].
    pub async fn unpublish_all(&self) -> Result<FanOutSummary, SyncError> {
        self.set_status(SyncOperation::UnpublishAll, None, EntryStatus::Approved).await
    }

    // ------------------------------------------------------------------------
    // Fan-out operations
    // ------------------------------------------------------------------------

    /// Sends the current self-description to every registered broker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::FanOut`] when any delivery fails.
    pub async fn update(&self) -> Result<FanOutSummary, SyncError> {
        self.broadcast(SyncOperation::Update, NotificationKind::Update).await
    }

    /// Subscribes at every registered broker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::FanOut`] when any delivery fails.
    pub async fn subscribe_all(&self) -> Result<FanOutSummary, SyncError> {
        self.broadcast(SyncOperation::SubscribeAll, NotificationKind::Available).await
    }

    /// Unsubscribes at every registered broker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::FanOut`] when any delivery fails.
    pub async fn unsubscribe_all(&self) -> Result<FanOutSummary, SyncError> {
        self.broadcast(SyncOperation::UnsubscribeAll, NotificationKind::Unavailable).await
    }

    /// Replaces the identity: unsubscribe everywhere with the old identity,
    /// save, then subscribe everywhere with the new one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when validation, the unsubscribe fan-out, or the
    /// save fails (the old identity is re-announced after a failed save);
    /// [`SyncError::ConsistencyFault`] when that re-announcement fails.
    pub async fn edit_identity(
        &self,
        identity: ConnectorIdentity,
    ) -> Result<EditOutcome, SyncError> {
        let mut trace = SagaTrace::start(self.audit.as_ref(), SyncOperation::EditIdentity);
        identity.validate().map_err(|err| trace.fail(SyncError::Invalid(err.to_string())))?;
        let previous = self.identity().await.map_err(|err| trace.fail(err))?;

        self.fan_out(&mut trace, NotificationKind::Unavailable, &previous)
            .await
            .map_err(|err| trace.fail(err))?;

        trace.enter(SyncPhase::Persisting);
        if let Err(err) = self.config.save_identity(&identity).await {
            trace.note(SyncSeverity::Error, store(&err).to_string());
            trace.enter(SyncPhase::CompensationPending);
            let restored = self.fan_out(&mut trace, NotificationKind::Available, &previous).await;
            trace.enter(SyncPhase::CompensationAttempted);
            return Err(match restored {
                Ok(_) => trace.fail(store(&err)),
                Err(restore_err) => {
                    trace.enter(SyncPhase::Inconsistent);
                    trace.fail(SyncError::ConsistencyFault {
                        operation: SyncOperation::EditIdentity.label(),
                        detail: format!("{}; re-subscribing failed: {restore_err}", store(&err)),
                    })
                }
            });
        }

        match self.fan_out(&mut trace, NotificationKind::Available, &identity).await {
            Ok(_) => {
                trace.done(None);
                Ok(EditOutcome::Applied)
            }
            Err(err) => {
                let detail = format!("identity saved; {err}");
                trace.done(Some(detail.clone()));
                Ok(EditOutcome::Partial {
                    detail,
                })
            }
        }
    }

    // ------------------------------------------------------------------------
    // Saga steps
    // ------------------------------------------------------------------------

    /// Delivers `kind` to broker `id`, then persists `status`.
    async fn switch(
        &self,
        id: BrokerId,
        operation: SyncOperation,
        kind: NotificationKind,
        status: BrokerStatus,
    ) -> Result<(), SyncError> {
        let mut trace = SagaTrace::start(self.audit.as_ref(), operation);
        let broker = self.lookup(&mut trace, id).await?;
        let identity = self.identity().await.map_err(|err| trace.fail(err))?;
        self.notify(&mut trace, &broker.url, kind, &identity).await.map_err(|err| trace.fail(err))?;

        trace.enter(SyncPhase::Persisting);
        if let Err(err) = self.brokers.set_broker_status(id, status).await {
            let undo = opposite(kind);
            return Err(self.compensate(&mut trace, &broker.url, undo, &identity, &err).await);
        }
        trace.done(None);
        Ok(())
    }

    /// Sends a compensating notification after a failed local write.
    async fn compensate(
        &self,
        trace: &mut SagaTrace<'_>,
        url: &str,
        kind: NotificationKind,
        identity: &ConnectorIdentity,
        cause: &StoreError,
    ) -> SyncError {
        trace.note(SyncSeverity::Error, cause.to_string());
        trace.enter(SyncPhase::CompensationPending);
        let result = self.notify(trace, url, kind, identity).await;
        trace.enter(SyncPhase::CompensationAttempted);
        match result {
            Ok(()) => trace.fail(store(cause)),
            Err(err) => {
                trace.enter(SyncPhase::Inconsistent);
                trace.fail(SyncError::ConsistencyFault {
                    operation: trace.operation().label(),
                    detail: format!("{cause}; compensation failed: {err}"),
                })
            }
        }
    }

    /// Changes entry status, then runs the update fan-out.
    async fn set_status(
        &self,
        operation: SyncOperation,
        id: Option<EntryId>,
        status: EntryStatus,
    ) -> Result<FanOutSummary, SyncError> {
        let mut trace = SagaTrace::start(self.audit.as_ref(), operation);
        trace.enter(SyncPhase::Persisting);
        let written = match id {
            Some(id) => self.catalog.set_entry_status(id, status).await.map_err(|err| match err {
                StoreError::NotFound(_) => SyncError::EntryNotFound(id),
                other => store(&other),
            }),
            None => self
                .catalog
                .set_all_entry_status(status)
                .await
                .map(|_| ())
                .map_err(|err| store(&err)),
        };
        written.map_err(|err| trace.fail(err))?;

        let identity = self.identity().await.map_err(|err| trace.fail(err))?;
        let summary = self
            .fan_out(&mut trace, NotificationKind::Update, &identity)
            .await
            .map_err(|err| trace.fail(err))?;
        trace.done(Some(format!("{} brokers updated", summary.delivered)));
        Ok(summary)
    }

    /// Runs a fan-out as a standalone operation.
    async fn broadcast(
        &self,
        operation: SyncOperation,
        kind: NotificationKind,
    ) -> Result<FanOutSummary, SyncError> {
        let mut trace = SagaTrace::start(self.audit.as_ref(), operation);
        let identity = self.identity().await.map_err(|err| trace.fail(err))?;
        let summary =
            self.fan_out(&mut trace, kind, &identity).await.map_err(|err| trace.fail(err))?;
        trace.done(Some(format!("{} brokers notified", summary.delivered)));
        Ok(summary)
    }

    /// Delivers one envelope to every registered broker concurrently.
    async fn fan_out(
        &self,
        trace: &mut SagaTrace<'_>,
        kind: NotificationKind,
        identity: &ConnectorIdentity,
    ) -> Result<FanOutSummary, SyncError> {
        let brokers = self.brokers.registered_brokers().await.map_err(|err| store(&err))?;
        if brokers.is_empty() {
            return Ok(FanOutSummary {
                delivered: 0,
            });
        }
        let payload = self.payload(trace, kind, identity).await?;
        trace.step(SyncPhase::Delivering);
        let outcomes = join_all(brokers.iter().map(|broker| {
            let payload = &payload;
            async move { (broker, self.transport.deliver(&broker.url, payload).await) }
        }))
        .await;
        let attempted = outcomes.len();
        let failures: Vec<DeliveryFailure> = outcomes
            .into_iter()
            .filter_map(|(broker, outcome)| {
                outcome.err().map(|error| DeliveryFailure {
                    broker_id: broker.id,
                    url: broker.url.clone(),
                    error,
                })
            })
            .collect();
        if failures.is_empty() {
            Ok(FanOutSummary {
                delivered: attempted,
            })
        } else {
            Err(SyncError::FanOut {
                attempted,
                failures,
            })
        }
    }

    /// Builds and delivers one notification to one broker.
    async fn notify(
        &self,
        trace: &mut SagaTrace<'_>,
        url: &str,
        kind: NotificationKind,
        identity: &ConnectorIdentity,
    ) -> Result<(), SyncError> {
        let payload = self.payload(trace, kind, identity).await?;
        trace.step(SyncPhase::Delivering);
        self.transport.deliver(url, &payload).await.map_err(|error| SyncError::Delivery {
            url: url.to_string(),
            error,
        })
    }

    /// Builds and encodes one notification envelope.
    async fn payload(
        &self,
        trace: &mut SagaTrace<'_>,
        kind: NotificationKind,
        identity: &ConnectorIdentity,
    ) -> Result<EncodedEnvelope, SyncError> {
        trace.step(SyncPhase::BuildingPayload);
        let envelope = self
            .assembler
            .build_notification(kind, identity)
            .await
            .map_err(|err| SyncError::Assembly(err.to_string()))?;
        envelope.encode().map_err(|err| SyncError::Assembly(err.to_string()))
    }

    /// Loads broker `id` and attaches it to the trace.
    async fn lookup(
        &self,
        trace: &mut SagaTrace<'_>,
        id: BrokerId,
    ) -> Result<BrokerRegistration, SyncError> {
        let broker = self
            .brokers
            .broker(id)
            .await
            .map_err(|err| trace.fail(store(&err)))?
            .ok_or_else(|| trace.fail(SyncError::BrokerNotFound(id)))?;
        trace.target(&broker);
        Ok(broker)
    }

    /// Reads the current identity.
    async fn identity(&self) -> Result<ConnectorIdentity, SyncError> {
        self.config.identity().await.map_err(|err| store(&err))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a store error into a sync error.
fn store(err: &StoreError) -> SyncError {
    SyncError::Store(err.to_string())
}

/// Returns the notification that undoes `kind`.
const fn opposite(kind: NotificationKind) -> NotificationKind {
    match kind {
        NotificationKind::Available => NotificationKind::Unavailable,
        NotificationKind::Unavailable | NotificationKind::Update => NotificationKind::Available,
    }
}
