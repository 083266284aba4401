// crates/connector-core/src/memory.rs
// ============================================================================
// Module: In-Memory Connector Store
// Description: Volatile identity, catalog, and broker store.
// Purpose: Backing store for tests and the `memory` store type.
// Dependencies: async-trait
// ============================================================================

//! ## Overview
//! [`InMemoryConnectorStore`] implements every persistence trait over a single
//! mutex-guarded state. Writes are serialized by the mutex. Individual
//! operations can be made to fail with [`StoreFault`] to exercise the
//! compensation paths of broker sync.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;

use crate::interfaces::BrokerStore;
use crate::interfaces::CatalogStore;
use crate::interfaces::ConfigProvider;
use crate::interfaces::StoreError;
use crate::model::BrokerId;
use crate::model::BrokerRegistration;
use crate::model::BrokerStatus;
use crate::model::CatalogCounts;
use crate::model::CatalogEntry;
use crate::model::CatalogSnapshot;
use crate::model::ConnectorIdentity;
use crate::model::Distribution;
use crate::model::DistributionId;
use crate::model::EntryId;
use crate::model::EntryStatus;
use crate::model::unix_millis;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreFault {
    /// [`ConfigProvider::identity`].
    IdentityRead,
    /// [`ConfigProvider::save_identity`].
    IdentitySave,
    /// Catalog reads.
    CatalogRead,
    /// Entry status writes.
    EntryStatus,
    /// [`BrokerStore::insert_broker`].
    BrokerInsert,
    /// Broker reads.
    BrokerRead,
    /// [`BrokerStore::set_broker_status`].
    BrokerStatus,
    /// [`BrokerStore::delete_broker`].
    BrokerDelete,
}

/// Mutable store contents.
#[derive(Debug, Default)]
struct MemoryState {
    /// Connector identity.
    identity: Option<ConnectorIdentity>,
    /// Catalog entries by id.
    entries: BTreeMap<EntryId, CatalogEntry>,
    /// Distributions by id.
    distributions: BTreeMap<DistributionId, Distribution>,
    /// Broker registrations by id.
    brokers: BTreeMap<BrokerId, BrokerRegistration>,
    /// Last assigned broker id.
    last_broker_id: i64,
    /// Active injected faults.
    faults: BTreeSet<StoreFault>,
}

/// In-memory store for identity, catalog, and brokers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnectorStore {
    /// Shared state.
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryConnectorStore {
    /// Creates an empty store without an identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `identity`.
    #[must_use]
    pub fn with_identity(identity: ConnectorIdentity) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.state.lock() {
            state.identity = Some(identity);
        }
        store
    }

    /// Inserts or replaces a catalog entry and its distributions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the state lock is poisoned.
    pub fn upsert_entry(
        &self,
        entry: CatalogEntry,
        distributions: Vec<Distribution>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.entries.insert(entry.id, entry);
        for distribution in distributions {
            state.distributions.insert(distribution.id, distribution);
        }
        Ok(())
    }

    /// Inserts a distribution without checking its parent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the state lock is poisoned.
    pub fn insert_distribution(&self, distribution: Distribution) -> Result<(), StoreError> {
        self.lock()?.distributions.insert(distribution.id, distribution);
        Ok(())
    }

    /// Returns one entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the state lock is poisoned.
    pub fn entry(&self, id: EntryId) -> Result<Option<CatalogEntry>, StoreError> {
        Ok(self.lock()?.entries.get(&id).cloned())
    }

    /// Makes `fault` fail until cleared.
    pub fn inject_fault(&self, fault: StoreFault) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.insert(fault);
        }
    }

    /// Clears an injected fault.
    pub fn clear_fault(&self, fault: StoreFault) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.remove(&fault);
        }
    }

    /// Locks the state.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Store("mutex poisoned".to_string()))
    }

    /// Locks the state, failing when `fault` is injected.
    fn lock_checked(&self, fault: StoreFault) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        let state = self.lock()?;
        if state.faults.contains(&fault) {
            return Err(StoreError::Io(format!("injected fault: {fault:?}")));
        }
        Ok(state)
    }
}

// ============================================================================
// SECTION: Trait Implementations
// ============================================================================

#[async_trait]
impl ConfigProvider for InMemoryConnectorStore {
    async fn identity(&self) -> Result<ConnectorIdentity, StoreError> {
        self.lock_checked(StoreFault::IdentityRead)?
            .identity
            .clone()
            .ok_or_else(|| StoreError::NotFound("connector identity".to_string()))
    }

    async fn save_identity(&self, identity: &ConnectorIdentity) -> Result<(), StoreError> {
        self.lock_checked(StoreFault::IdentitySave)?.identity = Some(identity.clone());
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryConnectorStore {
    async fn published_snapshot(&self) -> Result<CatalogSnapshot, StoreError> {
        let state = self.lock_checked(StoreFault::CatalogRead)?;
        let entries: Vec<CatalogEntry> = state
            .entries
            .values()
            .filter(|entry| entry.status == EntryStatus::Published)
            .cloned()
            .collect();
        let resources: BTreeSet<&str> =
            entries.iter().map(|entry| entry.resource_id.as_str()).collect();
        let distributions = state
            .distributions
            .values()
            .filter(|distribution| resources.contains(distribution.dataset_id.as_str()))
            .cloned()
            .collect();
        Ok(CatalogSnapshot {
            entries,
            distributions,
        })
    }

    async fn published_distribution(
        &self,
        id: DistributionId,
    ) -> Result<Option<Distribution>, StoreError> {
        let state = self.lock_checked(StoreFault::CatalogRead)?;
        let Some(distribution) = state.distributions.get(&id) else {
            return Ok(None);
        };
        let published = state.entries.values().any(|entry| {
            entry.status == EntryStatus::Published && entry.resource_id == distribution.dataset_id
        });
        Ok(published.then(|| distribution.clone()))
    }

    async fn set_entry_status(&self, id: EntryId, status: EntryStatus) -> Result<(), StoreError> {
        let mut state = self.lock_checked(StoreFault::EntryStatus)?;
        let entry =
            state.entries.get_mut(&id).ok_or_else(|| StoreError::NotFound(format!("entry {id}")))?;
        entry.status = status;
        Ok(())
    }

    async fn set_all_entry_status(&self, status: EntryStatus) -> Result<u64, StoreError> {
        let mut state = self.lock_checked(StoreFault::EntryStatus)?;
        let mut changed = 0_u64;
        for entry in state.entries.values_mut() {
            if entry.status != status {
                entry.status = status;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn counts(&self) -> Result<CatalogCounts, StoreError> {
        let state = self.lock_checked(StoreFault::CatalogRead)?;
        let total = state.entries.len() as u64;
        let published = state
            .entries
            .values()
            .filter(|entry| entry.status == EntryStatus::Published)
            .count() as u64;
        Ok(CatalogCounts {
            total,
            published,
        })
    }
}

#[async_trait]
impl BrokerStore for InMemoryConnectorStore {
    async fn insert_broker(&self, url: &str) -> Result<BrokerRegistration, StoreError> {
        let mut state = self.lock_checked(StoreFault::BrokerInsert)?;
        state.last_broker_id += 1;
        let now = unix_millis();
        let registration = BrokerRegistration {
            id: BrokerId::new(state.last_broker_id),
            url: url.to_string(),
            status: BrokerStatus::Registered,
            created_at_ms: now,
            updated_at_ms: now,
        };
        state.brokers.insert(registration.id, registration.clone());
        Ok(registration)
    }

    async fn broker(&self, id: BrokerId) -> Result<Option<BrokerRegistration>, StoreError> {
        Ok(self.lock_checked(StoreFault::BrokerRead)?.brokers.get(&id).cloned())
    }

    async fn brokers(&self) -> Result<Vec<BrokerRegistration>, StoreError> {
        Ok(self.lock_checked(StoreFault::BrokerRead)?.brokers.values().cloned().collect())
    }

    async fn registered_brokers(&self) -> Result<Vec<BrokerRegistration>, StoreError> {
        Ok(self
            .lock_checked(StoreFault::BrokerRead)?
            .brokers
            .values()
            .filter(|broker| broker.status == BrokerStatus::Registered)
            .cloned()
            .collect())
    }

    async fn set_broker_status(
        &self,
        id: BrokerId,
        status: BrokerStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.lock_checked(StoreFault::BrokerStatus)?;
        let broker =
            state.brokers.get_mut(&id).ok_or_else(|| StoreError::NotFound(format!("broker {id}")))?;
        broker.status = status;
        broker.updated_at_ms = unix_millis();
        Ok(())
    }

    async fn delete_broker(&self, id: BrokerId) -> Result<(), StoreError> {
        let mut state = self.lock_checked(StoreFault::BrokerDelete)?;
        state
            .brokers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("broker {id}")))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only assertions."
    )]

    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

    use super::InMemoryConnectorStore;
    use super::StoreFault;
    use crate::interfaces::BrokerStore;
    use crate::interfaces::CatalogStore;
    use crate::interfaces::StoreError;
    use crate::model::BrokerId;
    use crate::model::BrokerStatus;
    use crate::model::CatalogEntry;
    use crate::model::Distribution;
    use crate::model::DistributionId;
    use crate::model::EntryId;
    use crate::model::EntryStatus;

    fn entry(id: i64, status: EntryStatus) -> CatalogEntry {
        CatalogEntry {
            id: EntryId::new(id),
            resource_id: format!("res-{id}"),
            title: format!("Dataset {id}"),
            description: String::new(),
            publisher: String::new(),
            license: String::new(),
            version: String::new(),
            tags: BTreeSet::new(),
            status,
            additional_metadata: BTreeMap::new(),
        }
    }

    fn distribution(id: i64, dataset_id: &str) -> Distribution {
        Distribution {
            id: DistributionId::new(id),
            resource_id: format!("dist-{id}"),
            dataset_id: dataset_id.to_string(),
            title: None,
            description: None,
            filename: format!("file-{id}.csv"),
            filetype: "csv".to_string(),
            byte_size: 10,
            license: String::new(),
            created_at: String::new(),
            additional_metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn published_distribution_requires_published_parent() {
        let store = InMemoryConnectorStore::new();
        let approved = entry(1, EntryStatus::Approved);
        store.upsert_entry(approved, vec![distribution(10, "res-1")]).unwrap();
        assert!(store.published_distribution(DistributionId::new(10)).await.unwrap().is_none());
        store.set_entry_status(EntryId::new(1), EntryStatus::Published).await.unwrap();
        assert!(store.published_distribution(DistributionId::new(10)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn broker_rows_get_sequential_ids() {
        let store = InMemoryConnectorStore::new();
        let first = store.insert_broker("http://a").await.unwrap();
        let second = store.insert_broker("http://b").await.unwrap();
        assert_eq!(first.id, BrokerId::new(1));
        assert_eq!(second.id, BrokerId::new(2));
        store.set_broker_status(first.id, BrokerStatus::Unregistered).await.unwrap();
        let registered = store.registered_brokers().await.unwrap();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].url, "http://b");
    }

    #[tokio::test]
    async fn injected_fault_fails_only_that_operation() {
        let store = InMemoryConnectorStore::new();
        let broker = store.insert_broker("http://a").await.unwrap();
        store.inject_fault(StoreFault::BrokerStatus);
        let err = store.set_broker_status(broker.id, BrokerStatus::Unregistered).await;
        assert!(matches!(err, Err(StoreError::Io(_))));
        assert!(store.broker(broker.id).await.unwrap().is_some());
        store.clear_fault(StoreFault::BrokerStatus);
        store.set_broker_status(broker.id, BrokerStatus::Unregistered).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_rows_report_not_found() {
        let store = InMemoryConnectorStore::new();
        let err = store.delete_broker(BrokerId::new(9)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        let err =
            store.set_entry_status(EntryId::new(9), EntryStatus::Published).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
