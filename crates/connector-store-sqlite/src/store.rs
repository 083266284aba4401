// crates/connector-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Connector Store
// Description: Durable identity, catalog, and broker persistence in SQLite.
// Purpose: Reference ConfigProvider, CatalogStore, and BrokerStore backend.
// Dependencies: connector-core, rusqlite, serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`SqliteConnectorStore`] keeps the connector identity, the catalog, and the
//! broker registrations in one `SQLite` database. A single connection is
//! shared behind a mutex, so row mutations are serialized. Async trait calls
//! move the blocking work onto the runtime's blocking pool.
//!
//! Distributions are joined to entries by `dataset_id` at read time; there is
//! no foreign key, so dangling distributions are stored and then dropped by
//! the readers that only expose published parents.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use connector_core::BrokerId;
use connector_core::BrokerRegistration;
use connector_core::BrokerStatus;
use connector_core::BrokerStore;
use connector_core::CatalogCounts;
use connector_core::CatalogEntry;
use connector_core::CatalogSnapshot;
use connector_core::CatalogStore;
use connector_core::ConfigProvider;
use connector_core::ConnectorIdentity;
use connector_core::Distribution;
use connector_core::DistributionId;
use connector_core::EntryId;
use connector_core::EntryStatus;
use connector_core::StoreError;
use connector_core::model::unix_millis;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current schema version.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Catalog entry columns in [`EntryRow`] order.
const ENTRY_COLUMNS: &str = "e.id, e.resource_id, e.title, e.description, e.publisher, \
                             e.license, e.version, e.tags_json, e.status, e.metadata_json";
/// Distribution columns in [`DistributionRow`] order.
const DISTRIBUTION_COLUMNS: &str = "d.id, d.resource_id, d.dataset_id, d.title, d.description, \
                                    d.filename, d.filetype, d.byte_size, d.license, \
                                    d.created_at, d.metadata_json";
/// Broker columns in [`BrokerRow`] order.
const BROKER_COLUMNS: &str = "id, url, status, created_at, updated_at";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` connector store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with default settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row cannot be decoded.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid input or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Row does not exist.
    #[error("sqlite store row not found: {0}")]
    NotFound(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
        }
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Import Types
// ============================================================================

/// Catalog rows to import, as read from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogImport {
    /// Entries to insert or replace.
    #[serde(default)]
    pub entries: Vec<CatalogEntry>,
    /// Distributions to insert or replace.
    #[serde(default)]
    pub distributions: Vec<Distribution>,
}

/// Row counts written by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Entries written.
    pub entries: usize,
    /// Distributions written.
    pub distributions: usize,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed connector store.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - The identity table holds at most one row.
#[derive(Debug, Clone)]
pub struct SqliteConnectorStore {
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteConnectorStore {
    /// Opens (and if needed creates) the store at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened, or its schema version is unsupported.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Stores `identity` unless one is already present.
    ///
    /// Returns `true` when the identity was written.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the write fails.
    pub fn seed_identity_if_absent(
        &self,
        identity: &ConnectorIdentity,
    ) -> Result<bool, SqliteStoreError> {
        let json = encode_json(identity)?;
        self.with_connection(|connection| {
            let changed = connection.execute(
                "INSERT OR IGNORE INTO connector_identity (id, identity_json, updated_at) VALUES \
                 (1, ?1, ?2)",
                params![json, unix_millis()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Inserts or replaces every entry and distribution in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when a row cannot be encoded or written;
    /// nothing is written in that case.
    pub fn import_catalog(
        &self,
        import: &CatalogImport,
    ) -> Result<ImportSummary, SqliteStoreError> {
        let entries =
            import.entries.iter().map(EntryRow::from_entry).collect::<Result<Vec<_>, _>>()?;
        let distributions = import
            .distributions
            .iter()
            .map(DistributionRow::from_distribution)
            .collect::<Result<Vec<_>, _>>()?;
        self.with_connection(move |connection| {
            let tx = connection.transaction()?;
            for row in &entries {
                row.upsert(&tx)?;
            }
            for row in &distributions {
                row.upsert(&tx)?;
            }
            tx.commit()?;
            Ok(ImportSummary {
                entries: entries.len(),
                distributions: distributions.len(),
            })
        })
    }

    /// Runs `op` on the connection in the calling thread.
    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("connection mutex poisoned".to_string()))?;
        op(&mut guard)
    }

    /// Runs `op` on the blocking pool.
    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, SqliteStoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.with_connection(op))
            .await
            .map_err(|err| StoreError::Io(format!("blocking task failed: {err}")))?
            .map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Trait Implementations
// ============================================================================

#[async_trait]
impl ConfigProvider for SqliteConnectorStore {
    async fn identity(&self) -> Result<ConnectorIdentity, StoreError> {
        self.run(|connection| {
            let json: Option<String> = connection
                .query_row(
                    "SELECT identity_json FROM connector_identity WHERE id = 1",
                    params![],
                    |row| row.get(0),
                )
                .optional()?;
            let json =
                json.ok_or_else(|| SqliteStoreError::NotFound("connector identity".to_string()))?;
            decode_json(&json, "connector identity")
        })
        .await
    }

    async fn save_identity(&self, identity: &ConnectorIdentity) -> Result<(), StoreError> {
        let json = encode_json(identity)?;
        self.run(move |connection| {
            connection.execute(
                "INSERT OR REPLACE INTO connector_identity (id, identity_json, updated_at) VALUES \
                 (1, ?1, ?2)",
                params![json, unix_millis()],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl CatalogStore for SqliteConnectorStore {
    async fn published_snapshot(&self) -> Result<CatalogSnapshot, StoreError> {
        self.run(|connection| {
            let tx = connection.transaction()?;
            let entries = query_entries(
                &tx,
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM catalog_entries e WHERE e.status = 'PUBLISHED' \
                     ORDER BY e.id"
                ),
            )?;
            let distributions = query_distributions(
                &tx,
                &format!(
                    "SELECT {DISTRIBUTION_COLUMNS} FROM distributions d JOIN catalog_entries e ON \
                     e.resource_id = d.dataset_id WHERE e.status = 'PUBLISHED' ORDER BY d.id"
                ),
                params![],
            )?;
            tx.commit()?;
            Ok(CatalogSnapshot {
                entries,
                distributions,
            })
        })
        .await
    }

    async fn published_distribution(
        &self,
        id: DistributionId,
    ) -> Result<Option<Distribution>, StoreError> {
        self.run(move |connection| {
            let mut rows = query_distributions(
                connection,
                &format!(
                    "SELECT {DISTRIBUTION_COLUMNS} FROM distributions d WHERE d.id = ?1 AND EXISTS \
                     (SELECT 1 FROM catalog_entries e WHERE e.resource_id = d.dataset_id AND \
                     e.status = 'PUBLISHED')"
                ),
                params![id.get()],
            )?;
            Ok(rows.pop())
        })
        .await
    }

    async fn set_entry_status(&self, id: EntryId, status: EntryStatus) -> Result<(), StoreError> {
        self.run(move |connection| {
            let changed = connection.execute(
                "UPDATE catalog_entries SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.get()],
            )?;
            if changed == 0 {
                return Err(SqliteStoreError::NotFound(format!("entry {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn set_all_entry_status(&self, status: EntryStatus) -> Result<u64, StoreError> {
        self.run(move |connection| {
            let changed = connection.execute(
                "UPDATE catalog_entries SET status = ?1 WHERE status != ?1",
                params![status.as_str()],
            )?;
            u64::try_from(changed).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
        })
        .await
    }

    async fn counts(&self) -> Result<CatalogCounts, StoreError> {
        self.run(|connection| {
            let (total, published): (i64, i64) = connection.query_row(
                "SELECT COUNT(1), COALESCE(SUM(CASE WHEN status = 'PUBLISHED' THEN 1 ELSE 0 END), \
                 0) FROM catalog_entries",
                params![],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(CatalogCounts {
                total: non_negative(total, "entry count")?,
                published: non_negative(published, "published count")?,
            })
        })
        .await
    }
}

#[async_trait]
impl BrokerStore for SqliteConnectorStore {
    async fn insert_broker(&self, url: &str) -> Result<BrokerRegistration, StoreError> {
        let url = url.to_string();
        self.run(move |connection| {
            let now = unix_millis();
            connection.execute(
                "INSERT INTO brokers (url, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![url, BrokerStatus::Registered.as_str(), now],
            )?;
            Ok(BrokerRegistration {
                id: BrokerId::new(connection.last_insert_rowid()),
                url,
                status: BrokerStatus::Registered,
                created_at_ms: now,
                updated_at_ms: now,
            })
        })
        .await
    }

    async fn broker(&self, id: BrokerId) -> Result<Option<BrokerRegistration>, StoreError> {
        self.run(move |connection| {
            let row = connection
                .query_row(
                    &format!("SELECT {BROKER_COLUMNS} FROM brokers WHERE id = ?1"),
                    params![id.get()],
                    BrokerRow::read,
                )
                .optional()?;
            row.map(BrokerRow::into_registration).transpose()
        })
        .await
    }

    async fn brokers(&self) -> Result<Vec<BrokerRegistration>, StoreError> {
        self.run(|connection| {
            query_brokers(connection, &format!("SELECT {BROKER_COLUMNS} FROM brokers ORDER BY id"))
        })
        .await
    }

    async fn registered_brokers(&self) -> Result<Vec<BrokerRegistration>, StoreError> {
        self.run(|connection| {
            query_brokers(
                connection,
                &format!(
                    "SELECT {BROKER_COLUMNS} FROM brokers WHERE status = 'REGISTERED' ORDER BY id"
                ),
            )
        })
        .await
    }

    async fn set_broker_status(
        &self,
        id: BrokerId,
        status: BrokerStatus,
    ) -> Result<(), StoreError> {
        self.run(move |connection| {
            let changed = connection.execute(
                "UPDATE brokers SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), unix_millis(), id.get()],
            )?;
            if changed == 0 {
                return Err(SqliteStoreError::NotFound(format!("broker {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn delete_broker(&self, id: BrokerId) -> Result<(), StoreError> {
        self.run(move |connection| {
            let changed =
                connection.execute("DELETE FROM brokers WHERE id = ?1", params![id.get()])?;
            if changed == 0 {
                return Err(SqliteStoreError::NotFound(format!("broker {id}")));
            }
            Ok(())
        })
        .await
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Raw catalog entry row.
struct EntryRow {
    /// Entry id.
    id: i64,
    /// Resource id.
    resource_id: String,
    /// Title.
    title: String,
    /// Description.
    description: String,
    /// Publisher.
    publisher: String,
    /// License.
    license: String,
    /// Version label.
    version: String,
    /// Tags as a JSON array.
    tags_json: String,
    /// Status label.
    status: String,
    /// Metadata as a JSON object.
    metadata_json: String,
}

impl EntryRow {
    /// Reads a row selected with [`ENTRY_COLUMNS`].
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            resource_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            publisher: row.get(4)?,
            license: row.get(5)?,
            version: row.get(6)?,
            tags_json: row.get(7)?,
            status: row.get(8)?,
            metadata_json: row.get(9)?,
        })
    }

    /// Encodes an entry for writing.
    fn from_entry(entry: &CatalogEntry) -> Result<Self, SqliteStoreError> {
        if entry.resource_id.trim().is_empty() {
            return Err(SqliteStoreError::Invalid(format!(
                "entry {} has an empty resource_id",
                entry.id
            )));
        }
        Ok(Self {
            id: entry.id.get(),
            resource_id: entry.resource_id.clone(),
            title: entry.title.clone(),
            description: entry.description.clone(),
            publisher: entry.publisher.clone(),
            license: entry.license.clone(),
            version: entry.version.clone(),
            tags_json: encode_json(&entry.tags)?,
            status: entry.status.as_str().to_string(),
            metadata_json: encode_json(&entry.additional_metadata)?,
        })
    }

    /// Inserts or replaces the row.
    fn upsert(&self, tx: &Transaction<'_>) -> Result<(), SqliteStoreError> {
        tx.execute(
            "INSERT OR REPLACE INTO catalog_entries (id, resource_id, title, description, \
             publisher, license, version, tags_json, status, metadata_json) VALUES (?1, ?2, ?3, \
             ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                self.id,
                self.resource_id,
                self.title,
                self.description,
                self.publisher,
                self.license,
                self.version,
                self.tags_json,
                self.status,
                self.metadata_json,
            ],
        )?;
        Ok(())
    }

    /// Decodes the row.
    fn into_entry(self) -> Result<CatalogEntry, SqliteStoreError> {
        let status = EntryStatus::parse(&self.status).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("entry {} has status {}", self.id, self.status))
        })?;
        let tags: BTreeSet<String> = decode_json(&self.tags_json, "entry tags")?;
        let additional_metadata: BTreeMap<String, BTreeSet<String>> =
            decode_json(&self.metadata_json, "entry metadata")?;
        Ok(CatalogEntry {
            id: EntryId::new(self.id),
            resource_id: self.resource_id,
            title: self.title,
            description: self.description,
            publisher: self.publisher,
            license: self.license,
            version: self.version,
            tags,
            status,
            additional_metadata,
        })
    }
}

/// Raw distribution row.
struct DistributionRow {
    /// Distribution id.
    id: i64,
    /// Resource id.
    resource_id: String,
    /// Parent entry resource id.
    dataset_id: String,
    /// Optional title.
    title: Option<String>,
    /// Optional description.
    description: Option<String>,
    /// File name.
    filename: String,
    /// File type label.
    filetype: String,
    /// Size in bytes.
    byte_size: i64,
    /// License.
    license: String,
    /// Creation date.
    created_at: String,
    /// Metadata as a JSON object.
    metadata_json: String,
}

impl DistributionRow {
    /// Reads a row selected with [`DISTRIBUTION_COLUMNS`].
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            resource_id: row.get(1)?,
            dataset_id: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            filename: row.get(5)?,
            filetype: row.get(6)?,
            byte_size: row.get(7)?,
            license: row.get(8)?,
            created_at: row.get(9)?,
            metadata_json: row.get(10)?,
        })
    }

    /// Encodes a distribution for writing.
    fn from_distribution(distribution: &Distribution) -> Result<Self, SqliteStoreError> {
        let byte_size = i64::try_from(distribution.byte_size).map_err(|_| {
            SqliteStoreError::Invalid(format!(
                "distribution {} byte_size too large",
                distribution.id
            ))
        })?;
        Ok(Self {
            id: distribution.id.get(),
            resource_id: distribution.resource_id.clone(),
            dataset_id: distribution.dataset_id.clone(),
            title: distribution.title.clone(),
            description: distribution.description.clone(),
            filename: distribution.filename.clone(),
            filetype: distribution.filetype.clone(),
            byte_size,
            license: distribution.license.clone(),
            created_at: distribution.created_at.clone(),
            metadata_json: encode_json(&distribution.additional_metadata)?,
        })
    }

    /// Inserts or replaces the row.
    fn upsert(&self, tx: &Transaction<'_>) -> Result<(), SqliteStoreError> {
        tx.execute(
            "INSERT OR REPLACE INTO distributions (id, resource_id, dataset_id, title, \
             description, filename, filetype, byte_size, license, created_at, metadata_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                self.id,
                self.resource_id,
                self.dataset_id,
                self.title,
                self.description,
                self.filename,
                self.filetype,
                self.byte_size,
                self.license,
                self.created_at,
                self.metadata_json,
            ],
        )?;
        Ok(())
    }

    /// Decodes the row.
    fn into_distribution(self) -> Result<Distribution, SqliteStoreError> {
        let byte_size = u64::try_from(self.byte_size).map_err(|_| {
            SqliteStoreError::Corrupt(format!("distribution {} has a negative size", self.id))
        })?;
        let additional_metadata = decode_json(&self.metadata_json, "distribution metadata")?;
        Ok(Distribution {
            id: DistributionId::new(self.id),
            resource_id: self.resource_id,
            dataset_id: self.dataset_id,
            title: self.title,
            description: self.description,
            filename: self.filename,
            filetype: self.filetype,
            byte_size,
            license: self.license,
            created_at: self.created_at,
            additional_metadata,
        })
    }
}

/// Raw broker row.
struct BrokerRow {
    /// Broker id.
    id: i64,
    /// Infrastructure URL.
    url: String,
    /// Status label.
    status: String,
    /// Creation time.
    created_at: i64,
    /// Update time.
    updated_at: i64,
}

impl BrokerRow {
    /// Reads a row selected with [`BROKER_COLUMNS`].
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            status: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    /// Decodes the row.
    fn into_registration(self) -> Result<BrokerRegistration, SqliteStoreError> {
        let status = BrokerStatus::parse(&self.status).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("broker {} has status {}", self.id, self.status))
        })?;
        Ok(BrokerRegistration {
            id: BrokerId::new(self.id),
            url: self.url,
            status,
            created_at_ms: self.created_at,
            updated_at_ms: self.updated_at,
        })
    }
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Runs an entry query.
fn query_entries(
    connection: &Connection,
    sql: &str,
) -> Result<Vec<CatalogEntry>, SqliteStoreError> {
    let mut statement = connection.prepare(sql)?;
    let rows = statement.query_map(params![], EntryRow::read)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.into_entry()?);
    }
    Ok(entries)
}

/// Runs a distribution query.
fn query_distributions(
    connection: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Distribution>, SqliteStoreError> {
    let mut statement = connection.prepare(sql)?;
    let rows = statement.query_map(args, DistributionRow::read)?;
    let mut distributions = Vec::new();
    for row in rows {
        distributions.push(row?.into_distribution()?);
    }
    Ok(distributions)
}

/// Runs a broker query.
fn query_brokers(
    connection: &Connection,
    sql: &str,
) -> Result<Vec<BrokerRegistration>, SqliteStoreError> {
    let mut statement = connection.prepare(sql)?;
    let rows = statement.query_map(params![], BrokerRow::read)?;
    let mut brokers = Vec::new();
    for row in rows {
        brokers.push(row?.into_registration()?);
    }
    Ok(brokers)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with pragmas applied.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(connection)
}

/// Creates the schema or checks the stored version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS connector_identity (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    identity_json TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS catalog_entries (
                    id INTEGER PRIMARY KEY,
                    resource_id TEXT NOT NULL UNIQUE,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    publisher TEXT NOT NULL,
                    license TEXT NOT NULL,
                    version TEXT NOT NULL,
                    tags_json TEXT NOT NULL,
                    status TEXT NOT NULL,
                    metadata_json TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_catalog_entries_status
                    ON catalog_entries (status);
                CREATE TABLE IF NOT EXISTS distributions (
                    id INTEGER PRIMARY KEY,
                    resource_id TEXT NOT NULL,
                    dataset_id TEXT NOT NULL,
                    title TEXT,
                    description TEXT,
                    filename TEXT NOT NULL,
                    filetype TEXT NOT NULL,
                    byte_size INTEGER NOT NULL,
                    license TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    metadata_json TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_distributions_dataset
                    ON distributions (dataset_id);
                CREATE TABLE IF NOT EXISTS brokers (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    url TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );",
            )?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}

/// Serializes a value to JSON text.
fn encode_json<T: Serialize>(value: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Deserializes stored JSON text.
fn decode_json<T: for<'de> Deserialize<'de>>(
    json: &str,
    what: &str,
) -> Result<T, SqliteStoreError> {
    serde_json::from_str(json).map_err(|err| SqliteStoreError::Corrupt(format!("{what}: {err}")))
}

/// Converts a count column.
fn non_negative(value: i64, what: &str) -> Result<u64, SqliteStoreError> {
    u64::try_from(value).map_err(|_| SqliteStoreError::Corrupt(format!("{what} is negative")))
}
