//! Grant storage trait and implementations.

use super::record::{GrantId, GrantQuery, GrantRecord, PermissionColumn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Errors that can occur in grant store operations.
#[derive(Debug, thiserror::Error)]
pub enum GrantStoreError {
    /// Failed to read grants from storage.
    #[error("Failed to read grants: {0}")]
    Read(String),

    /// Failed to write grants to storage.
    #[error("Failed to write grants: {0}")]
    Write(String),

    /// The store schema is missing or malformed.
    #[error("Invalid grant schema: {0}")]
    Schema(String),

    /// A record names a permission the store has no column for.
    #[error("Unknown permission column '{0}'")]
    UnknownPermission(String),

    /// An update was requested for a record that was never stored.
    #[error("Grant record has no id")]
    MissingId,

    /// IO error during storage operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Trait for grant storage implementations.
///
/// Stores are the persisted table behind a [`DbGuard`](crate::DbGuard).
/// Calls block until the underlying storage answers.
pub trait GrantStore: Send + Sync {
    /// The permission columns this store governs, with their declared defaults.
    fn columns(&self) -> Result<Vec<PermissionColumn>, GrantStoreError>;

    /// Store a new record and return its assigned id.
    fn insert(&self, record: GrantRecord) -> Result<GrantId, GrantStoreError>;

    /// Overwrite a stored record, matched by id.
    ///
    /// Returns `true` if a record was updated, `false` if the id was not found.
    fn update(&self, record: &GrantRecord) -> Result<bool, GrantStoreError>;

    /// Load the records matching `query`, in [`GrantRecord::load_order`].
    fn load(&self, query: &GrantQuery) -> Result<Vec<GrantRecord>, GrantStoreError>;

    /// Load every stored record.
    fn load_all(&self) -> Result<Vec<GrantRecord>, GrantStoreError>;

    /// Remove a specific record.
    ///
    /// Returns `true` if a record was removed, `false` if not found.
    fn delete(&self, id: GrantId) -> Result<bool, GrantStoreError>;

    /// Remove all records.
    fn clear(&self) -> Result<(), GrantStoreError>;
}

/// Rejects records naming permissions outside a declared schema.
///
/// An empty schema accepts anything.
fn check_columns(columns: &[PermissionColumn], record: &GrantRecord) -> Result<(), GrantStoreError> {
    if columns.is_empty() {
        return Ok(());
    }
    for name in record.values.keys() {
        if !columns.iter().any(|c| &c.name == name) {
            return Err(GrantStoreError::UnknownPermission(name.clone()));
        }
    }
    Ok(())
}

/// Record table shared by the in-memory and file stores.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct GrantTable {
    next_id: i64,
    records: Vec<GrantRecord>,
}

impl GrantTable {
    fn insert(&mut self, mut record: GrantRecord) -> GrantId {
        self.next_id += 1;
        let id = GrantId(self.next_id);
        record.id = Some(id);
        self.records.push(record);
        id
    }

    fn update(&mut self, record: &GrantRecord) -> Result<bool, GrantStoreError> {
        let id = record.id.ok_or(GrantStoreError::MissingId)?;
        match self.records.iter_mut().find(|r| r.id == Some(id)) {
            Some(stored) => {
                *stored = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn load(&self, query: &GrantQuery) -> Vec<GrantRecord> {
        let mut found: Vec<GrantRecord> = self
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        found.sort_by_key(GrantRecord::load_order);
        found
    }

    fn delete(&mut self, id: GrantId) -> bool {
        let original_len = self.records.len();
        self.records.retain(|r| r.id != Some(id));
        self.records.len() < original_len
    }
}

/// In-memory grant store.
///
/// Records are lost when the process exits.
#[derive(Default)]
pub struct MemoryGrantStore {
    columns: Vec<PermissionColumn>,
    table: RwLock<GrantTable>,
}

impl MemoryGrantStore {
    /// Create a new empty store that accepts any permission name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store governing exactly `columns`.
    pub fn with_columns(columns: impl IntoIterator<Item = PermissionColumn>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            table: RwLock::new(GrantTable::default()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.table.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GrantStore for MemoryGrantStore {
    fn columns(&self) -> Result<Vec<PermissionColumn>, GrantStoreError> {
        Ok(self.columns.clone())
    }

    fn insert(&self, record: GrantRecord) -> Result<GrantId, GrantStoreError> {
        check_columns(&self.columns, &record)?;
        Ok(self.table.write().insert(record))
    }

    fn update(&self, record: &GrantRecord) -> Result<bool, GrantStoreError> {
        check_columns(&self.columns, record)?;
        self.table.write().update(record)
    }

    fn load(&self, query: &GrantQuery) -> Result<Vec<GrantRecord>, GrantStoreError> {
        Ok(self.table.read().load(query))
    }

    fn load_all(&self) -> Result<Vec<GrantRecord>, GrantStoreError> {
        Ok(self.table.read().records.clone())
    }

    fn delete(&self, id: GrantId) -> Result<bool, GrantStoreError> {
        Ok(self.table.write().delete(id))
    }

    fn clear(&self) -> Result<(), GrantStoreError> {
        self.table.write().records.clear();
        Ok(())
    }
}

/// File-based grant store.
///
/// Records are persisted to a JSON file. The file is created automatically
/// when the first record is stored.
pub struct FileGrantStore {
    path: PathBuf,
    columns: Vec<PermissionColumn>,
    cache: RwLock<Option<GrantTable>>,
}

impl FileGrantStore {
    /// Create a new file-based store at the given path.
    ///
    /// The file does not need to exist - it will be created when
    /// the first record is saved.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            columns: Vec::new(),
            cache: RwLock::new(None),
        }
    }

    /// Restrict the store to `columns`.
    pub fn with_columns(mut self, columns: impl IntoIterator<Item = PermissionColumn>) -> Self {
        self.columns = columns.into_iter().collect();
        self
    }

    /// Load the table from file into cache if not already loaded.
    fn ensure_loaded(&self) -> Result<(), GrantStoreError> {
        let mut cache = self.cache.write();
        if cache.is_some() {
            return Ok(());
        }

        let table = if self.path.exists() {
            let contents = std::fs::read_to_string(&self.path)?;
            if contents.trim().is_empty() {
                GrantTable::default()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            GrantTable::default()
        };

        *cache = Some(table);
        Ok(())
    }

    /// Write `table` to file.
    fn flush(&self, table: &GrantTable) -> Result<(), GrantStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(table)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&GrantTable) -> T) -> Result<T, GrantStoreError> {
        self.ensure_loaded()?;
        let cache = self.cache.read();
        cache
            .as_ref()
            .map(f)
            .ok_or_else(|| GrantStoreError::Read(format!("{} not loaded", self.path.display())))
    }

    /// Apply `f` to a copy of the table; the cache takes the copy only once
    /// it has been flushed.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut GrantTable) -> Result<T, GrantStoreError>,
    ) -> Result<T, GrantStoreError> {
        self.ensure_loaded()?;
        let mut cache = self.cache.write();
        let mut table = match cache.as_ref() {
            Some(table) => table.clone(),
            None => {
                return Err(GrantStoreError::Write(format!(
                    "{} not loaded",
                    self.path.display()
                )))
            }
        };
        let result = f(&mut table)?;
        self.flush(&table)?;
        *cache = Some(table);
        Ok(result)
    }
}

impl GrantStore for FileGrantStore {
    fn columns(&self) -> Result<Vec<PermissionColumn>, GrantStoreError> {
        Ok(self.columns.clone())
    }

    fn insert(&self, record: GrantRecord) -> Result<GrantId, GrantStoreError> {
        check_columns(&self.columns, &record)?;
        self.write(|table| Ok(table.insert(record)))
    }

    fn update(&self, record: &GrantRecord) -> Result<bool, GrantStoreError> {
        check_columns(&self.columns, record)?;
        self.write(|table| table.update(record))
    }

    fn load(&self, query: &GrantQuery) -> Result<Vec<GrantRecord>, GrantStoreError> {
        self.read(|table| table.load(query))
    }

    fn load_all(&self) -> Result<Vec<GrantRecord>, GrantStoreError> {
        self.read(|table| table.records.clone())
    }

    fn delete(&self, id: GrantId) -> Result<bool, GrantStoreError> {
        self.write(|table| Ok(table.delete(id)))
    }

    fn clear(&self) -> Result<(), GrantStoreError> {
        self.write(|table| {
            table.records.clear();
            Ok(())
        })
    }
}
