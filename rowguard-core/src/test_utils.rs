//! Test helpers for code built on rowguard.
//!
//! Enabled with the `test-utils` feature.

use crate::grant::{
    GrantId, GrantQuery, GrantRecord, GrantStore, GrantStoreError, MemoryGrantStore,
    PermissionColumn,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A grant store wrapper that counts `load` and `columns` calls.
///
/// Used to assert that guards serve repeated checks from their cache.
pub struct CountingGrantStore {
    inner: Option<Box<dyn GrantStore>>,
    loads: AtomicUsize,
    describes: AtomicUsize,
}

impl CountingGrantStore {
    pub fn new(inner: impl GrantStore + 'static) -> Self {
        Self {
            inner: Some(Box::new(inner)),
            loads: AtomicUsize::new(0),
            describes: AtomicUsize::new(0),
        }
    }

    /// A store whose every operation fails with [`GrantStoreError::Read`].
    pub fn failing() -> Self {
        Self {
            inner: None,
            loads: AtomicUsize::new(0),
            describes: AtomicUsize::new(0),
        }
    }

    /// Number of `load` calls so far, including failed ones.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of `columns` calls so far.
    pub fn describes(&self) -> usize {
        self.describes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.loads.store(0, Ordering::SeqCst);
        self.describes.store(0, Ordering::SeqCst);
    }

    fn inner(&self) -> Result<&dyn GrantStore, GrantStoreError> {
        self.inner
            .as_deref()
            .ok_or_else(|| GrantStoreError::Read("store unavailable".to_string()))
    }
}

impl Default for CountingGrantStore {
    fn default() -> Self {
        Self::new(MemoryGrantStore::new())
    }
}

impl GrantStore for CountingGrantStore {
    fn columns(&self) -> Result<Vec<PermissionColumn>, GrantStoreError> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        self.inner()?.columns()
    }

    fn insert(&self, record: GrantRecord) -> Result<GrantId, GrantStoreError> {
        self.inner()?.insert(record)
    }

    fn update(&self, record: &GrantRecord) -> Result<bool, GrantStoreError> {
        self.inner()?.update(record)
    }

    fn load(&self, query: &GrantQuery) -> Result<Vec<GrantRecord>, GrantStoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner()?.load(query)
    }

    fn load_all(&self) -> Result<Vec<GrantRecord>, GrantStoreError> {
        self.inner()?.load_all()
    }

    fn delete(&self, id: GrantId) -> Result<bool, GrantStoreError> {
        self.inner()?.delete(id)
    }

    fn clear(&self) -> Result<(), GrantStoreError> {
        self.inner()?.clear()
    }
}
