//! Memoized grant records.

use crate::grant::{GrantRecord, ObjectId};
use crate::subject::SubjectId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Grant records loaded per (subject, object) pair.
///
/// Entries live until [`invalidate`](Self::invalidate) or
/// [`clear`](Self::clear) is called; writes to the grant store are not
/// observed. An empty load is not kept, so a pair with no records is
/// queried again on the next access and picks up the first record written
/// for it.
#[derive(Debug, Default)]
pub struct GrantCache {
    entries: Mutex<HashMap<(SubjectId, ObjectId), Arc<[GrantRecord]>>>,
}

impl GrantCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subject: SubjectId, object: ObjectId) -> Option<Arc<[GrantRecord]>> {
        self.entries.lock().get(&(subject, object)).cloned()
    }

    /// Return the cached records, running `load` on a miss.
    ///
    /// A failed or empty load caches nothing.
    pub fn get_or_load<E>(
        &self,
        subject: SubjectId,
        object: ObjectId,
        load: impl FnOnce() -> Result<Vec<GrantRecord>, E>,
    ) -> Result<Arc<[GrantRecord]>, E> {
        if let Some(records) = self.get(subject, object) {
            return Ok(records);
        }

        let loaded: Arc<[GrantRecord]> = load()?.into();
        if loaded.is_empty() {
            return Ok(loaded);
        }
        let mut entries = self.entries.lock();
        Ok(entries.entry((subject, object)).or_insert(loaded).clone())
    }

    /// Drop one entry. Returns `true` if it was cached.
    pub fn invalidate(&self, subject: SubjectId, object: ObjectId) -> bool {
        self.entries.lock().remove(&(subject, object)).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
