//! Persisted per-object grants.
//!
//! # Overview
//!
//! - **[`GrantRecord`]**: one stored decision set for an (object, holder) pair
//! - **[`GrantHolder`]**: a direct subject or a group, never both
//! - **[`GrantStore`]**: trait for the persisted grant table
//! - **[`MemoryGrantStore`]**: in-memory store (cleared on exit)
//! - **[`FileGrantStore`]**: JSON file store
//!
//! Stores are consulted by [`DbGuard`](crate::DbGuard), which memoizes what it
//! loads. Mutating a store does not invalidate those memos; the owner of the
//! guard must call [`Guard::clear_cached_perms`](crate::Guard::clear_cached_perms).

mod record;
mod store;

pub use record::{
    GrantHolder, GrantId, GrantQuery, GrantRecord, ObjectId, PermissionColumn,
};
pub use store::{FileGrantStore, GrantStore, GrantStoreError, MemoryGrantStore};
