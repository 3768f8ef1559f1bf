//! # Rowguard
//!
//! Per-object permission checks for host authorization layers.
//!
//! Every protected object exposes a [`Guard`] that decides whether a subject
//! holds a named permission on it. Decisions come from custom override
//! functions, persisted grant records, and configured defaults. The
//! [`PermissionBackend`] is the façade a host calls; it applies the subject
//! short-circuits (inactive and anonymous subjects hold nothing) and forwards
//! to the object's guard.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use rowguard_core::{
//!     DbGuard, GrantRecord, GrantStore, Guard, GuardCell, GuardConfig, GuardProvider,
//!     MemoryGrantStore, ObjectId, PermissionBackend, User,
//! };
//!
//! struct Article {
//!     id: i64,
//!     store: Arc<MemoryGrantStore>,
//!     guard: GuardCell,
//! }
//!
//! impl GuardProvider for Article {
//!     fn object_id(&self) -> ObjectId {
//!         ObjectId(self.id)
//!     }
//!
//!     fn provide_guard(&self) -> Option<Arc<dyn Guard>> {
//!         self.guard.get_or_init(|| {
//!             let config = GuardConfig::new()
//!                 .with_permissions(["create", "read", "update", "delete"])
//!                 .unwrap();
//!             Arc::new(
//!                 DbGuard::new(self.store.clone())
//!                     .with_config(config)
//!                     .with_override("read", |_| Some(true)),
//!             )
//!         })
//!     }
//! }
//!
//! # fn main() -> rowguard_core::Result<()> {
//! let store = Arc::new(MemoryGrantStore::new());
//! let article = Article { id: 1, store: store.clone(), guard: GuardCell::new() };
//! let mike = User::new(1);
//! let backend = PermissionBackend::new();
//!
//! assert!(backend.has_perm(&mike, "read", Some(&article))?);
//! assert!(!backend.has_perm(&mike, "update", Some(&article))?);
//!
//! let id = store
//!     .insert(GrantRecord::for_subject(article.object_id(), mike.subject_id()).allow("update"))?;
//! assert!(backend.has_perm(&mike, "update", Some(&article))?);
//!
//! // Loaded records stay cached until told otherwise
//! store.delete(id)?;
//! assert!(backend.has_perm(&mike, "update", Some(&article))?);
//! backend.guard_for(&article)?.clear_cached_perms();
//! assert!(!backend.has_perm(&mike, "update", Some(&article))?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Resolution order
//!
//! | Guard | First | Then | Finally |
//! |-------|-------|------|---------|
//! | [`BasicGuard`] | override for the permission | catch-all check | default |
//! | [`DbGuard`] | grant records | override for the permission | default |
//!
//! For grant records, a record held directly by the subject beats any record
//! inherited through one of its groups.
//!
//! ## Caching
//!
//! [`DbGuard`] memoizes non-empty grant loads per (subject, object) and never
//! notices later store writes to them; call [`Guard::clear_cached_perms`]
//! after writing. A pair with no records is looked up again on every check.
//! Permission enumeration through the backend is memoized in a caller-owned
//! [`EvaluationScope`].
//!
//! ## Logging
//!
//! Decisions are traced through the [`log`] facade: `debug` for short-circuits
//! and grant loads, `trace` for which step decided.

pub mod backend;
pub mod error;
pub mod grant;
pub mod guard;
pub mod name;
pub mod subject;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use backend::{EvaluationScope, PermissionBackend};
pub use error::{Error, Result};

// Grant records and storage
pub use grant::{
    FileGrantStore, GrantHolder, GrantId, GrantQuery, GrantRecord, GrantStore, GrantStoreError,
    MemoryGrantStore, ObjectId, PermissionColumn,
};

// Guards
pub use guard::{
    resolve_grants, BasicGuard, CheckFn, CheckOverrides, CheckRequest, CheckStep, DbGuard,
    Decision, DeclaredPermissions, GrantCache, GrantSources, Guard, GuardCell, GuardConfig,
    GuardError, GuardProvider,
};

pub use name::{NamingError, PermissionName};
pub use subject::{AnonymousUser, GroupId, Subject, SubjectId, User};
