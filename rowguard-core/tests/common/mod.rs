//! Common test fixtures shared across test files.
//!
//! Items here may not be used by all test files, hence the module-level allow.
#![allow(dead_code)]

use rowguard_core::{
    DbGuard, GrantStore, GroupId, Guard, GuardCell, GuardConfig, GuardProvider, ObjectId, User,
};
use std::sync::Arc;

pub const MANAGERS: GroupId = GroupId(10);

/// Active, non-superuser member of the managers group.
pub fn mike() -> User {
    User::new(1).with_groups([MANAGERS])
}

pub fn crud_config() -> GuardConfig {
    GuardConfig::new()
        .with_permissions(["create", "read", "update", "delete"])
        .unwrap()
}

/// CRUD guard over `store` whose `read` override always grants.
pub fn article_guard(store: Arc<dyn GrantStore>) -> DbGuard {
    DbGuard::new(store)
        .with_config(crud_config())
        .with_override("read", |_| Some(true))
}

// ===== Article =====

/// A protected domain object that builds its guard on first use.
pub struct Article {
    pub id: i64,
    store: Arc<dyn GrantStore>,
    guard: GuardCell,
}

impl Article {
    pub fn new(id: i64, store: Arc<dyn GrantStore>) -> Self {
        Self {
            id,
            store,
            guard: GuardCell::new(),
        }
    }

    pub fn guard(&self) -> Arc<dyn Guard> {
        self.provide_guard().expect("article guard detached")
    }

    pub fn replace_guard(&self, guard: Arc<dyn Guard>) -> Option<Arc<dyn Guard>> {
        self.guard.set(guard)
    }

    pub fn detach_guard(&self) {
        self.guard.detach();
    }

    /// Drop cached grants so the next check sees the store's current state.
    pub fn refresh(&self) {
        self.guard().clear_cached_perms();
    }
}

impl GuardProvider for Article {
    fn object_id(&self) -> ObjectId {
        ObjectId(self.id)
    }

    fn provide_guard(&self) -> Option<Arc<dyn Guard>> {
        self.guard
            .get_or_init(|| Arc::new(article_guard(self.store.clone())))
    }
}
