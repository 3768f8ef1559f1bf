//! Guard backed by persisted grant records.

use super::{
    CheckOverrides, CheckRequest, CheckStep, Decision, GrantCache, GrantSources, Guard,
    GuardConfig, GuardError,
};
use crate::grant::{GrantHolder, GrantQuery, GrantRecord, GrantStore, ObjectId, PermissionColumn};
use crate::name::PermissionName;
use crate::subject::{Subject, SubjectId};
use log::debug;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Resolve one permission from a subject's grant records.
///
/// Group records contribute when `sources.groups` is set, the last one with
/// an opinion winning. A direct record for `subject` contributes when
/// `sources.direct` is set and always takes precedence over any group value,
/// wherever it appears in `records`.
pub fn resolve_grants(
    records: &[GrantRecord],
    subject: SubjectId,
    permission: &str,
    sources: GrantSources,
) -> Decision {
    let mut from_group = None;
    let mut direct = None;

    for record in records {
        let Some(value) = record.value(permission) else {
            continue;
        };
        match record.holder {
            GrantHolder::Group(_) if sources.groups => from_group = Some(value),
            GrantHolder::Subject(id) if sources.direct && id == subject => direct = Some(value),
            _ => {}
        }
    }

    direct.or(from_group)
}

/// A guard whose decisions come primarily from a [`GrantStore`].
///
/// Dispatch consults the grant records first and only then the permission's
/// override, so a stored "false" suppresses an override that would grant.
/// Records are memoized per (subject, object); after writing to the store,
/// call [`Guard::clear_cached_perms`]. Without a declared permission set the
/// store's columns are read once and kept until the same call.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rowguard_core::{
///     DbGuard, GrantRecord, GrantSources, GrantStore, Guard, GuardConfig, MemoryGrantStore,
///     ObjectId, User,
/// };
///
/// let store = Arc::new(MemoryGrantStore::new());
/// let guard = DbGuard::new(store.clone())
///     .with_config(GuardConfig::new().with_permissions(["read", "update"]).unwrap())
///     .with_override("read", |_| Some(true));
///
/// let mike = User::new(1);
/// let article = ObjectId(10);
/// assert_eq!(guard.full_check(&mike, "read", article, GrantSources::ALL).unwrap(), Some(true));
///
/// store
///     .insert(GrantRecord::for_subject(article, mike.subject_id()).deny("read"))
///     .unwrap();
/// guard.clear_cached_perms();
/// assert_eq!(guard.full_check(&mike, "read", article, GrantSources::ALL).unwrap(), Some(false));
/// ```
pub struct DbGuard {
    store: Arc<dyn GrantStore>,
    config: GuardConfig,
    overrides: CheckOverrides,
    cache: GrantCache,
    columns: RwLock<Option<Arc<[PermissionColumn]>>>,
}

impl DbGuard {
    /// A guard over `store` with no declared permissions; the permission set
    /// is then read from the store's columns.
    pub fn new(store: Arc<dyn GrantStore>) -> Self {
        Self {
            store,
            config: GuardConfig::default(),
            overrides: CheckOverrides::default(),
            cache: GrantCache::default(),
            columns: RwLock::new(None),
        }
    }

    pub fn with_config(mut self, config: GuardConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_overrides(mut self, overrides: CheckOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Register the fallback override for one permission name.
    pub fn with_override<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&CheckRequest<'_>) -> Decision + Send + Sync + 'static,
    {
        self.overrides.insert(name, check);
        self
    }

    pub fn store(&self) -> &Arc<dyn GrantStore> {
        &self.store
    }

    pub fn cache(&self) -> &GrantCache {
        &self.cache
    }

    /// Records referencing `object` held by `subject` or one of its groups.
    ///
    /// Loaded once per (subject, object) and then served from the cache.
    /// Anonymous subjects hold no records.
    pub fn load_cached_grants(
        &self,
        subject: &dyn Subject,
        object: ObjectId,
    ) -> Result<Arc<[GrantRecord]>, GuardError> {
        let Some(subject_id) = subject.id() else {
            return Ok(Arc::from(Vec::new()));
        };

        let records = self.cache.get_or_load(subject_id, object, || {
            debug!(
                "loading grants for subject {} on object {}",
                subject_id, object
            );
            self.store
                .load(&GrantQuery::new(object, subject_id, subject.groups()))
        })?;
        Ok(records)
    }

    /// The store's permission columns, introspected on first use.
    fn store_columns(&self) -> Result<Arc<[PermissionColumn]>, GuardError> {
        if let Some(columns) = self.columns.read().as_ref() {
            return Ok(columns.clone());
        }
        let columns: Arc<[PermissionColumn]> = self.store.columns()?.into();
        *self.columns.write() = Some(columns.clone());
        Ok(columns)
    }
}

impl Guard for DbGuard {
    fn config(&self) -> &GuardConfig {
        &self.config
    }

    fn overrides(&self) -> &CheckOverrides {
        &self.overrides
    }

    fn check_order(&self) -> [CheckStep; 2] {
        [CheckStep::Generic, CheckStep::Override]
    }

    fn check(&self, request: &CheckRequest<'_>) -> Result<Decision, GuardError> {
        let Some(subject_id) = request.subject.id() else {
            return Ok(None);
        };
        let records = self.load_cached_grants(request.subject, request.object)?;
        Ok(resolve_grants(
            &records,
            subject_id,
            request.permission.name(),
            request.sources,
        ))
    }

    /// The declared set, or else one permission per store column.
    fn get_all_perms(&self) -> Result<BTreeSet<PermissionName>, GuardError> {
        if self.config.is_declared() {
            return self.config.permissions();
        }
        self.store_columns()?
            .iter()
            .map(|column| PermissionName::parse(&column.name).map_err(GuardError::from))
            .collect()
    }

    /// The declared default, or else the store column's declared default.
    fn default_for(&self, permission: &PermissionName) -> Result<bool, GuardError> {
        if self.config.is_declared() {
            return Ok(self.config.default_for(permission));
        }
        let column_default = self
            .store_columns()?
            .iter()
            .find(|column| column.name == permission.name())
            .and_then(|column| column.default);
        Ok(column_default.unwrap_or(self.config.default_decision()))
    }

    fn clear_cached_perms(&self) {
        debug!("clearing {} cached grant entries", self.cache.len());
        self.cache.clear();
        *self.columns.write() = None;
    }
}

impl fmt::Debug for DbGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbGuard")
            .field("config", &self.config)
            .field("overrides", &self.overrides)
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::MemoryGrantStore;
    use crate::subject::{GroupId, User};
    use crate::test_utils::CountingGrantStore;

    const ARTICLE: ObjectId = ObjectId(100);
    const MANAGERS: GroupId = GroupId(5);

    fn direct(subject: i64) -> GrantRecord {
        GrantRecord::for_subject(ARTICLE, SubjectId(subject))
    }

    fn group(id: GroupId) -> GrantRecord {
        GrantRecord::for_group(ARTICLE, id)
    }

    fn crud_guard(store: Arc<dyn GrantStore>) -> DbGuard {
        DbGuard::new(store).with_config(
            GuardConfig::new()
                .with_permissions(["create", "read", "update", "delete"])
                .unwrap(),
        )
    }

    fn check(guard: &DbGuard, user: &User, perm: &str) -> bool {
        guard
            .full_check(user, perm, ARTICLE, GrantSources::ALL)
            .unwrap()
            .unwrap()
    }

    // ===== resolve_grants =====

    #[test]
    fn test_resolve_no_records() {
        assert_eq!(
            resolve_grants(&[], SubjectId(1), "read", GrantSources::ALL),
            None
        );
    }

    #[test]
    fn test_resolve_direct_wins_regardless_of_order() {
        let group_grant = group(MANAGERS).allow("update");
        let direct_deny = direct(1).deny("update");

        for records in [
            vec![group_grant.clone(), direct_deny.clone()],
            vec![direct_deny.clone(), group_grant.clone()],
        ] {
            assert_eq!(
                resolve_grants(&records, SubjectId(1), "update", GrantSources::ALL),
                Some(false)
            );
        }
    }

    #[test]
    fn test_resolve_unset_direct_does_not_mask_group() {
        let records = vec![direct(1).allow("create"), group(MANAGERS).allow("update")];
        assert_eq!(
            resolve_grants(&records, SubjectId(1), "update", GrantSources::ALL),
            Some(true)
        );
    }

    #[test]
    fn test_resolve_respects_sources() {
        let records = vec![group(MANAGERS).allow("update"), direct(1).deny("update")];

        assert_eq!(
            resolve_grants(&records, SubjectId(1), "update", GrantSources::GROUPS),
            Some(true)
        );
        assert_eq!(
            resolve_grants(&records, SubjectId(1), "update", GrantSources::DIRECT),
            Some(false)
        );
        assert_eq!(
            resolve_grants(&records, SubjectId(1), "update", GrantSources::NONE),
            None
        );
    }

    #[test]
    fn test_resolve_ignores_other_subjects() {
        let records = vec![direct(2).allow("read")];
        assert_eq!(
            resolve_grants(&records, SubjectId(1), "read", GrantSources::ALL),
            None
        );
    }

    #[test]
    fn test_resolve_last_group_opinion_wins() {
        let records = vec![
            group(GroupId(1)).deny("read"),
            group(GroupId(2)),
            group(GroupId(3)).allow("read"),
        ];
        assert_eq!(
            resolve_grants(&records, SubjectId(1), "read", GrantSources::ALL),
            Some(true)
        );
    }

    // ===== DbGuard dispatch =====

    #[test]
    fn test_override_applies_without_records() {
        let store = Arc::new(MemoryGrantStore::new());
        let guard = crud_guard(store).with_override("read", |_| Some(true));
        let mike = User::new(1);

        assert!(check(&guard, &mike, "read"));
        assert!(!check(&guard, &mike, "create"));
    }

    #[test]
    fn test_record_beats_override() {
        let store = Arc::new(MemoryGrantStore::new());
        store.insert(direct(1).allow("create").deny("read")).unwrap();
        let guard = crud_guard(store).with_override("read", |_| Some(true));
        let mike = User::new(1);

        assert!(check(&guard, &mike, "create"));
        assert!(!check(&guard, &mike, "read"));
    }

    #[test]
    fn test_group_record_applies_to_members_only() {
        let store = Arc::new(MemoryGrantStore::new());
        store.insert(group(MANAGERS).allow("update")).unwrap();
        let guard = crud_guard(store);

        let member = User::new(1).with_groups([MANAGERS]);
        let outsider = User::new(2);
        assert!(check(&guard, &member, "update"));
        assert!(!check(&guard, &outsider, "update"));
    }

    #[test]
    fn test_anonymous_has_no_records() {
        let store = Arc::new(MemoryGrantStore::new());
        let guard = crud_guard(store);
        let records = guard
            .load_cached_grants(&crate::subject::AnonymousUser, ARTICLE)
            .unwrap();
        assert!(records.is_empty());
        assert!(guard.cache().is_empty());
    }

    #[test]
    fn test_cache_serves_stale_records_until_cleared() {
        let store = Arc::new(MemoryGrantStore::new());
        let id = store.insert(direct(1).allow("update")).unwrap();
        let guard = crud_guard(store.clone());
        let mike = User::new(1);

        assert!(check(&guard, &mike, "update"));

        store.delete(id).unwrap();
        assert!(check(&guard, &mike, "update"));

        guard.clear_cached_perms();
        assert!(!check(&guard, &mike, "update"));
    }

    #[test]
    fn test_records_loaded_once_per_pair() {
        let store = Arc::new(CountingGrantStore::new(MemoryGrantStore::new()));
        store.insert(direct(1).allow("read")).unwrap();
        let guard = crud_guard(store.clone());
        let mike = User::new(1);

        guard
            .get_all_permissions(&mike, ARTICLE, GrantSources::ALL)
            .unwrap();
        check(&guard, &mike, "read");
        assert_eq!(store.loads(), 1);

        guard
            .full_check(&mike, "read", ObjectId(101), GrantSources::ALL)
            .unwrap();
        assert_eq!(store.loads(), 2);
    }

    #[test]
    fn test_first_record_visible_without_clearing() {
        let store = Arc::new(MemoryGrantStore::new());
        let guard = crud_guard(store.clone()).with_override("read", |_| Some(true));
        let mike = User::new(1);

        assert!(check(&guard, &mike, "read"));
        assert!(!check(&guard, &mike, "create"));
        assert!(guard.cache().is_empty());

        store
            .insert(direct(1).allow("create").deny("read").deny("update"))
            .unwrap();
        assert!(check(&guard, &mike, "create"));
        assert!(!check(&guard, &mike, "read"));
        assert_eq!(guard.cache().len(), 1);
    }

    #[test]
    fn test_store_error_propagates() {
        let store = Arc::new(CountingGrantStore::failing());
        let guard = crud_guard(store);
        let mike = User::new(1);

        let err = guard
            .full_check(&mike, "read", ARTICLE, GrantSources::ALL)
            .unwrap_err();
        assert!(matches!(err, GuardError::Store(_)));
    }

    // ===== Introspection =====

    #[test]
    fn test_permissions_from_store_columns() {
        let store = Arc::new(MemoryGrantStore::with_columns([
            PermissionColumn::nullable("create"),
            PermissionColumn::new("read", Some(true)),
        ]));
        let guard = DbGuard::new(store);
        let mike = User::new(1);

        let perms: Vec<String> = guard
            .get_all_perms()
            .unwrap()
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(perms, vec!["create", "read"]);

        // Column default applies when no record decides
        assert!(check(&guard, &mike, "read"));
        assert!(!check(&guard, &mike, "create"));
    }

    #[test]
    fn test_declared_permissions_override_introspection() {
        let store = Arc::new(MemoryGrantStore::with_columns([PermissionColumn::new(
            "read",
            Some(true),
        )]));
        let guard = DbGuard::new(store).with_config(
            GuardConfig::new()
                .with_permissions(["read"])
                .unwrap()
                .with_default_decision(false),
        );
        let mike = User::new(1);

        assert!(!check(&guard, &mike, "read"));
    }

    #[test]
    fn test_columns_introspected_once() {
        let store = Arc::new(CountingGrantStore::new(MemoryGrantStore::with_columns([
            PermissionColumn::nullable("create"),
            PermissionColumn::new("read", Some(true)),
        ])));
        let guard = DbGuard::new(store.clone());
        let mike = User::new(1);

        for object in [ObjectId(1), ObjectId(2)] {
            guard
                .get_all_permissions(&mike, object, GrantSources::ALL)
                .unwrap();
        }
        assert_eq!(store.describes(), 1);

        guard.clear_cached_perms();
        guard.get_all_perms().unwrap();
        assert_eq!(store.describes(), 2);
    }

    #[test]
    fn test_schemaless_store_has_no_permissions() {
        let guard = DbGuard::new(Arc::new(MemoryGrantStore::new()));
        assert!(guard.get_all_perms().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_column_name_is_naming_error() {
        let store = Arc::new(MemoryGrantStore::with_columns([PermissionColumn::nullable(
            "Bad Column",
        )]));
        let guard = DbGuard::new(store);
        assert!(matches!(guard.get_all_perms(), Err(GuardError::Naming(_))));
    }
}
