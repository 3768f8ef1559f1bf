//! Entry point for host authorization layers.
//!
//! [`PermissionBackend`] answers the questions an authorization framework
//! asks ("may this subject do X to this object?", "what may it do?") by
//! applying the subject short-circuits and forwarding to the object's guard.
//! Enumeration results are memoized in an [`EvaluationScope`] owned by the
//! caller, typically one per request.

use crate::error::{Error, Result};
use crate::grant::ObjectId;
use crate::guard::{GrantSources, Guard, GuardProvider};
use crate::name::PermissionName;
use crate::subject::{Subject, SubjectId};
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

type PermissionSet = Arc<BTreeSet<PermissionName>>;

/// Caller-owned memo for permission enumeration.
///
/// Results are keyed by (subject, object). Dropping or clearing the scope is
/// the only invalidation; it never observes grant store writes.
#[derive(Debug, Default)]
pub struct EvaluationScope {
    all: HashMap<(SubjectId, ObjectId), PermissionSet>,
    group: HashMap<(SubjectId, ObjectId), PermissionSet>,
}

impl EvaluationScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoized results across both enumerations.
    pub fn len(&self) -> usize {
        self.all.len() + self.group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.group.is_empty()
    }

    pub fn clear(&mut self) {
        self.all.clear();
        self.group.clear();
    }
}

#[derive(Clone, Copy)]
enum Enumeration {
    All,
    Group,
}

/// Object-level permission backend.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rowguard_core::{
///     BasicGuard, Guard, GuardCell, GuardConfig, GuardProvider, ObjectId, PermissionBackend,
///     User,
/// };
///
/// struct Article {
///     id: i64,
///     guard: GuardCell,
/// }
///
/// impl GuardProvider for Article {
///     fn object_id(&self) -> ObjectId {
///         ObjectId(self.id)
///     }
///
///     fn provide_guard(&self) -> Option<Arc<dyn Guard>> {
///         self.guard.get_or_init(|| {
///             Arc::new(
///                 BasicGuard::new()
///                     .with_config(GuardConfig::new().with_permissions(["read"]).unwrap())
///                     .with_override("read", |_| Some(true)),
///             )
///         })
///     }
/// }
///
/// let backend = PermissionBackend::new();
/// let article = Article { id: 1, guard: GuardCell::new() };
/// let mike = User::new(1);
///
/// assert!(backend.has_perm(&mike, "read", Some(&article)).unwrap());
/// assert!(!backend.has_perm(&mike, "read", None).unwrap());
/// assert!(backend.has_module_perms(&mike, "blog").is_err());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionBackend;

impl PermissionBackend {
    pub fn new() -> Self {
        Self
    }

    /// The guard attached to `obj`.
    ///
    /// # Errors
    ///
    /// [`Error::ObjectPermission`] when the object provides no guard.
    pub fn guard_for(&self, obj: &dyn GuardProvider) -> Result<Arc<dyn Guard>> {
        obj.provide_guard().ok_or_else(|| {
            Error::ObjectPermission(format!("object {} does not provide a guard", obj.object_id()))
        })
    }

    /// Whether `subject` holds `permission` on `obj`.
    ///
    /// Without an object the answer is `false`; module-level permissions are
    /// not handled here. Inactive and anonymous subjects hold nothing. The
    /// permission name is validated before those short-circuits.
    pub fn has_perm(
        &self,
        subject: &dyn Subject,
        permission: &str,
        obj: Option<&dyn GuardProvider>,
    ) -> Result<bool> {
        let Some(obj) = obj else {
            debug!("no object supplied for '{}', denying", permission);
            return Ok(false);
        };

        let permission = PermissionName::parse(permission)?;
        if !subject.is_active() {
            debug!("inactive subject denied '{}'", permission);
            return Ok(false);
        }
        if subject.is_anonymous() {
            debug!("anonymous subject denied '{}'", permission);
            return Ok(false);
        }

        let guard = self.guard_for(obj)?;
        Ok(guard.resolve(subject, &permission, obj.object_id(), GrantSources::ALL)?)
    }

    /// Every permission `subject` holds on `obj`.
    ///
    /// Repeated calls within one `scope` return the same set instance.
    pub fn get_all_permissions(
        &self,
        scope: &mut EvaluationScope,
        subject: &dyn Subject,
        obj: &dyn GuardProvider,
    ) -> Result<Arc<BTreeSet<PermissionName>>> {
        self.enumerate(scope, subject, obj, Enumeration::All)
    }

    /// Permissions `subject` holds on `obj` through its groups alone.
    pub fn get_group_permissions(
        &self,
        scope: &mut EvaluationScope,
        subject: &dyn Subject,
        obj: &dyn GuardProvider,
    ) -> Result<Arc<BTreeSet<PermissionName>>> {
        self.enumerate(scope, subject, obj, Enumeration::Group)
    }

    /// Module-level checks are not supported and always fail.
    pub fn has_module_perms(&self, _subject: &dyn Subject, category: &str) -> Result<bool> {
        Err(Error::Unsupported(format!(
            "module-level permission checks ('{}') are not supported",
            category
        )))
    }

    fn enumerate(
        &self,
        scope: &mut EvaluationScope,
        subject: &dyn Subject,
        obj: &dyn GuardProvider,
        kind: Enumeration,
    ) -> Result<PermissionSet> {
        let subject_id = match subject.id() {
            Some(id) if subject.is_active() => id,
            _ => {
                debug!("inactive or anonymous subject holds no permissions");
                return Ok(Arc::new(BTreeSet::new()));
            }
        };

        let object = obj.object_id();
        let memo = match kind {
            Enumeration::All => &mut scope.all,
            Enumeration::Group => &mut scope.group,
        };
        if let Some(cached) = memo.get(&(subject_id, object)) {
            return Ok(cached.clone());
        }

        let guard = self.guard_for(obj)?;
        let permissions = match kind {
            Enumeration::All => guard.get_all_permissions(subject, object, GrantSources::ALL)?,
            Enumeration::Group => guard.get_group_permissions(subject, object)?,
        };
        let permissions = Arc::new(permissions);
        memo.insert((subject_id, object), permissions.clone());
        Ok(permissions)
    }
}
