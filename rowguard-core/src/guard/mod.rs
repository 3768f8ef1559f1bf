//! Per-object permission guards.
//!
//! A [`Guard`] decides whether a subject holds a permission on one object.
//! Dispatch walks two check steps in a guard-specific order and stops at the
//! first one with an opinion:
//!
//! | Step | Source |
//! |------|--------|
//! | [`CheckStep::Override`] | the guard's [`CheckOverrides`] entry for the permission name |
//! | [`CheckStep::Generic`] | the guard's catch-all [`Guard::check`] |
//!
//! [`BasicGuard`] tries the override first. [`DbGuard`] reverses the order so
//! that a persisted grant record, even one that denies, wins over a hard-coded
//! override. When neither step decides, the guard's configured default applies.

mod basic;
mod cache;
mod config;
mod db;
mod overrides;
mod provider;

pub use basic::BasicGuard;
pub use cache::GrantCache;
pub use config::{DeclaredPermissions, GuardConfig};
pub use db::{resolve_grants, DbGuard};
pub use overrides::{CheckFn, CheckOverrides};
pub use provider::{GuardCell, GuardProvider};

use crate::grant::{GrantStoreError, ObjectId};
use crate::name::{NamingError, PermissionName};
use crate::subject::Subject;
use log::trace;
use std::collections::BTreeSet;
use thiserror::Error;

/// A tri-state decision: `None` means "no opinion".
pub type Decision = Option<bool>;

/// Errors raised while evaluating a guard.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The permission string is malformed.
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// The guard cannot answer because it was set up incompletely.
    #[error("guard misconfigured: {0}")]
    Configuration(String),

    /// The grant store failed.
    #[error(transparent)]
    Store(#[from] GrantStoreError),
}

/// Which grant records a check may consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantSources {
    /// Records assigned to the subject itself.
    pub direct: bool,
    /// Records inherited through the subject's groups.
    pub groups: bool,
}

impl GrantSources {
    pub const ALL: Self = Self {
        direct: true,
        groups: true,
    };
    pub const DIRECT: Self = Self {
        direct: true,
        groups: false,
    };
    pub const GROUPS: Self = Self {
        direct: false,
        groups: true,
    };
    pub const NONE: Self = Self {
        direct: false,
        groups: false,
    };

    pub fn is_empty(&self) -> bool {
        !self.direct && !self.groups
    }
}

impl Default for GrantSources {
    fn default() -> Self {
        Self::ALL
    }
}

/// Everything a check step sees.
pub struct CheckRequest<'a> {
    pub subject: &'a dyn Subject,
    pub permission: &'a PermissionName,
    pub object: ObjectId,
    pub sources: GrantSources,
}

/// One step of guard dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStep {
    /// The override registered for this exact permission name.
    Override,
    /// The guard's catch-all check.
    Generic,
}

/// Per-object permission evaluator.
///
/// Implementors supply configuration and, optionally, a catch-all check and a
/// different step order; dispatch, default fallback and enumeration are
/// provided.
pub trait Guard: Send + Sync {
    /// Declared permissions and default decision.
    fn config(&self) -> &GuardConfig;

    /// Permission-specific overrides.
    fn overrides(&self) -> &CheckOverrides;

    /// Order in which check steps are consulted.
    fn check_order(&self) -> [CheckStep; 2] {
        [CheckStep::Override, CheckStep::Generic]
    }

    /// Catch-all check consulted for every permission.
    fn check(&self, _request: &CheckRequest<'_>) -> Result<Decision, GuardError> {
        Ok(None)
    }

    /// All permissions governed by this guard.
    ///
    /// # Errors
    ///
    /// [`GuardError::Configuration`] when no permission set was declared.
    fn get_all_perms(&self) -> Result<BTreeSet<PermissionName>, GuardError> {
        self.config().permissions()
    }

    /// Decision used when no check step has an opinion.
    fn default_for(&self, permission: &PermissionName) -> Result<bool, GuardError> {
        Ok(self.config().default_for(permission))
    }

    /// Drop memoized grant data. Guards without a cache ignore this.
    fn clear_cached_perms(&self) {}

    /// Validate `permission` and dispatch it.
    ///
    /// Returns `None` without validating when `sources` is empty; otherwise
    /// always a decision, falling back to [`Guard::default_for`].
    fn full_check(
        &self,
        subject: &dyn Subject,
        permission: &str,
        object: ObjectId,
        sources: GrantSources,
    ) -> Result<Decision, GuardError> {
        if sources.is_empty() {
            return Ok(None);
        }
        let permission = PermissionName::parse(permission)?;
        self.resolve(subject, &permission, object, sources).map(Some)
    }

    /// Dispatch an already validated permission through the check steps.
    fn resolve(
        &self,
        subject: &dyn Subject,
        permission: &PermissionName,
        object: ObjectId,
        sources: GrantSources,
    ) -> Result<bool, GuardError> {
        let request = CheckRequest {
            subject,
            permission,
            object,
            sources,
        };

        for step in self.check_order() {
            let decision = match step {
                CheckStep::Override => self.overrides().decide(&request),
                CheckStep::Generic => self.check(&request)?,
            };
            if let Some(allowed) = decision {
                trace!(
                    "{:?} step decided '{}' on object {}: {}",
                    step,
                    permission,
                    object,
                    allowed
                );
                return Ok(allowed);
            }
        }

        let allowed = self.default_for(permission)?;
        trace!(
            "no step decided '{}' on object {}, default {}",
            permission,
            object,
            allowed
        );
        Ok(allowed)
    }

    /// Every governed permission the subject holds on `object`.
    ///
    /// Superusers hold all of them without any check step running.
    fn get_all_permissions(
        &self,
        subject: &dyn Subject,
        object: ObjectId,
        sources: GrantSources,
    ) -> Result<BTreeSet<PermissionName>, GuardError> {
        let mut allowed = BTreeSet::new();
        for permission in self.get_all_perms()? {
            if subject.is_superuser()
                || (!sources.is_empty() && self.resolve(subject, &permission, object, sources)?)
            {
                allowed.insert(permission);
            }
        }
        Ok(allowed)
    }

    /// Governed permissions the subject holds through its groups alone.
    fn get_group_permissions(
        &self,
        subject: &dyn Subject,
        object: ObjectId,
    ) -> Result<BTreeSet<PermissionName>, GuardError> {
        self.get_all_permissions(subject, object, GrantSources::GROUPS)
    }
}
