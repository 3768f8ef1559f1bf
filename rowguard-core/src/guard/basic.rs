//! Guard driven purely by custom logic.

use super::{CheckFn, CheckOverrides, CheckRequest, Decision, Guard, GuardConfig, GuardError};
use std::fmt;
use std::sync::Arc;

/// A guard whose decisions come from overrides, an optional catch-all check,
/// and the configured defaults. No grant records are consulted.
///
/// Dispatch tries the permission's override first, then the catch-all.
///
/// # Example
///
/// ```rust
/// use rowguard_core::{BasicGuard, GrantSources, Guard, GuardConfig, ObjectId, User};
///
/// let guard = BasicGuard::new()
///     .with_config(GuardConfig::new().with_permissions(["read", "update"]).unwrap())
///     .with_override("read", |_| Some(true));
///
/// let user = User::new(1);
/// assert_eq!(guard.full_check(&user, "read", ObjectId(1), GrantSources::ALL).unwrap(), Some(true));
/// assert_eq!(guard.full_check(&user, "update", ObjectId(1), GrantSources::ALL).unwrap(), Some(false));
/// ```
#[derive(Clone, Default)]
pub struct BasicGuard {
    config: GuardConfig,
    overrides: CheckOverrides,
    generic: Option<Arc<CheckFn>>,
}

impl BasicGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: GuardConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_overrides(mut self, overrides: CheckOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Register the override for one permission name.
    pub fn with_override<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&CheckRequest<'_>) -> Decision + Send + Sync + 'static,
    {
        self.overrides.insert(name, check);
        self
    }

    /// Set the catch-all check consulted after the override.
    pub fn with_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&CheckRequest<'_>) -> Decision + Send + Sync + 'static,
    {
        self.generic = Some(Arc::new(check));
        self
    }
}

impl Guard for BasicGuard {
    fn config(&self) -> &GuardConfig {
        &self.config
    }

    fn overrides(&self) -> &CheckOverrides {
        &self.overrides
    }

    fn check(&self, request: &CheckRequest<'_>) -> Result<Decision, GuardError> {
        Ok(self.generic.as_ref().and_then(|check| check(request)))
    }
}

impl fmt::Debug for BasicGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicGuard")
            .field("config", &self.config)
            .field("overrides", &self.overrides)
            .field("generic", &self.generic.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::ObjectId;
    use crate::guard::GrantSources;
    use crate::name::PermissionName;
    use crate::subject::User;
    use std::collections::BTreeSet;

    fn crud() -> GuardConfig {
        GuardConfig::new()
            .with_permissions(["create", "read", "update", "delete"])
            .unwrap()
    }

    fn names(raw: &[&str]) -> BTreeSet<PermissionName> {
        raw.iter().map(|r| PermissionName::parse(r).unwrap()).collect()
    }

    #[test]
    fn test_no_sources_means_no_decision() {
        let guard = BasicGuard::new().with_override("read", |_| Some(true));
        let user = User::new(1);
        assert_eq!(
            guard
                .full_check(&user, "read", ObjectId(1), GrantSources::NONE)
                .unwrap(),
            None
        );
        // Validation is skipped too
        assert_eq!(
            guard
                .full_check(&user, "Not Valid", ObjectId(1), GrantSources::NONE)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_invalid_name_is_error() {
        let guard = BasicGuard::new();
        let user = User::new(1);
        let err = guard
            .full_check(&user, "read-obj", ObjectId(1), GrantSources::ALL)
            .unwrap_err();
        assert!(matches!(err, GuardError::Naming(_)));
    }

    #[test]
    fn test_falls_back_to_default() {
        let guard = BasicGuard::new().with_config(crud().with_default_decision(true));
        let user = User::new(1);
        assert_eq!(
            guard
                .full_check(&user, "update", ObjectId(1), GrantSources::ALL)
                .unwrap(),
            Some(true)
        );
    }

    #[test]
    fn test_override_runs_before_generic() {
        let guard = BasicGuard::new()
            .with_override("read", |_| Some(false))
            .with_check(|_| Some(true));
        let user = User::new(1);

        assert_eq!(
            guard
                .full_check(&user, "read", ObjectId(1), GrantSources::ALL)
                .unwrap(),
            Some(false)
        );
        assert_eq!(
            guard
                .full_check(&user, "update", ObjectId(1), GrantSources::ALL)
                .unwrap(),
            Some(true)
        );
    }

    #[test]
    fn test_abstaining_override_falls_through_to_generic() {
        let guard = BasicGuard::new()
            .with_override("read", |_| None)
            .with_check(|req| Some(req.object == ObjectId(7)));
        let user = User::new(1);

        assert_eq!(
            guard
                .full_check(&user, "read", ObjectId(7), GrantSources::ALL)
                .unwrap(),
            Some(true)
        );
        assert_eq!(
            guard
                .full_check(&user, "read", ObjectId(8), GrantSources::ALL)
                .unwrap(),
            Some(false)
        );
    }

    #[test]
    fn test_get_all_permissions() {
        let guard = BasicGuard::new()
            .with_config(crud())
            .with_override("read", |_| Some(true))
            .with_override("delete", |_| Some(true));
        let user = User::new(1);

        let allowed = guard
            .get_all_permissions(&user, ObjectId(1), GrantSources::ALL)
            .unwrap();
        assert_eq!(allowed, names(&["delete", "read"]));
    }

    #[test]
    fn test_superuser_bypasses_checks() {
        let guard = BasicGuard::new()
            .with_config(crud())
            .with_check(|_| Some(false));
        let admin = User::new(1).superuser();

        let allowed = guard
            .get_all_permissions(&admin, ObjectId(1), GrantSources::NONE)
            .unwrap();
        assert_eq!(allowed, names(&["create", "read", "update", "delete"]));
    }

    #[test]
    fn test_get_all_permissions_requires_declaration() {
        let guard = BasicGuard::new();
        let user = User::new(1);
        assert!(matches!(
            guard.get_all_permissions(&user, ObjectId(1), GrantSources::ALL),
            Err(GuardError::Configuration(_))
        ));
    }

    #[test]
    fn test_per_permission_defaults() {
        let config = GuardConfig::new()
            .with_permission_defaults([("read", true), ("update", false)])
            .unwrap();
        let guard = BasicGuard::new().with_config(config);
        let user = User::new(1);

        let allowed = guard
            .get_all_permissions(&user, ObjectId(1), GrantSources::ALL)
            .unwrap();
        assert_eq!(allowed, names(&["read"]));
    }
}
