//! Permission-specific check overrides.

use super::{CheckRequest, Decision};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An override function: returns `None` to let dispatch fall through.
pub type CheckFn = dyn Fn(&CheckRequest<'_>) -> Decision + Send + Sync;

/// Table of override functions keyed by bare permission name.
///
/// A guard consults its table with the bare name of the permission being
/// checked, so `blog.read` and `read` share the `read` entry. A missing entry
/// is not an error; it just yields no decision.
///
/// # Example
///
/// ```rust
/// use rowguard_core::CheckOverrides;
///
/// let overrides = CheckOverrides::new()
///     .with("read", |_| Some(true))
///     .with("delete", |req| Some(req.subject.is_superuser()));
///
/// assert!(overrides.contains("read"));
/// assert!(!overrides.contains("update"));
/// ```
#[derive(Clone, Default)]
pub struct CheckOverrides {
    by_name: HashMap<String, Arc<CheckFn>>,
}

impl CheckOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an override, replacing any previous one for `name`.
    pub fn with<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&CheckRequest<'_>) -> Decision + Send + Sync + 'static,
    {
        self.insert(name, check);
        self
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&CheckRequest<'_>) -> Decision + Send + Sync + 'static,
    {
        self.by_name.insert(name.into(), Arc::new(check));
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.by_name.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Run the override for the requested permission, if one is registered.
    pub fn decide(&self, request: &CheckRequest<'_>) -> Decision {
        self.by_name
            .get(request.permission.name())
            .and_then(|check| check(request))
    }
}

impl fmt::Debug for CheckOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.by_name.keys().collect();
        names.sort();
        f.debug_struct("CheckOverrides")
            .field("names", &names)
            .finish()
    }
}
