//! Guard configuration.

use super::GuardError;
use crate::name::{NamingError, PermissionName};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// The permission set a guard governs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawPermissions")]
pub enum DeclaredPermissions {
    /// Nothing declared; enumerating permissions is a configuration error
    /// unless the guard can derive the set some other way.
    #[default]
    Undeclared,
    /// Names sharing the guard-wide default.
    Set(BTreeSet<PermissionName>),
    /// Names with their own default decisions.
    Defaults(BTreeMap<PermissionName, bool>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPermissions {
    List(Vec<PermissionName>),
    Map(BTreeMap<PermissionName, bool>),
}

impl From<RawPermissions> for DeclaredPermissions {
    fn from(raw: RawPermissions) -> Self {
        match raw {
            RawPermissions::List(names) => DeclaredPermissions::Set(names.into_iter().collect()),
            RawPermissions::Map(defaults) => DeclaredPermissions::Defaults(defaults),
        }
    }
}

/// Immutable per-guard configuration: declared permissions plus the default
/// decision used when no check step has an opinion.
///
/// # Example
///
/// ```rust
/// use rowguard_core::{GuardConfig, PermissionName};
///
/// let config = GuardConfig::new()
///     .with_permissions(["create", "read", "update", "delete"])
///     .unwrap();
///
/// assert_eq!(config.permissions().unwrap().len(), 4);
/// assert!(!config.default_for(&PermissionName::parse("read").unwrap()));
///
/// // Loaded from JSON, with per-permission defaults
/// let config: GuardConfig =
///     serde_json::from_str(r#"{"permissions": {"read": true, "update": false}}"#).unwrap();
/// assert!(config.default_for(&PermissionName::parse("read").unwrap()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GuardConfig {
    #[serde(default, rename = "permissions")]
    declared: DeclaredPermissions,

    #[serde(default, rename = "default")]
    default_decision: bool,
}

impl GuardConfig {
    /// No declared permissions, default decision `false`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare permissions that share the guard-wide default.
    pub fn with_permissions<I, S>(mut self, names: I) -> Result<Self, NamingError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| PermissionName::parse(n.as_ref()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        self.declared = DeclaredPermissions::Set(names);
        Ok(self)
    }

    /// Declare permissions each with its own default decision.
    pub fn with_permission_defaults<I, S>(mut self, defaults: I) -> Result<Self, NamingError>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        let defaults = defaults
            .into_iter()
            .map(|(n, d)| PermissionName::parse(n.as_ref()).map(|n| (n, d)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        self.declared = DeclaredPermissions::Defaults(defaults);
        Ok(self)
    }

    /// Set the guard-wide default decision.
    pub fn with_default_decision(mut self, allowed: bool) -> Self {
        self.default_decision = allowed;
        self
    }

    pub fn declared(&self) -> &DeclaredPermissions {
        &self.declared
    }

    pub fn is_declared(&self) -> bool {
        !matches!(self.declared, DeclaredPermissions::Undeclared)
    }

    pub fn default_decision(&self) -> bool {
        self.default_decision
    }

    /// The declared permission set.
    ///
    /// # Errors
    ///
    /// [`GuardError::Configuration`] when nothing was declared.
    pub fn permissions(&self) -> Result<BTreeSet<PermissionName>, GuardError> {
        match &self.declared {
            DeclaredPermissions::Undeclared => Err(GuardError::Configuration(
                "no permission set declared for this guard".to_string(),
            )),
            DeclaredPermissions::Set(names) => Ok(names.clone()),
            DeclaredPermissions::Defaults(defaults) => Ok(defaults.keys().cloned().collect()),
        }
    }

    /// Default decision for one permission.
    pub fn default_for(&self, permission: &PermissionName) -> bool {
        match &self.declared {
            DeclaredPermissions::Defaults(defaults) => defaults
                .get(permission)
                .copied()
                .unwrap_or(self.default_decision),
            _ => self.default_decision,
        }
    }
}
