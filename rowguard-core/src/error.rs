//! Top-level error type for rowguard.
//!
//! Flattens the per-module errors into the categories a host authorization
//! layer needs to tell apart:
//!
//! - [`Error::Naming`] - the permission string is malformed
//! - [`Error::Configuration`] - a guard was set up incompletely
//! - [`Error::ObjectPermission`] - the object has no usable guard
//! - [`Error::Unsupported`] - module-level checks were requested
//! - [`Error::Store`] - the grant store failed

use thiserror::Error;

use crate::grant::GrantStoreError;
use crate::guard::GuardError;
use crate::name::NamingError;

#[derive(Debug, Error)]
pub enum Error {
    /// Permission name failed validation
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// Guard configuration is incomplete (e.g. no permission set declared)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The target object did not provide a guard
    #[error("object permission error: {0}")]
    ObjectPermission(String),

    /// The requested operation is deliberately not implemented
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Grant store failure
    #[error(transparent)]
    Store(#[from] GrantStoreError),
}

impl Error {
    /// Returns true if the permission name was malformed
    pub fn is_naming(&self) -> bool {
        matches!(self, Self::Naming(_))
    }

    /// Returns true if a guard was misconfigured
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if the object had no usable guard
    pub fn is_object_permission(&self) -> bool {
        matches!(self, Self::ObjectPermission(_))
    }

    /// Returns true if the operation is unsupported
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Returns true if the grant store failed
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl From<GuardError> for Error {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Naming(e) => Error::Naming(e),
            GuardError::Configuration(msg) => Error::Configuration(msg),
            GuardError::Store(e) => Error::Store(e),
        }
    }
}

/// Result type alias using rowguard's Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::PermissionName;

    #[test]
    fn test_error_display() {
        let err = Error::ObjectPermission("article 3 has no guard".to_string());
        assert_eq!(
            err.to_string(),
            "object permission error: article 3 has no guard"
        );

        let err = Error::Unsupported("module permissions".to_string());
        assert_eq!(err.to_string(), "unsupported operation: module permissions");
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::Configuration("x".into()).is_configuration());
        assert!(!Error::Configuration("x".into()).is_store());
        assert!(Error::ObjectPermission("x".into()).is_object_permission());
        assert!(Error::Unsupported("x".into()).is_unsupported());
        assert!(Error::Store(GrantStoreError::MissingId).is_store());
    }

    #[test]
    fn test_from_guard_error() {
        let naming = PermissionName::parse("Read").unwrap_err();
        assert!(Error::from(GuardError::Naming(naming)).is_naming());

        let err = Error::from(GuardError::Configuration("no permissions".into()));
        assert!(err.is_configuration());
        assert!(err.to_string().contains("no permissions"));

        let err = Error::from(GuardError::Store(GrantStoreError::Read("gone".into())));
        assert!(err.is_store());
    }
}
