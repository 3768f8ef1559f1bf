//! Permission identifiers.
//!
//! A permission is written either as a bare name (`read`) or with a category
//! prefix (`blog.read`). Only the bare name is validated: it must consist of
//! lowercase ASCII letters, digits and underscores.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

lazy_static! {
    static ref NAME_PATTERN: Regex = Regex::new(r"^[a-z0-9_]+$").expect("valid regex");
}

/// Separator between the category prefix and the bare permission name.
pub const CATEGORY_SEPARATOR: char = '.';

/// A permission string failed the naming rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid permission name '{raw}': only lowercase letters, digits and '_' are allowed")]
pub struct NamingError {
    raw: String,
}

impl NamingError {
    /// The string that was rejected.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// A validated permission identifier.
///
/// # Example
///
/// ```rust
/// use rowguard_core::PermissionName;
///
/// let perm = PermissionName::parse("blog.update").unwrap();
/// assert_eq!(perm.category(), Some("blog"));
/// assert_eq!(perm.name(), "update");
/// assert_eq!(perm.to_string(), "blog.update");
///
/// assert!(PermissionName::parse("read-obj").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionName {
    category: Option<String>,
    name: String,
}

impl PermissionName {
    /// Parse and validate a permission string.
    ///
    /// The string is split on the first [`CATEGORY_SEPARATOR`]; everything
    /// after it must match `[a-z0-9_]+`. A separator with nothing before it
    /// is rejected.
    pub fn parse(raw: &str) -> Result<Self, NamingError> {
        let (category, name) = match raw.split_once(CATEGORY_SEPARATOR) {
            Some((category, name)) => (Some(category), name),
            None => (None, raw),
        };

        if category == Some("") || !NAME_PATTERN.is_match(name) {
            return Err(NamingError {
                raw: raw.to_string(),
            });
        }

        Ok(Self {
            category: category.map(str::to_string),
            name: name.to_string(),
        })
    }

    /// The bare permission name, used to look up overrides and grant columns.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The category prefix, if one was given.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.category {
            Some(category) => write!(f, "{}{}{}", category, CATEGORY_SEPARATOR, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for PermissionName {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PermissionName {
    type Error = NamingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for PermissionName {
    type Error = NamingError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PermissionName> for String {
    fn from(value: PermissionName) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name() {
        let perm = PermissionName::parse("read_obj").unwrap();
        assert_eq!(perm.name(), "read_obj");
        assert_eq!(perm.category(), None);
        assert_eq!(perm.to_string(), "read_obj");
    }

    #[test]
    fn test_parse_with_category() {
        let perm = PermissionName::parse("articles.delete_obj").unwrap();
        assert_eq!(perm.category(), Some("articles"));
        assert_eq!(perm.name(), "delete_obj");
        assert_eq!(perm.to_string(), "articles.delete_obj");
    }

    #[test]
    fn test_digits_and_underscores_allowed() {
        assert!(PermissionName::parse("level_2").is_ok());
        assert!(PermissionName::parse("_").is_ok());
        assert!(PermissionName::parse("42").is_ok());
    }

    #[test]
    fn test_rejects_invalid_characters() {
        for raw in [
            "read-obj", "Read", "READ", "read obj", "mod#le.n@ame", "réad", "", "blog.",
        ] {
            let err = PermissionName::parse(raw).unwrap_err();
            assert_eq!(err.raw(), raw);
        }
    }

    #[test]
    fn test_splits_only_on_first_separator() {
        // "b.c" is the bare name here, and '.' is not a valid name character
        assert!(PermissionName::parse("a.b.c").is_err());
    }

    #[test]
    fn test_category_is_not_validated() {
        let perm = PermissionName::parse("My-App.read").unwrap();
        assert_eq!(perm.category(), Some("My-App"));
    }

    #[test]
    fn test_empty_category_rejected() {
        let err = PermissionName::parse(".read").unwrap_err();
        assert_eq!(err.raw(), ".read");
        assert!(PermissionName::parse("..read").is_err());
    }

    #[test]
    fn test_category_distinguishes_names() {
        let bare = PermissionName::parse("read").unwrap();
        let scoped = PermissionName::parse("blog.read").unwrap();
        assert_ne!(bare, scoped);
        assert_eq!(bare.name(), scoped.name());
    }

    #[test]
    fn test_from_str() {
        let perm: PermissionName = "update".parse().unwrap();
        assert_eq!(perm.name(), "update");
    }

    #[test]
    fn test_error_message_mentions_input() {
        let err = PermissionName::parse("read-obj").unwrap_err();
        assert!(err.to_string().contains("read-obj"));
    }

    #[test]
    fn test_serde_as_string() {
        let perm = PermissionName::parse("blog.read").unwrap();
        let json = serde_json::to_string(&perm).unwrap();
        assert_eq!(json, "\"blog.read\"");

        let parsed: PermissionName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, perm);

        assert!(serde_json::from_str::<PermissionName>("\"Bad-Name\"").is_err());
    }
}
