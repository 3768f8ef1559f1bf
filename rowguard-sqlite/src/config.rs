//! Grant table layout.
//!
//! Names the table and the reference columns the store queries. Permission
//! columns are not listed here; they are read from the table schema.

use lazy_static::lazy_static;
use regex::Regex;
use rowguard_core::GrantStoreError;
use serde::Deserialize;
use thiserror::Error;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Name of the primary key column.
pub const ID_COLUMN: &str = "id";

/// Errors that can occur when validating a [`GrantTable`].
#[derive(Debug, Error)]
pub enum GrantTableError {
    /// A table or column name is not a plain SQL identifier.
    #[error("invalid {field} '{value}': expected letters, digits and '_'")]
    InvalidIdentifier {
        /// Which setting was rejected
        field: &'static str,
        value: String,
    },

    /// Two reference columns share a name.
    #[error("column '{0}' is used more than once")]
    DuplicateColumn(String),
}

impl From<GrantTableError> for GrantStoreError {
    fn from(err: GrantTableError) -> Self {
        GrantStoreError::Schema(err.to_string())
    }
}

/// Table and column names for a grant table.
///
/// # Example
///
/// ```rust
/// use rowguard_sqlite::GrantTable;
///
/// let table = GrantTable::new("article_grants").with_subject_column("member_id");
/// assert!(table.validate().is_ok());
///
/// let table: GrantTable = serde_json::from_str(r#"{"table": "doc_grants"}"#).unwrap();
/// assert_eq!(table.object_column(), "obj_id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GrantTable {
    table: String,
    object_column: String,
    subject_column: String,
    group_column: String,
}

impl Default for GrantTable {
    fn default() -> Self {
        Self {
            table: "grants".to_string(),
            object_column: "obj_id".to_string(),
            subject_column: "user_id".to_string(),
            group_column: "group_id".to_string(),
        }
    }
}

impl GrantTable {
    /// Default column names on a custom table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_object_column(mut self, column: impl Into<String>) -> Self {
        self.object_column = column.into();
        self
    }

    pub fn with_subject_column(mut self, column: impl Into<String>) -> Self {
        self.subject_column = column.into();
        self
    }

    pub fn with_group_column(mut self, column: impl Into<String>) -> Self {
        self.group_column = column.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn object_column(&self) -> &str {
        &self.object_column
    }

    pub fn subject_column(&self) -> &str {
        &self.subject_column
    }

    pub fn group_column(&self) -> &str {
        &self.group_column
    }

    /// Whether `column` is the key or one of the reference columns.
    pub fn is_reserved(&self, column: &str) -> bool {
        column == ID_COLUMN
            || column == self.object_column
            || column == self.subject_column
            || column == self.group_column
    }

    /// Check every name is a plain identifier and the columns are distinct.
    pub fn validate(&self) -> Result<(), GrantTableError> {
        let names = [
            ("table", &self.table),
            ("object column", &self.object_column),
            ("subject column", &self.subject_column),
            ("group column", &self.group_column),
        ];
        for (field, value) in names {
            check_identifier(field, value)?;
        }

        let columns = [
            ID_COLUMN,
            self.object_column.as_str(),
            self.subject_column.as_str(),
            self.group_column.as_str(),
        ];
        for (i, column) in columns.iter().enumerate() {
            if columns[i + 1..].contains(column) {
                return Err(GrantTableError::DuplicateColumn(column.to_string()));
            }
        }
        Ok(())
    }
}

/// Reject anything that would need escaping inside a quoted identifier.
pub(crate) fn check_identifier(field: &'static str, value: &str) -> Result<(), GrantTableError> {
    if IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(GrantTableError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}
