//! SQLite grant storage for rowguard.
//!
//! [`SqliteGrantStore`] keeps grant records in a relational table and
//! reports the table's BOOLEAN columns as permissions, so a
//! [`DbGuard`](rowguard_core::DbGuard) without a declared permission set
//! governs exactly the columns the table has.
//!
//! ```rust
//! use std::sync::Arc;
//! use rowguard_core::{DbGuard, GrantSources, Guard, ObjectId, PermissionColumn, User};
//! use rowguard_sqlite::{GrantTable, SqliteGrantStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteGrantStore::open_in_memory(GrantTable::default())?;
//! store.create_table(&[
//!     PermissionColumn::nullable("update"),
//!     PermissionColumn::new("read", Some(true)),
//! ])?;
//!
//! let guard = DbGuard::new(Arc::new(store));
//! let user = User::new(1);
//! assert_eq!(guard.full_check(&user, "read", ObjectId(1), GrantSources::ALL)?, Some(true));
//! assert_eq!(guard.full_check(&user, "update", ObjectId(1), GrantSources::ALL)?, Some(false));
//! # Ok(())
//! # }
//! ```

mod config;
mod store;

pub use config::{GrantTable, GrantTableError, ID_COLUMN};
pub use store::SqliteGrantStore;
