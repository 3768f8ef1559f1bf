use crate::config::{check_identifier, GrantTable, ID_COLUMN};
use log::debug;
use parking_lot::{Mutex, RwLock};
use rowguard_core::{
    GrantHolder, GrantId, GrantQuery, GrantRecord, GrantStore, GrantStoreError, GroupId, ObjectId,
    PermissionColumn, SubjectId,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// SQLite-backed grant storage.
///
/// One row per grant record: the object reference, exactly one of the
/// subject or group reference, and one nullable BOOLEAN column per
/// permission. Permission columns are discovered from the table schema, so a
/// table created by another tool works as long as its permission columns are
/// declared BOOLEAN. The schema is read on first use and kept until
/// [`create_table`](Self::create_table) or
/// [`refresh_columns`](Self::refresh_columns).
///
/// # Example
/// ```
/// use rowguard_core::{GrantRecord, GrantStore, ObjectId, PermissionColumn, SubjectId};
/// use rowguard_sqlite::{GrantTable, SqliteGrantStore};
///
/// # fn main() -> Result<(), rowguard_core::GrantStoreError> {
/// let store = SqliteGrantStore::open_in_memory(GrantTable::default())?;
/// store.create_table(&[
///     PermissionColumn::nullable("read"),
///     PermissionColumn::new("update", Some(false)),
/// ])?;
///
/// store.insert(GrantRecord::for_subject(ObjectId(1), SubjectId(1)).allow("read"))?;
/// assert_eq!(store.load_all()?.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct SqliteGrantStore {
    conn: Arc<Mutex<Connection>>,
    table: GrantTable,
    columns: RwLock<Option<Vec<PermissionColumn>>>,
}

impl SqliteGrantStore {
    /// Open (or create) a database file.
    ///
    /// Parent directories are created as needed. The grant table itself is
    /// not created; call [`create_table`](Self::create_table) or point at an
    /// existing table.
    pub fn open(path: impl Into<PathBuf>, table: GrantTable) -> Result<Self, GrantStoreError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)
            .map_err(|e| GrantStoreError::Read(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn, table)
    }

    /// A private in-memory database.
    pub fn open_in_memory(table: GrantTable) -> Result<Self, GrantStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GrantStoreError::Read(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn, table)
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection, table: GrantTable) -> Result<Self, GrantStoreError> {
        table.validate()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table,
            columns: RwLock::new(None),
        })
    }

    pub fn table(&self) -> &GrantTable {
        &self.table
    }

    /// Forget the introspected permission columns.
    ///
    /// Call after altering the grant table outside this store.
    pub fn refresh_columns(&self) {
        *self.columns.write() = None;
    }

    /// The permission columns, read from the schema on first use.
    ///
    /// Lock order is connection, then columns.
    fn permission_columns(
        &self,
        conn: &Connection,
    ) -> Result<Vec<PermissionColumn>, GrantStoreError> {
        if let Some(columns) = self.columns.read().as_ref() {
            return Ok(columns.clone());
        }
        let columns = describe_columns(conn, &self.table)?;
        *self.columns.write() = Some(columns.clone());
        Ok(columns)
    }

    /// Create the grant table if it does not exist.
    ///
    /// Every record references exactly one of a subject or a group, and
    /// each holder has at most one record per object.
    pub fn create_table(&self, columns: &[PermissionColumn]) -> Result<(), GrantStoreError> {
        let t = &self.table;
        let mut definitions = vec![
            format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote(ID_COLUMN)),
            format!("{} INTEGER NOT NULL", quote(t.object_column())),
            format!("{} INTEGER", quote(t.subject_column())),
            format!("{} INTEGER", quote(t.group_column())),
        ];

        for column in columns {
            check_identifier("permission column", &column.name)?;
            if t.is_reserved(&column.name) {
                return Err(GrantStoreError::Schema(format!(
                    "permission column '{}' clashes with a reference column",
                    column.name
                )));
            }
            let default = match column.default {
                Some(true) => " DEFAULT 1",
                Some(false) => " DEFAULT 0",
                None => "",
            };
            definitions.push(format!("{} BOOLEAN{}", quote(&column.name), default));
        }

        let subject = quote(t.subject_column());
        let group = quote(t.group_column());
        let object = quote(t.object_column());
        definitions.push(format!(
            "CHECK (({} IS NULL) <> ({} IS NULL))",
            subject, group
        ));
        definitions.push(format!("UNIQUE ({}, {})", object, subject));
        definitions.push(format!("UNIQUE ({}, {})", object, group));

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote(t.table()),
            definitions.join(",\n    ")
        );

        debug!(
            "creating grant table '{}' with {} permission columns",
            t.table(),
            columns.len()
        );
        let conn = self.conn.lock();
        conn.execute_batch(&sql)
            .map_err(|e| GrantStoreError::Write(format!("Failed to create grant table: {}", e)))?;
        self.refresh_columns();
        Ok(())
    }

    fn select_sql(&self, columns: &[PermissionColumn]) -> String {
        let t = &self.table;
        let mut selected = vec![
            quote(ID_COLUMN),
            quote(t.object_column()),
            quote(t.subject_column()),
            quote(t.group_column()),
        ];
        selected.extend(columns.iter().map(|c| quote(&c.name)));
        format!("SELECT {} FROM {}", selected.join(", "), quote(t.table()))
    }

    fn order_by(&self) -> String {
        // NULLs sort first, so group records precede direct ones
        format!(
            " ORDER BY {}, {}, {}",
            quote(self.table.subject_column()),
            quote(self.table.group_column()),
            quote(ID_COLUMN)
        )
    }

    fn query(
        &self,
        conn: &Connection,
        sql: &str,
        params: Vec<Value>,
        columns: &[PermissionColumn],
    ) -> Result<Vec<GrantRecord>, GrantStoreError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| GrantStoreError::Read(e.to_string()))?;

        let rows = stmt
            .query_map(params_from_iter(params), |row| read_row(row, columns))
            .map_err(|e| GrantStoreError::Read(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| GrantStoreError::Read(e.to_string()))?;

        rows.into_iter().collect()
    }

    /// Column list and values for writing `record`.
    ///
    /// Permissions the record leaves unset are written as NULL when
    /// `include_unset` is true and omitted otherwise, so inserts pick up the
    /// column default.
    fn assignments(
        &self,
        record: &GrantRecord,
        columns: &[PermissionColumn],
        include_unset: bool,
    ) -> Result<(Vec<String>, Vec<Value>), GrantStoreError> {
        if let Some(name) = record
            .values
            .keys()
            .find(|name| !columns.iter().any(|c| &c.name == *name))
        {
            return Err(GrantStoreError::UnknownPermission(name.clone()));
        }

        let t = &self.table;
        let (subject, group) = match record.holder {
            GrantHolder::Subject(SubjectId(id)) => (Value::Integer(id), Value::Null),
            GrantHolder::Group(GroupId(id)) => (Value::Null, Value::Integer(id)),
        };
        let mut names = vec![
            quote(t.object_column()),
            quote(t.subject_column()),
            quote(t.group_column()),
        ];
        let mut values = vec![Value::Integer(record.object.0), subject, group];

        for column in columns {
            match record.value(&column.name) {
                Some(allowed) => {
                    names.push(quote(&column.name));
                    values.push(Value::Integer(allowed as i64));
                }
                None if include_unset => {
                    names.push(quote(&column.name));
                    values.push(Value::Null);
                }
                None => {}
            }
        }
        Ok((names, values))
    }
}

/// Permission columns of `table`: every BOOLEAN-typed column that is not a
/// key or reference column.
fn describe_columns(
    conn: &Connection,
    table: &GrantTable,
) -> Result<Vec<PermissionColumn>, GrantStoreError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote(table.table())))
        .map_err(|e| GrantStoreError::Schema(e.to_string()))?;

    let described = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })
        .map_err(|e| GrantStoreError::Schema(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| GrantStoreError::Schema(e.to_string()))?;

    if described.is_empty() {
        return Err(GrantStoreError::Schema(format!(
            "grant table '{}' does not exist",
            table.table()
        )));
    }

    Ok(described
        .into_iter()
        .filter(|(name, data_type, _)| {
            !table.is_reserved(name) && data_type.to_ascii_uppercase().contains("BOOL")
        })
        .map(|(name, _, default)| PermissionColumn::new(name, parse_default(default.as_deref())))
        .collect())
}

/// Interpret a column's declared default as a decision.
fn parse_default(raw: Option<&str>) -> Option<bool> {
    parse_flag(raw?)
}

/// `1`/`0` or `true`/`false`, optionally quoted, in any case.
fn parse_flag(raw: &str) -> Option<bool> {
    let raw = raw.trim().trim_matches('\'');
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Decode a stored permission cell. SQLite keeps BOOLEAN values as integers,
/// but a text default such as `'true'` is stored verbatim.
///
/// Returns `None` for a value that is not a boolean at all.
fn decode_cell(value: Value) -> Option<Option<bool>> {
    match value {
        Value::Null => Some(None),
        Value::Integer(n) => Some(Some(n != 0)),
        Value::Text(text) => parse_flag(&text).map(Some),
        Value::Real(_) | Value::Blob(_) => None,
    }
}

/// Map one selected row. The outer result carries SQLite errors, the inner
/// one rows that break the holder invariant.
fn read_row(
    row: &Row<'_>,
    columns: &[PermissionColumn],
) -> rusqlite::Result<Result<GrantRecord, GrantStoreError>> {
    let id: i64 = row.get(0)?;
    let object: i64 = row.get(1)?;
    let subject: Option<i64> = row.get(2)?;
    let group: Option<i64> = row.get(3)?;

    let mut values = BTreeMap::new();
    for (i, column) in columns.iter().enumerate() {
        match decode_cell(row.get::<_, Value>(4 + i)?) {
            Some(Some(allowed)) => {
                values.insert(column.name.clone(), allowed);
            }
            Some(None) => {}
            None => {
                return Ok(Err(GrantStoreError::Read(format!(
                    "grant {} has a non-boolean value in '{}'",
                    id, column.name
                ))))
            }
        }
    }

    let holder = match (subject, group) {
        (Some(subject), None) => GrantHolder::Subject(SubjectId(subject)),
        (None, Some(group)) => GrantHolder::Group(GroupId(group)),
        _ => {
            return Ok(Err(GrantStoreError::Read(format!(
                "grant {} must reference exactly one of a subject or a group",
                id
            ))))
        }
    };

    Ok(Ok(GrantRecord {
        id: Some(GrantId(id)),
        object: ObjectId(object),
        holder,
        values,
    }))
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

impl GrantStore for SqliteGrantStore {
    fn columns(&self) -> Result<Vec<PermissionColumn>, GrantStoreError> {
        let conn = self.conn.lock();
        self.permission_columns(&conn)
    }

    fn insert(&self, record: GrantRecord) -> Result<GrantId, GrantStoreError> {
        let conn = self.conn.lock();
        let columns = self.permission_columns(&conn)?;
        let (names, values) = self.assignments(&record, &columns, false)?;

        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(self.table.table()),
            names.join(", "),
            placeholders
        );
        conn.execute(&sql, params_from_iter(values))
            .map_err(|e| GrantStoreError::Write(e.to_string()))?;

        Ok(GrantId(conn.last_insert_rowid()))
    }

    fn update(&self, record: &GrantRecord) -> Result<bool, GrantStoreError> {
        let id = record.id.ok_or(GrantStoreError::MissingId)?;
        let conn = self.conn.lock();
        let columns = self.permission_columns(&conn)?;
        let (names, mut values) = self.assignments(record, &columns, true)?;

        let assignments: Vec<String> = names.iter().map(|n| format!("{} = ?", n)).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote(self.table.table()),
            assignments.join(", "),
            quote(ID_COLUMN)
        );
        values.push(Value::Integer(id.0));

        let changed = conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| GrantStoreError::Write(e.to_string()))?;
        Ok(changed > 0)
    }

    fn load(&self, query: &GrantQuery) -> Result<Vec<GrantRecord>, GrantStoreError> {
        let conn = self.conn.lock();
        let columns = self.permission_columns(&conn)?;
        let t = &self.table;

        let mut params = vec![Value::Integer(query.object.0), Value::Integer(query.subject.0)];
        let mut holder = format!("{} = ?", quote(t.subject_column()));
        if !query.groups.is_empty() {
            let placeholders = vec!["?"; query.groups.len()].join(", ");
            holder = format!(
                "({} OR {} IN ({}))",
                holder,
                quote(t.group_column()),
                placeholders
            );
            params.extend(query.groups.iter().map(|g| Value::Integer(g.0)));
        }

        let sql = format!(
            "{} WHERE {} = ? AND {}{}",
            self.select_sql(&columns),
            quote(t.object_column()),
            holder,
            self.order_by()
        );
        self.query(&conn, &sql, params, &columns)
    }

    fn load_all(&self) -> Result<Vec<GrantRecord>, GrantStoreError> {
        let conn = self.conn.lock();
        let columns = self.permission_columns(&conn)?;
        let sql = format!(
            "{} ORDER BY {}",
            self.select_sql(&columns),
            quote(ID_COLUMN)
        );
        self.query(&conn, &sql, Vec::new(), &columns)
    }

    fn delete(&self, id: GrantId) -> Result<bool, GrantStoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote(self.table.table()),
            quote(ID_COLUMN)
        );
        let changed = self
            .conn
            .lock()
            .execute(&sql, params![id.0])
            .map_err(|e| GrantStoreError::Write(e.to_string()))?;
        Ok(changed > 0)
    }

    fn clear(&self) -> Result<(), GrantStoreError> {
        let sql = format!("DELETE FROM {}", quote(self.table.table()));
        self.conn
            .lock()
            .execute(&sql, [])
            .map_err(|e| GrantStoreError::Write(e.to_string()))?;
        Ok(())
    }
}
