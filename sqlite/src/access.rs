//! Convention-driven CRUD over the store.
//!
//! Table, key, and column names come from [`EntityMeta`]; values always
//! travel as bound parameters. Every call opens its own connection on the
//! blocking pool and closes it before returning.
//!
//! # Example
//!
//! ```no_run
//! use stowage_core::entity;
//! use stowage_sqlite::{DataAccess, Select};
//! use stowage_config::ConnectionSettings;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Widget {
//!     id: i64,
//!     name: String,
//!     color: Option<String>,
//! }
//!
//! entity!(Widget { key: id, name, color });
//!
//! # async fn demo() -> stowage_sqlite::Result<()> {
//! let access = DataAccess::new("app.db", ConnectionSettings::default());
//! let cancel = CancellationToken::new();
//!
//! let id = access
//!     .create(&Widget { id: 0, name: "bolt".into(), color: Some("red".into()) }, &cancel)
//!     .await?;
//! let red = access
//!     .read_all::<Widget>(Select::all().filter("Color = ?1").param("red"), &cancel)
//!     .await?;
//! assert_eq!(red[0].id, id);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params_from_iter};
use stowage_config::ConnectionSettings;
use stowage_core::{Entity, EntityMeta, Record, Value, quote_identifier};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::connection::{OpenMode, open_store};
use crate::convert::{self, row_to_record};
use crate::error::{Result, StoreError};
use crate::initializer::DatabaseInitializer;
use crate::task::run_blocking;

/// Label used in errors from [`DataAccess::read_raw`].
const RAW_QUERY: &str = "raw query";

/// Filter and projection for [`DataAccess::read_all`].
///
/// The filter is predicate text spliced after `WHERE`; reference values in
/// it as positional parameters (`?1`, `?2`, ...) and supply them with
/// [`param`](Self::param).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    filter: Option<String>,
    params: Vec<Value>,
    columns: Vec<String>,
}

impl Select {
    /// Every row, every column.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.filter = Some(predicate.into());
        self
    }

    /// Appends the next positional parameter.
    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Appends several positional parameters.
    pub fn params<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.params.extend(values.into_iter().map(Into::into));
        self
    }

    /// Restricts the selected columns. Columns left out decode to their
    /// default values.
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Write,
}

impl Access {
    fn wrap(self, entity: &str, source: rusqlite::Error) -> StoreError {
        let entity = entity.to_string();
        match self {
            Access::Read => StoreError::Read { entity, source },
            Access::Write => StoreError::Write { entity, source },
        }
    }
}

/// Generic data access against one store file.
#[derive(Debug, Clone)]
pub struct DataAccess {
    path: PathBuf,
    settings: ConnectionSettings,
}

impl DataAccess {
    /// Accesses the store at `path`. The file must already exist; use
    /// [`DatabaseInitializer`] to create it.
    pub fn new(path: impl Into<PathBuf>, settings: ConnectionSettings) -> Self {
        Self {
            path: path.into(),
            settings,
        }
    }

    /// Accesses the store an initializer manages, with the same settings.
    pub fn from_initializer(initializer: &DatabaseInitializer) -> Self {
        Self::new(initializer.store_path(), initializer.settings().clone())
    }

    pub fn store_path(&self) -> &Path {
        &self.path
    }

    /// Inserts `entity` and returns the new row id.
    ///
    /// Every non-key field is written; the key is assigned by the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the insert fails.
    pub async fn create<T: Entity>(&self, entity: &T, cancel: &CancellationToken) -> Result<i64> {
        let meta = EntityMeta::of::<T>()?;
        let (columns, values): (Vec<&str>, Vec<Value>) = T::FIELDS
            .iter()
            .copied()
            .zip(entity.values())
            .filter(|(field, _)| !field.eq_ignore_ascii_case(meta.key_column()))
            .unzip();

        let table = quote_identifier(meta.table());
        let sql = if columns.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES")
        } else {
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                quoted_list(&columns),
                placeholders(1, columns.len())
            )
        };

        self.run(Access::Write, meta.table(), cancel, move |conn| {
            conn.execute(&sql, params_from_iter(convert::params(&values)))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Reads every row of `T`'s table matching `select`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidArgument`] for a column `T` does not declare.
    /// - [`StoreError::Read`] if the query fails.
    /// - [`StoreError::Entity`] if a row cannot be decoded into `T`.
    pub async fn read_all<T: Entity>(
        &self,
        select: Select,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>> {
        let meta = EntityMeta::of::<T>()?;
        let mut sql = format!(
            "SELECT {} FROM {}",
            projection(meta, &select.columns)?,
            quote_identifier(meta.table())
        );
        if let Some(filter) = select.filter.as_deref().filter(|f| !f.trim().is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }

        let records = self
            .query(Access::Read, meta.table(), sql, select.params, cancel)
            .await?;
        decode(&records)
    }

    /// Reads the row of `T` whose key is `key`, or `None`.
    ///
    /// An empty `columns` selects every column.
    pub async fn read_by_key<T: Entity>(
        &self,
        key: i64,
        columns: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        let meta = EntityMeta::of::<T>()?;
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 LIMIT 1",
            projection(meta, &columns)?,
            quote_identifier(meta.table()),
            quote_identifier(meta.key_column())
        );

        let records = self
            .query(Access::Read, meta.table(), sql, vec![Value::Integer(key)], cancel)
            .await?;
        Ok(decode(&records)?.into_iter().next())
    }

    /// Sets the given columns on the row whose key is `key`.
    ///
    /// Returns `false` if no row has that key.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidArgument`] if `changes` is empty, names the
    ///   key, or names a column `T` does not declare.
    /// - [`StoreError::Write`] if the update fails.
    pub async fn update_by_key<T: Entity>(
        &self,
        key: i64,
        changes: &[(&str, Value)],
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if changes.is_empty() {
            return Err(StoreError::InvalidArgument(
                "at least one column value must be provided".into(),
            ));
        }

        let meta = EntityMeta::of::<T>()?;
        let mut assignments = Vec::with_capacity(changes.len());
        let mut values = Vec::with_capacity(changes.len() + 1);
        for (i, (column, value)) in changes.iter().enumerate() {
            if column.eq_ignore_ascii_case(meta.key_column()) {
                return Err(StoreError::InvalidArgument(format!(
                    "cannot update key column {}",
                    meta.key_column()
                )));
            }
            check_column(meta, column)?;
            assignments.push(format!("{} = ?{}", quote_identifier(column), i + 1));
            values.push(value.clone());
        }
        values.push(Value::Integer(key));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_identifier(meta.table()),
            assignments.join(", "),
            quote_identifier(meta.key_column()),
            values.len()
        );

        self.run(Access::Write, meta.table(), cancel, move |conn| {
            let affected = conn.execute(&sql, params_from_iter(convert::params(&values)))?;
            Ok(affected > 0)
        })
        .await
    }

    /// Deletes the row of `T` whose key is `key`.
    ///
    /// Returns `false` if no row has that key.
    pub async fn delete_by_key<T: Entity>(&self, key: i64, cancel: &CancellationToken) -> Result<bool> {
        let meta = EntityMeta::of::<T>()?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_identifier(meta.table()),
            quote_identifier(meta.key_column())
        );

        self.run(Access::Write, meta.table(), cancel, move |conn| {
            let affected = conn.execute(&sql, [key])?;
            Ok(affected > 0)
        })
        .await
    }

    /// Runs arbitrary `sql` with positional `params` and returns loosely
    /// typed rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a statement that would
    /// modify the store, or [`StoreError::Read`] if the query fails.
    pub async fn read_raw(
        &self,
        sql: &str,
        params: &[Value],
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        self.query(Access::Read, RAW_QUERY, sql.to_string(), params.to_vec(), cancel)
            .await
    }

    /// Runs a statement that must leave the store unchanged.
    async fn query(
        &self,
        access: Access,
        entity: &str,
        sql: String,
        params: Vec<Value>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        self.run(access, entity, cancel, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            if !stmt.readonly() {
                return Err(StoreError::InvalidArgument(format!(
                    "statement would modify the store: {sql}"
                )));
            }
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let rows = stmt.query_map(params_from_iter(convert::params(&params)), |row| {
                row_to_record(row, &columns)
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<Record>>>()?)
        })
        .await
    }

    /// Opens a connection on the blocking pool and runs `work` on it.
    /// SQLite failures are reported as `access` errors against `entity`.
    async fn run<T, F>(
        &self,
        access: Access,
        entity: &str,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let settings = self.settings.clone();

        let result = run_blocking(cancel, move |ctx| {
            let conn = open_store(&path, &settings, OpenMode::Existing)?;
            ctx.arm(&conn);
            ctx.check()?;
            work(&conn)
        })
        .await;

        result.map_err(|e| match e {
            StoreError::Database(source) => {
                error!(entity, ?access, error = %source, "Store operation failed");
                access.wrap(entity, source)
            }
            StoreError::Cancelled => {
                debug!(entity, ?access, "Store operation cancelled");
                StoreError::Cancelled
            }
            other => other,
        })
    }
}

fn check_column(meta: &EntityMeta, column: &str) -> Result<()> {
    if meta.has_column(column) {
        Ok(())
    } else {
        Err(StoreError::InvalidArgument(format!(
            "{} has no column named {column}",
            meta.table()
        )))
    }
}

/// The select list: `*`, or the requested columns after checking them
/// against the entity.
fn projection(meta: &EntityMeta, columns: &[String]) -> Result<String> {
    if columns.is_empty() {
        return Ok("*".to_string());
    }
    for column in columns {
        check_column(meta, column)?;
    }
    Ok(quoted_list(columns))
}

fn quoted_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `?start, ?start+1, ...` for `count` parameters.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode<T: Entity>(records: &[Record]) -> Result<Vec<T>> {
    records
        .iter()
        .map(|record| T::from_record(record).map_err(StoreError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Sprocket {
        id: i64,
        teeth: i64,
    }

    stowage_core::entity!(Sprocket { key: id, teeth });

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(placeholders(4, 1), "?4");
        assert_eq!(placeholders(1, 0), "");
    }

    #[test]
    fn test_projection_checks_columns() {
        let meta = EntityMeta::of::<Sprocket>().unwrap();
        assert_eq!(projection(meta, &[]).unwrap(), "*");
        assert_eq!(
            projection(meta, &["SprocketId".into(), "teeth".into()]).unwrap(),
            "\"SprocketId\", \"teeth\""
        );
        assert!(matches!(
            projection(meta, &["teeth; DROP TABLE Sprocket".into()]),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_select_builder() {
        let select = Select::all()
            .filter("teeth > ?1 AND teeth < ?2")
            .param(10)
            .params([20_i64])
            .columns(["teeth"]);
        assert_eq!(select.params, vec![Value::Integer(10), Value::Integer(20)]);
        assert_eq!(select.columns, ["teeth"]);
        assert_eq!(select.filter.as_deref(), Some("teeth > ?1 AND teeth < ?2"));
    }

    #[tokio::test]
    async fn test_empty_update_is_rejected_before_io() {
        let access = DataAccess::new("/nonexistent/store.db", ConnectionSettings::default());
        let err = access
            .update_by_key::<Sprocket>(1, &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_missing_store_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let access = DataAccess::new(dir.path().join("absent.db"), ConnectionSettings::default());
        let err = access
            .read_all::<Sprocket>(Select::all(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Read { ref entity, .. } if entity == "Sprocket"));
        assert!(!dir.path().join("absent.db").exists());
    }
}
