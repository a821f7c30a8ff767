//! Migration contract and registration.
//!
//! A [`Migration`] is one numbered, self-contained schema change. The
//! application registers its migrations explicitly in a [`Migrations`] set;
//! [`Migrations::discover`] orders them and rejects duplicate numbers before
//! anything touches the store.
//!
//! # Example
//!
//! ```
//! use stowage_sqlite::{Migrations, SqlMigration};
//!
//! let migrations = Migrations::new()
//!     .with(SqlMigration::new(2, "add Color column to Widget",
//!         "ALTER TABLE Widget ADD COLUMN Color TEXT;"))
//!     .with(SqlMigration::new(1, "create Widget table",
//!         "CREATE TABLE Widget (WidgetId INTEGER PRIMARY KEY AUTOINCREMENT, Name TEXT NOT NULL);"));
//!
//! let ordered = migrations.discover().unwrap();
//! assert_eq!(ordered.iter().map(|m| m.number()).collect::<Vec<_>>(), [1, 2]);
//! ```

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rusqlite::Transaction;
use tracing::debug;

use crate::error::{Result, StoreError};

/// A single versioned schema change.
///
/// `number` is assigned by the author and never changes once released.
/// Numbers need not be contiguous, but they must be unique within a set.
///
/// When creating tables, declare entity keys as
/// `{Table}Id INTEGER PRIMARY KEY AUTOINCREMENT` so that the key aliases the
/// row id returned from inserts.
pub trait Migration: Send + Sync {
    /// Unique, author-assigned migration number.
    fn number(&self) -> u32;

    /// Human-readable summary, recorded in the ledger.
    fn description(&self) -> &str;

    /// Performs the schema change inside the runner's transaction.
    ///
    /// `tx` dereferences to the connection, so ordinary `execute` calls run
    /// inside the transaction. Do not commit or roll back here.
    fn apply(&self, tx: &Transaction<'_>) -> rusqlite::Result<()>;
}

impl fmt::Debug for dyn Migration + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("number", &self.number())
            .field("description", &self.description())
            .finish()
    }
}

/// A migration expressed as a batch of SQL statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    number: u32,
    description: Cow<'static, str>,
    sql: Cow<'static, str>,
}

impl SqlMigration {
    pub fn new(
        number: u32,
        description: impl Into<Cow<'static, str>>,
        sql: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            number,
            description: description.into(),
            sql: sql.into(),
        }
    }

    /// The statement batch.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Loads a migration from a file named `{number}_{description}.sql`.
    ///
    /// Underscores in the description part become spaces, so
    /// `0002_add_color.sql` is migration 2, "add color".
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a file name without a
    /// numeric prefix, or [`StoreError::Io`] if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (number, description) = parse_file_name(path)?;
        let sql = std::fs::read_to_string(path)?;
        Ok(Self::new(number, description, sql))
    }
}

impl Migration for SqlMigration {
    fn number(&self) -> u32 {
        self.number
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn apply(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute_batch(&self.sql)
    }
}

fn parse_file_name(path: &Path) -> Result<(u32, String)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            StoreError::InvalidArgument(format!("invalid migration file name: {}", path.display()))
        })?;
    let (number, rest) = stem.split_once('_').unwrap_or((stem, ""));
    let number: u32 = number.parse().map_err(|_| {
        StoreError::InvalidArgument(format!(
            "migration file name must start with a number: {}",
            path.display()
        ))
    })?;
    let description = if rest.is_empty() {
        format!("migration {number}")
    } else {
        rest.replace('_', " ")
    };
    Ok((number, description))
}

/// The explicitly registered set of migrations known to the process.
///
/// Cloning is cheap; migrations are shared behind [`Arc`].
#[derive(Clone, Default)]
pub struct Migrations {
    items: Vec<Arc<dyn Migration>>,
}

impl Migrations {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a migration, builder style.
    pub fn with(mut self, migration: impl Migration + 'static) -> Self {
        self.register(migration);
        self
    }

    /// Adds a migration.
    pub fn register(&mut self, migration: impl Migration + 'static) {
        self.items.push(Arc::new(migration));
    }

    /// Adds an already shared migration.
    pub fn register_shared(&mut self, migration: Arc<dyn Migration>) {
        self.items.push(migration);
    }

    /// Loads every `*.sql` file in `dir` as a [`SqlMigration`].
    ///
    /// Other files and subdirectories are ignored.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut migrations = Self::new();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
                paths.push(path);
            }
        }
        paths.sort();
        for path in paths {
            let migration = SqlMigration::from_file(&path)?;
            debug!(number = migration.number(), path = %path.display(), "Loaded migration file");
            migrations.register(migration);
        }
        Ok(migrations)
    }

    /// Number of registered migrations.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the migrations in ascending number order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateMigrationNumber`] if two migrations
    /// share a number.
    pub fn discover(&self) -> Result<Vec<&dyn Migration>> {
        let mut seen = HashSet::with_capacity(self.items.len());
        for migration in &self.items {
            if !seen.insert(migration.number()) {
                return Err(StoreError::DuplicateMigrationNumber(migration.number()));
            }
        }

        let mut ordered: Vec<&dyn Migration> = self.items.iter().map(|m| m.as_ref()).collect();
        ordered.sort_by_key(|m| m.number());
        Ok(ordered)
    }
}

impl fmt::Debug for Migrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.items.iter().map(|m| m.as_ref()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_orders_by_number() {
        let migrations = Migrations::new()
            .with(SqlMigration::new(10, "ten", ""))
            .with(SqlMigration::new(2, "two", ""))
            .with(SqlMigration::new(7, "seven", ""));
        let numbers: Vec<u32> = migrations
            .discover()
            .unwrap()
            .iter()
            .map(|m| m.number())
            .collect();
        assert_eq!(numbers, [2, 7, 10]);
    }

    #[test]
    fn test_discover_rejects_duplicate_numbers() {
        let migrations = Migrations::new()
            .with(SqlMigration::new(1, "first", ""))
            .with(SqlMigration::new(1, "also first", ""));
        assert!(matches!(
            migrations.discover(),
            Err(StoreError::DuplicateMigrationNumber(1))
        ));
    }

    #[test]
    fn test_discover_empty_set() {
        assert!(Migrations::new().discover().unwrap().is_empty());
    }

    #[test]
    fn test_parse_file_name() {
        let (n, d) = parse_file_name(Path::new("/m/0002_add_color_column.sql")).unwrap();
        assert_eq!(n, 2);
        assert_eq!(d, "add color column");

        let (n, d) = parse_file_name(Path::new("15.sql")).unwrap();
        assert_eq!(n, 15);
        assert_eq!(d, "migration 15");

        assert!(matches!(
            parse_file_name(Path::new("init.sql")),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_from_dir_loads_only_sql_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0001_create_widget.sql"), "CREATE TABLE Widget (WidgetId INTEGER PRIMARY KEY);").unwrap();
        std::fs::write(dir.path().join("0002_add_color.sql"), "ALTER TABLE Widget ADD COLUMN Color TEXT;").unwrap();
        std::fs::write(dir.path().join("README.md"), "notes").unwrap();

        let migrations = Migrations::from_dir(dir.path()).unwrap();
        assert_eq!(migrations.len(), 2);
        let ordered = migrations.discover().unwrap();
        assert_eq!(ordered[0].description(), "create widget");
        assert_eq!(ordered[1].number(), 2);
    }
}
