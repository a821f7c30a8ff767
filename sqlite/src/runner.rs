//! Ordered, exactly-once application of pending migrations.
//!
//! Each migration runs in its own `IMMEDIATE` transaction together with its
//! ledger row, so a migration is either fully applied and recorded or not
//! applied at all. Dropping a [`rusqlite::Transaction`] rolls it back, which
//! covers every early return below.

use rusqlite::{Connection, TransactionBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::ledger;
use crate::migration::{Migration, Migrations};

/// Applies the migrations of a [`Migrations`] set in ascending number order.
#[derive(Debug)]
pub struct MigrationRunner<'a> {
    migrations: Vec<&'a dyn Migration>,
}

impl<'a> MigrationRunner<'a> {
    /// Orders the set and checks it for duplicate numbers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateMigrationNumber`] before any schema is
    /// touched.
    pub fn new(migrations: &'a Migrations) -> Result<Self> {
        Ok(Self {
            migrations: migrations.discover()?,
        })
    }

    /// Migrations numbered above `since`, in application order. `None`
    /// selects every migration.
    pub fn pending(&self, since: Option<u32>) -> Vec<&'a dyn Migration> {
        self.migrations
            .iter()
            .copied()
            .filter(|m| since.is_none_or(|max| m.number() > max))
            .collect()
    }

    /// Applies every migration numbered above `since` and returns the
    /// numbers applied.
    ///
    /// Stops at the first failure. Migrations committed before the failure
    /// stay applied; the failing one leaves no trace.
    ///
    /// # Errors
    ///
    /// - [`StoreError::MigrationAlreadyApplied`] if the ledger already holds
    ///   a candidate's number.
    /// - [`StoreError::MigrationFailed`] if a migration's own change fails.
    /// - [`StoreError::Cancelled`] if `cancel` fires before a migration is
    ///   applied or committed.
    pub fn apply_pending(
        &self,
        conn: &mut Connection,
        since: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u32>> {
        let pending = self.pending(since);
        if pending.is_empty() {
            debug!(?since, "No pending migrations");
            return Ok(Vec::new());
        }

        let mut applied = Vec::with_capacity(pending.len());
        for migration in pending {
            apply_one(conn, migration, cancel)?;
            applied.push(migration.number());
        }
        Ok(applied)
    }
}

fn apply_one(
    conn: &mut Connection,
    migration: &dyn Migration,
    cancel: &CancellationToken,
) -> Result<()> {
    let number = migration.number();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if ledger::is_applied(&tx, number)? {
        warn!(number, "Migration already recorded in ledger");
        return Err(StoreError::MigrationAlreadyApplied(number));
    }

    if cancel.is_cancelled() {
        return Err(StoreError::Cancelled);
    }

    migration.apply(&tx).map_err(|source| {
        if cancel.is_cancelled() {
            return StoreError::Cancelled;
        }
        warn!(number, description = migration.description(), error = %source, "Migration failed");
        StoreError::MigrationFailed {
            number,
            description: migration.description().to_string(),
            source,
        }
    })?;

    ledger::record_applied(&tx, migration)?;

    if cancel.is_cancelled() {
        return Err(StoreError::Cancelled);
    }
    tx.commit()?;

    info!(number, description = migration.description(), "Applied migration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::SqlMigration;

    fn widget_migrations() -> Migrations {
        Migrations::new()
            .with(SqlMigration::new(
                1,
                "create Widget table",
                "CREATE TABLE Widget (WidgetId INTEGER PRIMARY KEY AUTOINCREMENT, Name TEXT NOT NULL);",
            ))
            .with(SqlMigration::new(
                2,
                "add Color column to Widget",
                "ALTER TABLE Widget ADD COLUMN Color TEXT;",
            ))
    }

    fn ledger_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ledger::ensure_table(&conn).unwrap();
        conn
    }

    #[test]
    fn test_pending_filters_by_since() {
        let migrations = widget_migrations();
        let runner = MigrationRunner::new(&migrations).unwrap();
        assert_eq!(runner.pending(None).len(), 2);
        assert_eq!(runner.pending(Some(1))[0].number(), 2);
        assert!(runner.pending(Some(2)).is_empty());
    }

    #[test]
    fn test_apply_pending_in_order() {
        let migrations = widget_migrations();
        let runner = MigrationRunner::new(&migrations).unwrap();
        let mut conn = ledger_conn();

        let applied = runner
            .apply_pending(&mut conn, None, &CancellationToken::new())
            .unwrap();
        assert_eq!(applied, [1, 2]);
        assert_eq!(ledger::max_applied_number(&conn).unwrap(), Some(2));

        conn.execute("INSERT INTO Widget (Name, Color) VALUES ('bolt', 'red')", [])
            .unwrap();
    }

    #[test]
    fn test_apply_pending_resumes_after_since() {
        let migrations = widget_migrations();
        let runner = MigrationRunner::new(&migrations).unwrap();
        let mut conn = ledger_conn();
        let cancel = CancellationToken::new();

        let first = MigrationRunner::new(&Migrations::new().with(SqlMigration::new(
            1,
            "create Widget table",
            "CREATE TABLE Widget (WidgetId INTEGER PRIMARY KEY AUTOINCREMENT, Name TEXT NOT NULL);",
        )))
        .unwrap()
        .apply_pending(&mut conn, None, &cancel)
        .unwrap();
        assert_eq!(first, [1]);

        let since = ledger::max_applied_number(&conn).unwrap();
        let second = runner.apply_pending(&mut conn, since, &cancel).unwrap();
        assert_eq!(second, [2]);
    }

    #[test]
    fn test_already_applied_is_rejected() {
        let migrations = widget_migrations();
        let runner = MigrationRunner::new(&migrations).unwrap();
        let mut conn = ledger_conn();
        ledger::record_applied(&conn, &SqlMigration::new(1, "create Widget table", "")).unwrap();

        // since = None forces migration 1 back into the candidate set
        let err = runner
            .apply_pending(&mut conn, None, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::MigrationAlreadyApplied(1)));
        assert_eq!(ledger::applied(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let migrations = Migrations::new()
            .with(SqlMigration::new(1, "create Widget table", "CREATE TABLE Widget (WidgetId INTEGER PRIMARY KEY);"))
            .with(SqlMigration::new(
                2,
                "half applied",
                "CREATE TABLE Gear (GearId INTEGER PRIMARY KEY); INSERT INTO Nowhere VALUES (1);",
            ));
        let runner = MigrationRunner::new(&migrations).unwrap();
        let mut conn = ledger_conn();

        let err = runner
            .apply_pending(&mut conn, None, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::MigrationFailed { number: 2, .. }));
        assert_eq!(ledger::max_applied_number(&conn).unwrap(), Some(1));

        let gear: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'Gear'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(gear, 0);
    }

    #[test]
    fn test_cancelled_token_applies_nothing() {
        let migrations = widget_migrations();
        let runner = MigrationRunner::new(&migrations).unwrap();
        let mut conn = ledger_conn();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = runner.apply_pending(&mut conn, None, &cancel).unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
        assert_eq!(ledger::max_applied_number(&conn).unwrap(), None);
    }
}
