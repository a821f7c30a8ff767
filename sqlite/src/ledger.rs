//! The migration ledger.
//!
//! A table named `Migration` holds one row per applied migration. Its `Id`
//! column is the ledger's own identity and is never exposed; callers only
//! see the business `Number`, the `Description`, and the `CreatedAt`
//! timestamp.
//!
//! # Table structure
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS Migration (
//!     Id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     Number INTEGER NOT NULL,
//!     Description TEXT NOT NULL,
//!     CreatedAt TEXT NOT NULL DEFAULT (CURRENT_TIMESTAMP)
//! );
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::error::Result;
use crate::migration::Migration;

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "Migration";

/// Timestamp layout shared with SQLite's `CURRENT_TIMESTAMP`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CREATE_LEDGER_SQL: &str = "
CREATE TABLE IF NOT EXISTS Migration (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    Number INTEGER NOT NULL,
    Description TEXT NOT NULL,
    CreatedAt TEXT NOT NULL DEFAULT (CURRENT_TIMESTAMP)
);
";

/// One applied migration as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub number: u32,
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

/// Creates the ledger table if it does not exist yet.
pub fn ensure_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_LEDGER_SQL)?;
    Ok(())
}

/// Returns `true` if the ledger table exists.
pub fn table_exists(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![LEDGER_TABLE],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Highest applied migration number, or `None` for an empty ledger.
pub fn max_applied_number(conn: &Connection) -> Result<Option<u32>> {
    let max: Option<u32> =
        conn.query_row("SELECT MAX(Number) FROM Migration", [], |row| row.get(0))?;
    Ok(max)
}

/// Returns `true` if `number` is already recorded.
pub fn is_applied(conn: &Connection, number: u32) -> Result<bool> {
    let hit = conn
        .query_row(
            "SELECT 1 FROM Migration WHERE Number = ?1 LIMIT 1",
            params![number],
            |_| Ok(()),
        )
        .optional()?;
    Ok(hit.is_some())
}

/// Records `migration` as applied now.
///
/// Call it on the transaction that ran the migration so that the ledger
/// row commits or rolls back together with the schema change.
pub fn record_applied(conn: &Connection, migration: &dyn Migration) -> Result<()> {
    let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
    conn.execute(
        "INSERT INTO Migration (Number, Description, CreatedAt) VALUES (?1, ?2, ?3)",
        params![migration.number(), migration.description(), now],
    )?;
    Ok(())
}

/// All ledger rows in ascending number order.
pub fn applied(conn: &Connection) -> Result<Vec<MigrationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT Number, Description, CreatedAt FROM Migration ORDER BY Number, Id",
    )?;
    let rows = stmt.query_map([], |row| {
        let created_at: String = row.get(2)?;
        Ok(MigrationRecord {
            number: row.get(0)?,
            description: row.get(1)?,
            applied_at: parse_timestamp(&created_at),
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Parses a ledger timestamp, accepting RFC 3339 as well as SQLite's own
/// layout. Unparseable text maps to the Unix epoch.
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}
