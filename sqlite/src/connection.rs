//! Opening connections to the store file.
//!
//! Every connection gets the same pragmas from [`ConnectionSettings`], so
//! the initializer and data access see an identically configured store.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use stowage_config::ConnectionSettings;
use tracing::debug;

use crate::error::Result;

/// Whether opening may create the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenMode {
    /// Create the file if it is missing (bootstrap only).
    Create,
    /// Fail if the file is missing.
    Existing,
}

/// Opens the store and applies the configured pragmas.
pub(crate) fn open_store(
    path: &Path,
    settings: &ConnectionSettings,
    mode: OpenMode,
) -> Result<Connection> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if mode == OpenMode::Create {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }

    let conn = Connection::open_with_flags(path, flags)?;
    configure(&conn, settings)?;
    debug!(path = %path.display(), ?mode, "Opened store connection");
    Ok(conn)
}

/// Applies busy timeout, foreign keys, and journal mode.
pub(crate) fn configure(conn: &Connection, settings: &ConnectionSettings) -> Result<()> {
    conn.busy_timeout(settings.busy_timeout())?;
    let foreign_keys = if settings.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;

    // journal_mode reports the resulting mode as a row, so it cannot go
    // through execute_batch.
    let mode: String = conn.query_row(
        &format!("PRAGMA journal_mode = {}", settings.journal_mode.as_pragma()),
        [],
        |row| row.get(0),
    )?;
    if !mode.eq_ignore_ascii_case(settings.journal_mode.as_pragma()) {
        debug!(requested = settings.journal_mode.as_pragma(), actual = %mode, "Journal mode not applied");
    }
    Ok(())
}
