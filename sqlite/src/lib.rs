//! SQLite backend for the stowage store.
//!
//! This crate bootstraps a single-file SQLite store, evolves its schema
//! through numbered migrations recorded in a ledger table, and offers
//! convention-driven CRUD over it.
//!
//! # Architecture
//!
//! - **`migration`**: the [`Migration`] contract, [`SqlMigration`], and the
//!   [`Migrations`] registration set
//! - **`ledger`**: the `Migration` table recording applied numbers
//! - **`runner`**: [`MigrationRunner`], one transaction per migration
//! - **`initializer`**: [`DatabaseInitializer`], create-or-migrate under a
//!   process-wide per-store lock
//! - **`access`**: [`DataAccess`], generic CRUD keyed by entity metadata
//!
//! All blocking SQLite work runs on tokio's blocking pool and honors a
//! [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! # Quick start
//!
//! ```no_run
//! use stowage_config::FixedDirectory;
//! use stowage_sqlite::{DataAccess, DatabaseInitializer, Migrations, SqlMigration};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> stowage_sqlite::Result<()> {
//! let migrations = Migrations::new().with(SqlMigration::new(
//!     1,
//!     "create Widget table",
//!     "CREATE TABLE Widget (WidgetId INTEGER PRIMARY KEY AUTOINCREMENT, Name TEXT NOT NULL);",
//! ));
//!
//! let init = DatabaseInitializer::new(
//!     &FixedDirectory::new("/var/lib/my-app"),
//!     migrations,
//!     Default::default(),
//! )?;
//! let cancel = CancellationToken::new();
//! let report = init.initialize(&cancel).await?;
//! println!("created: {}, applied: {:?}", report.created, report.applied);
//!
//! let access = DataAccess::from_initializer(&init);
//! let rows = access.read_raw("SELECT COUNT(*) AS n FROM Widget", &[], &cancel).await?;
//! println!("{} widgets", rows[0].get::<i64>("n")?);
//! # Ok(())
//! # }
//! ```

mod access;
mod connection;
mod convert;
mod error;
mod initializer;
pub mod ledger;
mod migration;
mod runner;
mod task;

pub use access::{DataAccess, Select};
pub use error::{Result, StoreError};
pub use initializer::{DatabaseInitializer, InitReport, InitState, resolve_store_path};
pub use ledger::MigrationRecord;
pub use migration::{Migration, Migrations, SqlMigration};
pub use runner::MigrationRunner;
