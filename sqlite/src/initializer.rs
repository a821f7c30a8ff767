//! Store bootstrap: create the file if needed, then migrate it to the
//! latest registered version.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──► Creating ──► Migrating ──► Ready
//!        │              │            │
//!        └──────────────┴────────────┴──► Failed
//! ```
//!
//! An existing file skips `Creating`. The whole sequence holds an exclusive
//! lock shared by every initializer in the process that targets the same
//! store path, so concurrent callers apply each migration once.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::Serialize;
use stowage_config::{ConnectionSettings, StoreConfig, StoreLocator};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::{OpenMode, open_store};
use crate::error::{Result, StoreError};
use crate::ledger;
use crate::migration::Migrations;
use crate::runner::MigrationRunner;
use crate::task::{Interruptible, run_blocking};

/// Position of a [`DatabaseInitializer`] in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InitState {
    Uninitialized,
    Creating,
    Migrating,
    Ready,
    Failed,
}

impl InitState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => InitState::Creating,
            2 => InitState::Migrating,
            3 => InitState::Ready,
            4 => InitState::Failed,
            _ => InitState::Uninitialized,
        }
    }
}

/// Outcome of a successful [`DatabaseInitializer::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitReport {
    /// The store file did not exist and was created.
    pub created: bool,
    /// Numbers of the migrations applied by this call, ascending.
    pub applied: Vec<u32>,
}

type StoreLock = Arc<tokio::sync::Mutex<()>>;

/// Returns the process-wide lock for `path`.
fn store_lock(path: &Path) -> StoreLock {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, StoreLock>>> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(lock_key(path)).or_default())
}

/// The canonical parent directory joined with the file name. The file
/// itself may not exist yet; an unresolvable parent keys on `path` as given.
fn lock_key(path: &Path) -> PathBuf {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    match parent.canonicalize() {
        Ok(dir) => dir.join(name),
        Err(_) => path.to_path_buf(),
    }
}

/// Resolves `{applicationDirectory}/{directoryName}.db` for `locator`.
///
/// # Errors
///
/// Returns [`StoreError::PathResolution`] if the directory cannot be
/// determined or created.
pub fn resolve_store_path(locator: &dyn StoreLocator) -> Result<PathBuf> {
    Ok(stowage_config::store_path(locator)?)
}

/// Brings the store file into existence and up to date.
///
/// The store path is resolved once, at construction.
#[derive(Debug)]
pub struct DatabaseInitializer {
    path: PathBuf,
    migrations: Arc<Migrations>,
    settings: ConnectionSettings,
    lock: StoreLock,
    state: Arc<AtomicU8>,
}

impl DatabaseInitializer {
    /// Creates an initializer for the store `locator` points at.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PathResolution`] if the store path cannot be
    /// resolved.
    pub fn new(
        locator: &dyn StoreLocator,
        migrations: impl Into<Arc<Migrations>>,
        settings: ConnectionSettings,
    ) -> Result<Self> {
        let path = resolve_store_path(locator)?;
        Ok(Self::at_path(path, migrations, settings))
    }

    /// Creates an initializer from a loaded configuration.
    pub fn from_config(config: &StoreConfig, migrations: impl Into<Arc<Migrations>>) -> Result<Self> {
        Self::new(
            config.locator().as_ref(),
            migrations,
            config.connection.clone(),
        )
    }

    /// Creates an initializer for an explicit store file.
    pub fn at_path(
        path: impl Into<PathBuf>,
        migrations: impl Into<Arc<Migrations>>,
        settings: ConnectionSettings,
    ) -> Self {
        let path = path.into();
        let lock = store_lock(&path);
        Self {
            path,
            migrations: migrations.into(),
            settings,
            lock,
            state: Arc::new(AtomicU8::new(InitState::Uninitialized as u8)),
        }
    }

    /// The resolved store file path.
    pub fn store_path(&self) -> &Path {
        &self.path
    }

    /// Connection settings applied to every connection this store opens.
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn state(&self) -> InitState {
        InitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Creates the store if it is missing and applies pending migrations.
    ///
    /// Safe to call repeatedly and concurrently; once the store is current,
    /// further calls apply nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Initialization`] wrapping the underlying
    /// failure, or [`StoreError::Cancelled`] if `cancel` fired first. A
    /// cancelled call leaves [`state`](Self::state) as it was before the call.
    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<InitReport> {
        let before = self.state();
        match self.run(cancel).await {
            Ok(report) => Ok(report),
            Err(StoreError::Cancelled) => {
                set_state(&self.state, before);
                warn!(path = %self.path.display(), state = ?before, "Store initialization cancelled");
                Err(StoreError::Cancelled)
            }
            Err(e) => {
                set_state(&self.state, InitState::Failed);
                error!(path = %self.path.display(), error = %e, "Store initialization failed");
                Err(StoreError::Initialization(Box::new(e)))
            }
        }
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<InitReport> {
        // Reject a bad migration set before the file is touched.
        self.migrations.discover()?;

        let guard = tokio::select! {
            guard = Arc::clone(&self.lock).lock_owned() => guard,
            _ = cancel.cancelled() => return Err(StoreError::Cancelled),
        };
        debug!(path = %self.path.display(), "Acquired store initialization lock");

        let path = self.path.clone();
        let migrations = Arc::clone(&self.migrations);
        let settings = self.settings.clone();
        let state = Arc::clone(&self.state);

        run_blocking(cancel, move |ctx| {
            let _guard = guard;
            bootstrap(&path, &migrations, &settings, &state, ctx)
        })
        .await
    }
}

fn set_state(state: &AtomicU8, next: InitState) {
    state.store(next as u8, Ordering::Release);
}

fn bootstrap(
    path: &Path,
    migrations: &Migrations,
    settings: &ConnectionSettings,
    state: &AtomicU8,
    ctx: &mut Interruptible,
) -> Result<InitReport> {
    let runner = MigrationRunner::new(migrations)?;
    ctx.check()?;

    let created = !path.exists();
    let mut conn = if created {
        set_state(state, InitState::Creating);
        info!(path = %path.display(), "Creating store");
        let conn = open_store(path, settings, OpenMode::Create)?;
        if let Err(e) = ledger::ensure_table(&conn) {
            drop(conn);
            remove_fresh_store(path);
            return Err(e);
        }
        conn
    } else {
        let conn = open_store(path, settings, OpenMode::Existing)?;
        ledger::ensure_table(&conn)?;
        conn
    };
    ctx.arm(&conn);

    set_state(state, InitState::Migrating);
    let since = ledger::max_applied_number(&conn)?;
    debug!(?since, "Read ledger maximum");
    let applied = runner.apply_pending(&mut conn, since, ctx.token())?;

    set_state(state, InitState::Ready);
    info!(path = %path.display(), created, applied = applied.len(), "Store ready");
    Ok(InitReport { created, applied })
}

/// Deletes a store file created by this bootstrap, with its WAL side files.
fn remove_fresh_store(path: &Path) {
    let mut targets = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        targets.push(PathBuf::from(side));
    }
    for target in targets {
        match std::fs::remove_file(&target) {
            Ok(()) => debug!(path = %target.display(), "Removed partially created store file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %target.display(), error = %e, "Cannot remove partially created store file"),
        }
    }
}
