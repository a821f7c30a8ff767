//! Application-directory resolution.
//!
//! The store file always lives at `{directory}/{directory name}.db`. A
//! [`StoreLocator`] supplies the directory and makes sure it exists;
//! [`store_path`] derives the file path from it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ConfigError, Result};

/// Provides the application-local directory that holds the store.
///
/// Implementations create the directory if it does not exist yet.
pub trait StoreLocator: Send + Sync {
    /// Returns the absolute path of the application directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PathResolution`] if the directory cannot be
    /// determined or created.
    fn app_directory(&self) -> Result<PathBuf>;
}

impl<L: StoreLocator + ?Sized> StoreLocator for Box<L> {
    fn app_directory(&self) -> Result<PathBuf> {
        (**self).app_directory()
    }
}

impl<L: StoreLocator + ?Sized> StoreLocator for std::sync::Arc<L> {
    fn app_directory(&self) -> Result<PathBuf> {
        (**self).app_directory()
    }
}

/// A caller-chosen directory.
#[derive(Debug, Clone)]
pub struct FixedDirectory {
    path: PathBuf,
}

impl FixedDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StoreLocator for FixedDirectory {
    fn app_directory(&self) -> Result<PathBuf> {
        let path = if self.path.is_absolute() {
            self.path.clone()
        } else {
            std::env::current_dir()
                .map_err(|e| ConfigError::PathResolution(format!("no working directory: {e}")))?
                .join(&self.path)
        };
        ensure_dir(&path)?;
        Ok(path)
    }
}

/// `{platform local data dir}/{app name}`, e.g.
/// `~/.local/share/inventory` on Linux.
#[derive(Debug, Clone)]
pub struct LocalAppData {
    app_name: String,
}

impl LocalAppData {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    /// Names the directory after the running executable's file stem.
    pub fn for_current_exe() -> Self {
        let name = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "stowage".to_string());
        Self::new(name)
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }
}

impl StoreLocator for LocalAppData {
    fn app_directory(&self) -> Result<PathBuf> {
        if self.app_name.is_empty() {
            return Err(ConfigError::PathResolution(
                "application name is empty".to_string(),
            ));
        }
        let base = dirs::data_local_dir().ok_or_else(|| {
            ConfigError::PathResolution("no local data directory on this platform".to_string())
        })?;
        let path = base.join(&self.app_name);
        ensure_dir(&path)?;
        Ok(path)
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to create application directory");
        ConfigError::PathResolution(format!("cannot create {}: {e}", path.display()))
    })
}

/// Resolves the store file path: `{dir}/{dir name}.db`.
///
/// # Examples
///
/// ```
/// use stowage_config::{FixedDirectory, store_path};
///
/// let dir = std::env::temp_dir().join("stowage_doc_inventory");
/// let path = store_path(&FixedDirectory::new(&dir)).unwrap();
/// assert_eq!(path, dir.join("stowage_doc_inventory.db"));
/// # std::fs::remove_dir_all(&dir).ok();
/// ```
pub fn store_path(locator: &dyn StoreLocator) -> Result<PathBuf> {
    let dir = locator.app_directory()?;
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            ConfigError::PathResolution(format!(
                "{} has no final component to name the store after",
                dir.display()
            ))
        })?;
    let path = dir.join(format!("{name}.db"));
    debug!(path = %path.display(), "Resolved store path");
    Ok(path)
}
