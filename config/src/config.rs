//! Store configuration.
//!
//! Defines the YAML-serializable configuration that controls where the store
//! lives and how connections to it are set up. Every field has a default, so
//! an empty document is a valid configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! app_name: inventory
//! directory: /var/lib/inventory
//! connection:
//!   busy_timeout_ms: 5000
//!   foreign_keys: true
//!   journal_mode: wal
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::locator::{FixedDirectory, LocalAppData, StoreLocator};

/// SQLite journal mode applied when a connection opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    /// Write-ahead logging (the default).
    #[default]
    Wal,
    Off,
}

impl JournalMode {
    /// The keyword used in `PRAGMA journal_mode`.
    pub fn as_pragma(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
            JournalMode::Off => "OFF",
        }
    }
}

/// Per-connection settings.
///
/// # Examples
///
/// ```
/// # use stowage_config::ConnectionSettings;
/// let settings = ConnectionSettings::default();
/// assert!(settings.foreign_keys);
/// assert_eq!(settings.busy_timeout().as_millis(), 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Whether foreign key constraints are enforced.
    pub foreign_keys: bool,
    /// Journal mode for the store file.
    pub journal_mode: JournalMode,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
            foreign_keys: true,
            journal_mode: JournalMode::default(),
        }
    }
}

impl ConnectionSettings {
    /// The busy timeout as a [`Duration`].
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Top-level store configuration.
///
/// # Examples
///
/// ```no_run
/// use stowage_config::StoreConfig;
///
/// let config = StoreConfig::load("stowage.yml").unwrap();
/// let path = stowage_config::store_path(config.locator().as_ref()).unwrap();
/// println!("store lives at {}", path.display());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Application name; names the data directory and thus the store file.
    /// Defaults to the current executable's file stem.
    pub app_name: Option<String>,
    /// Explicit application directory, bypassing the platform data dir.
    pub directory: Option<PathBuf>,
    /// Connection settings.
    pub connection: ConnectionSettings,
}

impl StoreConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::ConfigError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::ConfigError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Builds the location provider described by this configuration.
    ///
    /// An explicit `directory` wins; otherwise the platform's local data
    /// directory is used, with a subdirectory named after the application.
    pub fn locator(&self) -> Box<dyn StoreLocator> {
        match &self.directory {
            Some(dir) => Box::new(FixedDirectory::new(dir)),
            None => match &self.app_name {
                Some(name) => Box::new(LocalAppData::new(name)),
                None => Box::new(LocalAppData::for_current_exe()),
            },
        }
    }
}
