//! Configuration and store location for the stowage store.
//!
//! This crate answers two questions for the storage backend: where does the
//! store file live, and how should connections to it be set up.
//!
//! # Quick start
//!
//! ```no_run
//! use stowage_config::{StoreConfig, store_path};
//!
//! // Defaults: platform data dir, named after the current executable
//! let config = StoreConfig::default();
//! let path = store_path(config.locator().as_ref()).unwrap();
//! println!("store: {}", path.display());
//!
//! // Or load overrides from YAML
//! let config = StoreConfig::load("stowage.yml").unwrap();
//! println!("busy timeout: {:?}", config.connection.busy_timeout());
//! ```

mod config;
mod error;
mod locator;

pub use config::{ConnectionSettings, JournalMode, StoreConfig};
pub use error::{ConfigError, Result};
pub use locator::{FixedDirectory, LocalAppData, StoreLocator, store_path};
