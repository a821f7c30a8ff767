//! Engine-agnostic building blocks for the stowage store.
//!
//! This crate defines the types shared by the storage backend and its
//! callers:
//!
//! - [`Value`]: a loosely typed column value (SQLite's storage classes).
//! - [`Record`]: an ordered row of named values; the result type of raw
//!   queries and the intermediate form entities are decoded from.
//! - [`Entity`]: the naming convention binding a record type to a table,
//!   with [`EntityMeta`] holding the validated, cached metadata and the
//!   [`entity!`] macro implementing it for plain structs.
//!
//! Identifier validation ([`validate_identifier`]) keeps table and column
//! names spliced into statement text restricted to plain identifiers.
//!
//! # Example
//!
//! ```
//! use stowage_core::*;
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Widget {
//!     id: i64,
//!     name: String,
//! }
//!
//! entity!(Widget { key: id, name });
//!
//! let record: Record = [("WidgetId", Value::Integer(1)), ("Name", Value::from("bolt"))]
//!     .into_iter()
//!     .collect();
//! let widget = Widget::from_record(&record).unwrap();
//! assert_eq!(widget, Widget { id: 1, name: "bolt".into() });
//! ```

mod entity;
mod error;
mod validate;
mod value;

pub use entity::{Entity, EntityMeta};
pub use error::{CoreError, Result};
pub use validate::{quote_identifier, validate_identifier};
pub use value::{FromValue, Record, Value};
