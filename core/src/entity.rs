//! Convention-based entity metadata.
//!
//! A record type `T` maps to a table named `T`, keyed by an integer column
//! named `{T}Id`; every other field maps to a column of the same name. The
//! [`Entity`] trait states that convention for one type, and [`EntityMeta`]
//! is the validated metadata derived from it. Metadata is computed once per
//! type and cached for the life of the process.
//!
//! # Example
//!
//! ```
//! use stowage_core::{Entity, EntityMeta, entity};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Widget {
//!     id: i64,
//!     name: String,
//!     color: Option<String>,
//! }
//!
//! entity!(Widget { key: id, name, color });
//!
//! let meta = EntityMeta::of::<Widget>().unwrap();
//! assert_eq!(meta.table(), "Widget");
//! assert_eq!(meta.key_column(), "WidgetId");
//! assert_eq!(meta.columns(), ["name", "color"]);
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::error::{CoreError, Result};
use crate::validate::validate_identifier;
use crate::value::{Record, Value};

/// A record type stored under the naming convention.
///
/// Implement it by hand, or with the [`entity!`](crate::entity) macro for
/// plain structs.
pub trait Entity: Sized + 'static {
    /// Type name; doubles as the table name.
    const NAME: &'static str;

    /// Non-key column names, in the order [`values`](Self::values) returns
    /// them.
    const FIELDS: &'static [&'static str];

    /// Values of the non-key columns, aligned with [`FIELDS`](Self::FIELDS).
    fn values(&self) -> Vec<Value>;

    /// Rebuilds the entity from a row. Columns absent from the row (a column
    /// subset was selected) decode to their defaults.
    fn from_record(record: &Record) -> Result<Self>;
}

/// Validated table, key, and column names for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    table: String,
    key_column: String,
    columns: Vec<String>,
}

static META_CACHE: OnceLock<RwLock<HashMap<TypeId, &'static EntityMeta>>> = OnceLock::new();

impl EntityMeta {
    /// Builds metadata for a type named `name` with the given fields.
    ///
    /// A field that names the key column is dropped from the column list.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidIdentifier`] for a name that is not a
    /// plain identifier and [`CoreError::DuplicateColumn`] for a repeated
    /// field.
    pub fn new(name: &str, fields: &[&str]) -> Result<Self> {
        validate_identifier(name)?;
        let key_column = format!("{name}Id");

        let mut columns: Vec<String> = Vec::with_capacity(fields.len());
        for field in fields {
            validate_identifier(field)?;
            if field.eq_ignore_ascii_case(&key_column) {
                continue;
            }
            if columns.iter().any(|c| c.eq_ignore_ascii_case(field)) {
                return Err(CoreError::DuplicateColumn {
                    entity: name.to_string(),
                    column: field.to_string(),
                });
            }
            columns.push(field.to_string());
        }

        Ok(Self {
            table: name.to_string(),
            key_column,
            columns,
        })
    }

    /// Returns the cached metadata for `T`, deriving it on first use.
    pub fn of<T: Entity>() -> Result<&'static EntityMeta> {
        let cache = META_CACHE.get_or_init(Default::default);
        let id = TypeId::of::<T>();

        if let Some(meta) = cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return Ok(*meta);
        }

        let meta = EntityMeta::new(T::NAME, T::FIELDS)?;
        let mut guard = cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(*guard
            .entry(id)
            .or_insert_with(|| &*Box::leak(Box::new(meta))))
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Primary key column name (`{T}Id`).
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Non-key column names in declaration order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns `true` if `name` is the key or one of the columns, ignoring
    /// ASCII case.
    pub fn has_column(&self, name: &str) -> bool {
        self.key_column.eq_ignore_ascii_case(name)
            || self.columns.iter().any(|c| c.eq_ignore_ascii_case(name))
    }
}

/// Implements [`Entity`] for a struct by the naming convention.
///
/// The `key` field receives the `{Type}Id` column; every listed field maps
/// to the column of the same name. Field types need `Clone`, `Default`,
/// [`FromValue`](crate::FromValue) and `Into<Value>`.
///
/// ```
/// use stowage_core::entity;
///
/// #[derive(Debug, Clone, Default)]
/// struct Note {
///     note_id: i64,
///     body: String,
///     pinned: bool,
/// }
///
/// entity!(Note { key: note_id, body, pinned });
/// ```
#[macro_export]
macro_rules! entity {
    ($ty:ident { key: $key:ident $(, $field:ident)* $(,)? }) => {
        impl $crate::Entity for $ty {
            const NAME: &'static str = stringify!($ty);
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            fn values(&self) -> ::std::vec::Vec<$crate::Value> {
                ::std::vec![$($crate::Value::from(::std::clone::Clone::clone(&self.$field))),*]
            }

            fn from_record(record: &$crate::Record) -> $crate::Result<Self> {
                ::std::result::Result::Ok(Self {
                    $key: record.get_or_default(concat!(stringify!($ty), "Id"))?,
                    $($field: record.get_or_default(stringify!($field))?,)*
                })
            }
        }
    };
}
