//! Loosely typed column values and rows.
//!
//! [`Value`] mirrors SQLite's five storage classes. [`Record`] is an ordered
//! row of named values, used both as the raw-query result type and as the
//! intermediate form entities are decoded from.
//!
//! Column lookups on a [`Record`] are ASCII case-insensitive, matching how
//! SQLite itself resolves identifiers: a field named `color` reads the
//! `Color` column.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{CoreError, Result};

/// A single column value.
///
/// # Examples
///
/// ```
/// use stowage_core::Value;
///
/// assert_eq!(Value::from(42), Value::Integer(42));
/// assert_eq!(Value::from("red"), Value::Text("red".into()));
/// assert_eq!(Value::from(None::<String>), Value::Null);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the storage class name, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn mismatch(&self, expected: &'static str) -> CoreError {
        CoreError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion from a stored [`Value`] into a field type.
pub trait FromValue: Sized {
    /// Decodes `value`, failing with [`CoreError::TypeMismatch`] or
    /// [`CoreError::OutOfRange`].
    fn from_value(value: &Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(*v),
            other => Err(other.mismatch("integer")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        let v = i64::from_value(value)?;
        i32::try_from(v).map_err(|_| CoreError::OutOfRange {
            value: v,
            target: "i32",
        })
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Result<Self> {
        let v = i64::from_value(value)?;
        u32::try_from(v).map_err(|_| CoreError::OutOfRange {
            value: v,
            target: "u32",
        })
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(i64::from_value(value)? != 0)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            other => Err(other.mismatch("real")),
        }
    }
}

/// Numbers are accepted as well: a column with NUMERIC affinity stores
/// numeric-looking text as an integer or real.
impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v.clone()),
            Value::Integer(v) => Ok(v.to_string()),
            Value::Real(v) => Ok(v.to_string()),
            other => Err(other.mismatch("text")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v.clone()),
            other => Err(other.mismatch("blob")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// An ordered row of named column values.
///
/// # Examples
///
/// ```
/// use stowage_core::{Record, Value};
///
/// let mut row = Record::new();
/// row.push("WidgetId", Value::Integer(7));
/// row.push("Color", Value::from("red"));
///
/// let id: i64 = row.get("widgetid").unwrap();
/// assert_eq!(id, 7);
/// let size: Option<i64> = row.get_or_default("Size").unwrap();
/// assert_eq!(size, None);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column.
    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push(column.into());
        self.values.push(value);
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in select order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    /// `(column, value)` pairs in select order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    /// Looks up a column by name, ignoring ASCII case.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|i| &self.values[i])
    }

    /// Decodes a column that must be present.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self
            .value(column)
            .ok_or_else(|| CoreError::MissingColumn(column.to_string()))?;
        decode(column, value)
    }

    /// Decodes a column, falling back to `T::default()` when it was not
    /// selected.
    ///
    /// Used when reading a column subset: unselected fields come back with
    /// their default value.
    pub fn get_or_default<T: FromValue + Default>(&self, column: &str) -> Result<T> {
        match self.value(column) {
            Some(value) => decode(column, value),
            None => Ok(T::default()),
        }
    }
}

fn decode<T: FromValue>(column: &str, value: &Value) -> Result<T> {
    T::from_value(value).map_err(|e| CoreError::Column {
        column: column.to_string(),
        source: Box::new(e),
    })
}

impl<C: Into<String>> FromIterator<(C, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (C, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.push(column, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_option_maps_none_to_null() {
        assert_eq!(Value::from(Some(3_i64)), Value::Integer(3));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(true), Value::Integer(1));
    }

    #[test]
    fn test_from_value_type_mismatch() {
        let err = i64::from_value(&Value::Text("x".into())).unwrap_err();
        assert_eq!(
            err,
            CoreError::TypeMismatch {
                expected: "integer",
                found: "text"
            }
        );
    }

    #[test]
    fn test_from_value_out_of_range() {
        let err = u32::from_value(&Value::Integer(-1)).unwrap_err();
        assert_eq!(
            err,
            CoreError::OutOfRange {
                value: -1,
                target: "u32"
            }
        );
    }

    #[test]
    fn test_real_accepts_integer_storage() {
        assert_eq!(f64::from_value(&Value::Integer(2)).unwrap(), 2.0);
    }

    #[test]
    fn test_text_accepts_numeric_storage() {
        assert_eq!(String::from_value(&Value::Integer(42)).unwrap(), "42");
        assert_eq!(String::from_value(&Value::Real(4.5)).unwrap(), "4.5");
        assert_eq!(
            String::from_value(&Value::Blob(vec![1])).unwrap_err(),
            CoreError::TypeMismatch {
                expected: "text",
                found: "blob"
            }
        );
    }

    #[test]
    fn test_value_serializes_untagged() {
        let values = vec![
            Value::Null,
            Value::Integer(3),
            Value::Real(1.5),
            Value::from("red"),
            Value::Blob(vec![1, 2]),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,3,1.5,"red",[1,2]]"#);
    }

    #[test]
    fn test_option_decodes_null() {
        let v: Option<String> = Option::from_value(&Value::Null).unwrap();
        assert_eq!(v, None);
        let v: Option<String> = Option::from_value(&Value::from("a")).unwrap();
        assert_eq!(v.as_deref(), Some("a"));
    }

    #[test]
    fn test_record_lookup_ignores_case() {
        let record: Record = [("Color", Value::from("blue"))].into_iter().collect();
        let color: String = record.get("color").unwrap();
        assert_eq!(color, "blue");
        assert!(record.value("COLOR").is_some());
    }

    #[test]
    fn test_record_get_missing_column() {
        let record = Record::new();
        assert_eq!(
            record.get::<i64>("Id").unwrap_err(),
            CoreError::MissingColumn("Id".into())
        );
        assert_eq!(record.get_or_default::<i64>("Id").unwrap(), 0);
    }

    #[test]
    fn test_record_get_wraps_column_name() {
        let record: Record = [("Size", Value::from("big"))].into_iter().collect();
        let err = record.get::<i64>("Size").unwrap_err();
        assert!(matches!(err, CoreError::Column { ref column, .. } if column == "Size"));
    }

    #[test]
    fn test_record_serializes_as_ordered_map() {
        let record: Record = [
            ("Id", Value::Integer(1)),
            ("Name", Value::from("bolt")),
            ("Weight", Value::Null),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Id":1,"Name":"bolt","Weight":null}"#);
    }
}
