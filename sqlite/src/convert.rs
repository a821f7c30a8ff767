//! Conversion between [`stowage_core`] values and SQLite types.
//!
//! Values cross into SQLite only as bound parameters; rows come back as
//! [`Record`]s keyed by the statement's column names.

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Row, ToSql};
use stowage_core::{Record, Value};

/// Borrowing adapter that binds a [`Value`] as a statement parameter.
pub(crate) struct Param<'a>(pub(crate) &'a Value);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

/// Wraps a slice of values for `rusqlite::params_from_iter`.
pub(crate) fn params(values: &[Value]) -> impl Iterator<Item = Param<'_>> {
    values.iter().map(Param)
}

/// Copies a borrowed SQLite value into an owned [`Value`].
///
/// Text that is not valid UTF-8 is decoded lossily.
pub(crate) fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

/// Reads every column of `row` into a [`Record`].
pub(crate) fn row_to_record(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (i, column) in columns.iter().enumerate() {
        record.push(column.clone(), from_value_ref(row.get_ref(i)?));
    }
    Ok(record)
}
