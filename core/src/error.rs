//! Error types for values, records, and entity metadata.

use thiserror::Error;

/// Errors raised while describing entities or decoding column values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A table or column name is not a plain SQL identifier.
    #[error("invalid identifier '{0}': must start with a letter or underscore and contain only ASCII alphanumerics and underscores")]
    InvalidIdentifier(String),

    /// An entity declares the same column twice.
    #[error("duplicate column '{column}' on entity {entity}")]
    DuplicateColumn { entity: String, column: String },

    /// A stored value has a different type than the field expects.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An integer does not fit the target field type.
    #[error("integer {value} out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },

    /// A required column is absent from a record.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// Decoding a specific column failed.
    #[error("column '{column}': {source}")]
    Column {
        column: String,
        #[source]
        source: Box<CoreError>,
    },
}

/// Convenience alias for results with [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
