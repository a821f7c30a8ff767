//! Identifier validation.
//!
//! Table and column names are spliced into statement text, so they are
//! restricted to plain identifiers before they ever reach SQL. Values never
//! go through here; they are always bound as parameters.
//!
//! # Examples
//!
//! ```
//! use stowage_core::{quote_identifier, validate_identifier};
//!
//! assert!(validate_identifier("WidgetId").is_ok());
//! assert!(validate_identifier("drop;--").is_err());
//! assert_eq!(quote_identifier("Widget"), "\"Widget\"");
//! ```

use crate::error::{CoreError, Result};

/// Validates that `name` is a plain SQL identifier.
///
/// The first character must be an ASCII letter or underscore; the rest may
/// also contain ASCII digits.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(CoreError::InvalidIdentifier(name.to_string()));
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(CoreError::InvalidIdentifier(name.to_string()));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Wraps an identifier in double quotes, doubling any embedded quote.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
