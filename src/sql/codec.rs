//! Literal codec
//!
//! Bound values reach the database untouched. Only the inline fallback
//! (dialects without bind parameters, or `inline_literals`) writes values
//! into SQL text, as quoted literals in the dialect's own escaping.
//!
//! Decoding reverses that quoting for drivers that hand string literals back
//! verbatim. It is best-effort: text that is not a complete, well-formed
//! literal of the dialect passes through unchanged.

use serde_json::Value;

use crate::error::Result;
use crate::executor::Row;
use crate::sql::dialect::DialectAdapter;
use crate::types::FieldDescriptor;

/// Quote text as a string literal of the dialect
pub fn encode_text(text: &str, dialect: &dyn DialectAdapter) -> String {
    dialect.quote_text(text)
}

/// Restore text from a string literal of the dialect
pub fn decode_text(text: &str, dialect: &dyn DialectAdapter) -> String {
    dialect
        .unquote_text(text)
        .unwrap_or_else(|| text.to_string())
}

/// Encode an application value into a literal for the given column
///
/// Text columns yield a quoted, escaped literal; numeric and boolean columns
/// yield their canonical unquoted form.
pub fn encode(
    field: &FieldDescriptor,
    value: &Value,
    dialect: &dyn DialectAdapter,
) -> Result<String> {
    let typed = field.coerce(value)?;
    Ok(dialect.literal(&typed))
}

/// Decode every text column of a row
pub fn decode_row(row: Row, dialect: &dyn DialectAdapter) -> Row {
    row.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => Value::String(decode_text(&text, dialect)),
                other => other,
            };
            (key, value)
        })
        .collect()
}

pub fn decode_rows(rows: Vec<Row>, dialect: &dyn DialectAdapter) -> Vec<Row> {
    rows.into_iter().map(|row| decode_row(row, dialect)).collect()
}
