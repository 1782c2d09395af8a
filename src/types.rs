//! Core type definitions
//!
//! Includes the closed set of column types and the flattened field descriptor
//! produced by the [`FieldRegistry`](crate::schema::FieldRegistry).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sql::statement::SqlValue;

/// Default length of a `Text` column when the schema gives no `maxLength`
pub const DEFAULT_TEXT_LENGTH: u32 = 64;

/// Column type, resolved once when the registry is built
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    /// Variable-length text (schema `string`)
    Text,
    /// 64-bit integer (schema `integer`)
    Number,
    /// Double precision float (schema `number`)
    Double,
    /// Boolean (schema `boolean`)
    Boolean,
    /// Unbounded text (schema `string` with `format: binary`)
    Blob,
}

impl SqlType {
    /// Whether values of this type are stored as codec-escaped text
    pub fn is_textual(&self) -> bool {
        matches!(self, SqlType::Text | SqlType::Blob)
    }

    /// Coerce a JSON value into a typed SQL value for this column
    ///
    /// Strings are accepted for numeric and boolean columns, since query
    /// strings and CSV-style payloads carry everything as text.
    pub fn coerce(&self, key: &str, value: &Value) -> Result<SqlValue, String> {
        if value.is_null() {
            return Ok(SqlValue::Null);
        }

        match (self, value) {
            (SqlType::Text | SqlType::Blob, Value::String(s)) => Ok(SqlValue::Text(s.clone())),
            (SqlType::Text | SqlType::Blob, Value::Number(n)) => Ok(SqlValue::Text(n.to_string())),
            (SqlType::Text | SqlType::Blob, Value::Bool(b)) => Ok(SqlValue::Text(b.to_string())),

            (SqlType::Number, Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(SqlValue::Integer)
                .ok_or_else(|| format!("Cannot convert '{}' to integer for '{}'", n, key)),
            (SqlType::Number, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(SqlValue::Integer)
                .map_err(|_| format!("Cannot convert '{}' to integer for '{}'", s, key)),

            (SqlType::Double, Value::Number(n)) => n
                .as_f64()
                .map(SqlValue::Double)
                .ok_or_else(|| format!("Cannot convert '{}' to number for '{}'", n, key)),
            (SqlType::Double, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(SqlValue::Double)
                .ok_or_else(|| format!("Cannot convert '{}' to number for '{}'", s, key)),

            (SqlType::Boolean, Value::Bool(b)) => Ok(SqlValue::Boolean(*b)),
            (SqlType::Boolean, Value::Number(n)) => match n.as_i64() {
                Some(0) => Ok(SqlValue::Boolean(false)),
                Some(1) => Ok(SqlValue::Boolean(true)),
                _ => Err(format!("Cannot convert '{}' to boolean for '{}'", n, key)),
            },
            (SqlType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(SqlValue::Boolean(true)),
                "false" | "0" | "no" => Ok(SqlValue::Boolean(false)),
                _ => Err(format!("Cannot convert '{}' to boolean for '{}'", s, key)),
            },

            _ => Err(format!(
                "Type mismatch for '{}': expected {:?}, got {}",
                key, self, value
            )),
        }
    }
}

/// One flattened column derived from the declarative schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDescriptor {
    /// Flattened column name (`address___city`)
    pub key: String,
    /// Dotted path in the original schema (`address.city`)
    #[serde(rename = "sourcePath")]
    pub source_path: String,
    #[serde(rename = "sqlType")]
    pub sql_type: SqlType,
    #[serde(rename = "isPrimaryKey")]
    pub is_primary_key: bool,
    #[serde(rename = "isUnique")]
    pub is_unique: bool,
    #[serde(rename = "isRequired")]
    pub is_required: bool,
    /// Declared `maxLength` for text columns
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl FieldDescriptor {
    /// Create a plain (non-key, optional) field
    pub fn new(key: impl Into<String>, source_path: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            key: key.into(),
            source_path: source_path.into(),
            sql_type,
            is_primary_key: false,
            is_unique: false,
            is_required: false,
            max_length: None,
        }
    }

    /// The implicit `_id` primary key
    pub fn primary_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            source_path: key.clone(),
            key,
            sql_type: SqlType::Text,
            is_primary_key: true,
            is_unique: false,
            is_required: false,
            max_length: None,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.is_unique = unique;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.is_required = required;
        self
    }

    pub fn max_length(mut self, max_length: Option<u32>) -> Self {
        self.max_length = max_length;
        self
    }

    /// Length used for the column's DDL type
    pub fn text_length(&self) -> u32 {
        self.max_length.unwrap_or(DEFAULT_TEXT_LENGTH)
    }

    /// Coerce a value for this column, mapping failures to validation errors
    pub fn coerce(&self, value: &Value) -> crate::error::Result<SqlValue> {
        self.sql_type
            .coerce(&self.key, value)
            .map_err(crate::error::CrudError::validation)
    }
}
