//! SQL dialect adapters
//!
//! A dialect decides two things: how a page of rows is requested and how
//! values are written into SQL text (placeholders, literals, identifiers,
//! column types). Everything else about a statement is shared.
//!
//! A new dialect only has to supply [`DialectAdapter::name`],
//! [`DialectAdapter::pagination`] and [`DialectAdapter::quote_text`]; the
//! remaining methods default to the ANSI forms. Identifiers are always
//! quoted, so property names such as `user` or `order` need no special
//! treatment.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sql::statement::SqlValue;
use crate::types::{FieldDescriptor, SqlType};

/// Per-dialect SQL text rules
pub trait DialectAdapter: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Fragment requesting `limit` rows after skipping `offset`
    fn pagination(&self, limit: u64, offset: u64) -> String;

    /// Quote a text literal
    fn quote_text(&self, text: &str) -> String;

    /// Reverse [`DialectAdapter::quote_text`]; `None` unless `literal` is a
    /// complete, well-formed literal
    fn unquote_text(&self, literal: &str) -> Option<String> {
        unquote_doubled(literal)
    }

    /// Placeholder for the 1-based `index`-th bound value
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Whether statements may carry bound values at all
    fn supports_bind_parameters(&self) -> bool {
        true
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value { "TRUE" } else { "FALSE" }
    }

    /// Write an identifier (already validated) into SQL text
    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Write a validated table name, quoting each part of `schema.table`
    fn quote_table(&self, table: &str) -> String {
        table
            .split('.')
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// ORDER BY term for a page requested without any sort
    ///
    /// Only needed where the pagination grammar cannot stand alone.
    fn pagination_order(&self) -> Option<&'static str> {
        None
    }

    /// DDL type for a column
    fn column_type(&self, field: &FieldDescriptor) -> String {
        match field.sql_type {
            SqlType::Text => format!("VARCHAR({})", field.text_length()),
            SqlType::Number => "BIGINT".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Blob => "TEXT".to_string(),
        }
    }

    /// Wrap a column list into an idempotent CREATE TABLE
    fn create_table(&self, table: &str, columns: &str) -> String {
        format!("CREATE TABLE IF NOT EXISTS {} ({})", table, columns)
    }

    /// Write a typed value as a literal
    fn literal(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Text(text) => self.quote_text(text),
            SqlValue::Integer(n) => n.to_string(),
            SqlValue::Double(f) if f.is_finite() => f.to_string(),
            SqlValue::Double(_) => "NULL".to_string(),
            SqlValue::Boolean(b) => self.boolean_literal(*b).to_string(),
        }
    }
}

fn double_single_quotes(text: &str) -> String {
    text.replace('\'', "''")
}

/// Unwrap `'...'` where every inner quote is doubled
fn unquote_doubled(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\'' && chars.next() != Some('\'') {
            return None;
        }
        out.push(c);
    }
    Some(out)
}

// ============================================================================
// LIMIT / OFFSET family
// ============================================================================

/// PostgreSQL
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl DialectAdapter for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn pagination(&self, limit: u64, offset: u64) -> String {
        format!("LIMIT {} OFFSET {}", limit, offset)
    }

    fn quote_text(&self, text: &str) -> String {
        format!("'{}'", double_single_quotes(text))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}

/// MySQL / MariaDB
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl DialectAdapter for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn pagination(&self, limit: u64, offset: u64) -> String {
        format!("LIMIT {} OFFSET {}", limit, offset)
    }

    fn quote_text(&self, text: &str) -> String {
        // Backslash is an escape character inside MySQL string literals
        let mut out = String::with_capacity(text.len() + 2);
        out.push('\'');
        for c in text.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("''"),
                '\0' => out.push_str("\\0"),
                '\u{1a}' => out.push_str("\\Z"),
                other => out.push(other),
            }
        }
        out.push('\'');
        out
    }

    fn unquote_text(&self, literal: &str) -> Option<String> {
        let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.push(match chars.next()? {
                    '0' => '\0',
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    'Z' => '\u{1a}',
                    other => other,
                }),
                '\'' => {
                    if chars.next()? != '\'' {
                        return None;
                    }
                    out.push('\'');
                }
                other => out.push(other),
            }
        }
        Some(out)
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("`{}`", identifier.replace('`', "``"))
    }

    fn column_type(&self, field: &FieldDescriptor) -> String {
        match field.sql_type {
            SqlType::Text => format!("VARCHAR({})", field.text_length()),
            SqlType::Number => "BIGINT".to_string(),
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Blob => "LONGTEXT".to_string(),
        }
    }
}

// ============================================================================
// OFFSET / FETCH family
// ============================================================================

/// Microsoft SQL Server
#[derive(Debug, Clone, Copy, Default)]
pub struct MsSqlDialect;

impl DialectAdapter for MsSqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn pagination(&self, limit: u64, offset: u64) -> String {
        format!("OFFSET {} ROWS FETCH FIRST {} ROWS ONLY", offset, limit)
    }

    fn quote_text(&self, text: &str) -> String {
        format!("N'{}'", double_single_quotes(text))
    }

    fn unquote_text(&self, literal: &str) -> Option<String> {
        unquote_doubled(literal.strip_prefix('N').unwrap_or(literal))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{}", index)
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("[{}]", identifier.replace(']', "]]"))
    }

    fn pagination_order(&self) -> Option<&'static str> {
        // OFFSET/FETCH is part of ORDER BY in T-SQL
        Some("(SELECT NULL)")
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    fn column_type(&self, field: &FieldDescriptor) -> String {
        match field.sql_type {
            SqlType::Text => format!("NVARCHAR({})", field.text_length()),
            SqlType::Number => "BIGINT".to_string(),
            SqlType::Double => "FLOAT".to_string(),
            SqlType::Boolean => "BIT".to_string(),
            SqlType::Blob => "NVARCHAR(MAX)".to_string(),
        }
    }

    fn create_table(&self, table: &str, columns: &str) -> String {
        format!(
            "IF OBJECT_ID(N'{}', N'U') IS NULL CREATE TABLE {} ({})",
            double_single_quotes(table),
            table,
            columns
        )
    }
}

/// Oracle Database
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl DialectAdapter for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn pagination(&self, limit: u64, offset: u64) -> String {
        format!("OFFSET {} ROWS FETCH FIRST {} ROWS ONLY", offset, limit)
    }

    fn quote_text(&self, text: &str) -> String {
        format!("'{}'", double_single_quotes(text))
    }

    fn placeholder(&self, index: usize) -> String {
        format!(":{}", index)
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    fn column_type(&self, field: &FieldDescriptor) -> String {
        match field.sql_type {
            SqlType::Text => format!("VARCHAR2({})", field.text_length()),
            SqlType::Number => "NUMBER(19)".to_string(),
            SqlType::Double => "BINARY_DOUBLE".to_string(),
            SqlType::Boolean => "NUMBER(1)".to_string(),
            SqlType::Blob => "CLOB".to_string(),
        }
    }

    fn create_table(&self, table: &str, columns: &str) -> String {
        format!("CREATE TABLE {} ({})", table, columns)
    }
}

// ============================================================================
// Dialect selector
// ============================================================================

/// Built-in dialects, selectable from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "sqlserver")]
    MsSql,
    #[serde(alias = "oracledb")]
    Oracle,
}

impl Dialect {
    pub fn adapter(self) -> &'static dyn DialectAdapter {
        match self {
            Dialect::Postgres => &PostgresDialect,
            Dialect::MySql => &MySqlDialect,
            Dialect::MsSql => &MsSqlDialect,
            Dialect::Oracle => &OracleDialect,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.adapter().name())
    }
}
