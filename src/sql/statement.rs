//! Assembled statements and bound values

use std::fmt;

use serde::Serialize;

use crate::sql::dialect::DialectAdapter;

/// A typed value bound to a statement placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Text(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
}

/// SQL text plus the values bound to its placeholders, in placeholder order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A statement with no bound values
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Collects values while clauses are built
///
/// Each pushed value becomes either a dialect placeholder (and is kept for
/// binding) or, in inline mode, an escaped literal written into the SQL text.
pub struct ParamSink<'d> {
    dialect: &'d dyn DialectAdapter,
    inline: bool,
    params: Vec<SqlValue>,
}

impl<'d> ParamSink<'d> {
    pub fn new(dialect: &'d dyn DialectAdapter, inline: bool) -> Self {
        Self {
            dialect,
            inline: inline || !dialect.supports_bind_parameters(),
            params: Vec::new(),
        }
    }

    pub fn dialect(&self) -> &'d dyn DialectAdapter {
        self.dialect
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    /// Register a value and return the SQL text that stands for it
    pub fn push(&mut self, value: SqlValue) -> String {
        // NULL is never bound: an untyped bound NULL trips type inference on
        // some servers.
        if self.inline || value == SqlValue::Null {
            return self.dialect.literal(&value);
        }
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Attach the collected values to the finished SQL text
    pub fn finish(self, sql: impl Into<String>) -> Statement {
        Statement::new(sql, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::{MsSqlDialect, MySqlDialect, PostgresDialect};

    #[test]
    fn test_postgres_placeholders_are_numbered() {
        let mut sink = ParamSink::new(&PostgresDialect, false);
        assert_eq!(sink.push(SqlValue::Text("a".into())), "$1");
        assert_eq!(sink.push(SqlValue::Integer(2)), "$2");
        let stmt = sink.finish("SELECT 1");
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_mysql_placeholders_are_positional() {
        let mut sink = ParamSink::new(&MySqlDialect, false);
        assert_eq!(sink.push(SqlValue::Double(1.5)), "?");
        assert_eq!(sink.push(SqlValue::Boolean(true)), "?");
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_mssql_placeholders() {
        let mut sink = ParamSink::new(&MsSqlDialect, false);
        assert_eq!(sink.push(SqlValue::Integer(1)), "@p1");
        assert_eq!(sink.push(SqlValue::Integer(2)), "@p2");
    }

    #[test]
    fn test_inline_mode_writes_literals() {
        let mut sink = ParamSink::new(&PostgresDialect, true);
        assert_eq!(sink.push(SqlValue::Text("it's".into())), "'it''s'");
        assert_eq!(sink.push(SqlValue::Integer(30)), "30");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_null_is_never_bound() {
        let mut sink = ParamSink::new(&PostgresDialect, false);
        assert_eq!(sink.push(SqlValue::Null), "NULL");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_statement_display() {
        let stmt = Statement::raw("SELECT 1 + 1 AS solution");
        assert_eq!(stmt.to_string(), "SELECT 1 + 1 AS solution");
        assert!(stmt.params.is_empty());
    }
}
