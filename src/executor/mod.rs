//! Statement execution
//!
//! The [`Executor`] trait is the only way assembled statements reach a
//! database. Pools, transactions and retries belong to the implementation;
//! the synthesis side only hands over SQL text plus bound values.

use async_trait::async_trait;
use serde_json::{Map, Number, Value};

use crate::error::Result;
use crate::sql::codec::decode_rows;
use crate::sql::dialect::Dialect;
use crate::sql::statement::Statement;

mod mysql;
mod postgres;

pub use mysql::MySqlExecutor;
pub use postgres::PgExecutor;

/// One result row, keyed by column name in select order
pub type Row = Map<String, Value>;

/// Runs assembled statements
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a statement that returns rows
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Run a statement that does not return rows; yields rows affected
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    /// Dialect whose quoted string literals the driver returns verbatim
    ///
    /// Rows from such a driver are decoded before they are handed out.
    /// Drivers that return plain column values keep the default.
    fn text_literals(&self) -> Option<Dialect> {
        None
    }
}

/// Decode rows according to the executor's text handling
pub(crate) fn decode_for<E>(executor: &E, rows: Vec<Row>) -> Vec<Row>
where
    E: Executor + ?Sized,
{
    match executor.text_literals() {
        Some(dialect) => decode_rows(rows, dialect.adapter()),
        None => rows,
    }
}

/// Run raw SQL with no bound values and decode the returned text
pub async fn run_sql<E>(executor: &E, sql: &str) -> Result<Vec<Row>>
where
    E: Executor + ?Sized,
{
    tracing::debug!(sql, "running raw statement");
    let rows = executor.fetch_all(&Statement::raw(sql)).await?;
    Ok(decode_for(executor, rows))
}

/// How a result column is read back into JSON, from its database type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    SmallInt,
    Int,
    BigInt,
    Unsigned,
    Real,
    Double,
    Decimal,
    Text,
    Bytes,
    Timestamp,
    TimestampTz,
    Date,
    Json,
    Other,
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn bytes_value(bytes: Vec<u8>) -> Value {
    Value::String(String::from_utf8_lossy(&bytes).into_owned())
}
