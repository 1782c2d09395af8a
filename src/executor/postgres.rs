//! PostgreSQL executor backed by an sqlx pool

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as SqlxRow, TypeInfo};

use super::{ColumnKind, Executor, Row, bytes_value, float_value};
use crate::error::{CrudError, Result};
use crate::sql::statement::{SqlValue, Statement};

/// Executes statements on a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| CrudError::execution(format!("Database connection failed: {}", e)))?;
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn bind_value<'q>(
        query: Query<'q, Postgres, PgArguments>,
        value: &'q SqlValue,
    ) -> Query<'q, Postgres, PgArguments> {
        match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Double(f) => query.bind(*f),
            SqlValue::Boolean(b) => query.bind(*b),
        }
    }

    fn query(statement: &Statement) -> Query<'_, Postgres, PgArguments> {
        statement
            .params
            .iter()
            .fold(sqlx::query(&statement.sql), Self::bind_value)
    }

    fn convert_row(pg_row: &PgRow) -> Row {
        let mut row = Row::new();
        for column in pg_row.columns() {
            let name = column.name();
            let kind = Self::column_kind(column.type_info().name());
            row.insert(name.to_string(), Self::column_value(pg_row, name, kind));
        }
        row
    }

    fn column_kind(type_name: &str) -> ColumnKind {
        match type_name {
            "BOOL" => ColumnKind::Boolean,
            "INT2" => ColumnKind::SmallInt,
            "INT4" => ColumnKind::Int,
            "INT8" => ColumnKind::BigInt,
            "FLOAT4" => ColumnKind::Real,
            "FLOAT8" => ColumnKind::Double,
            "NUMERIC" => ColumnKind::Decimal,
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => ColumnKind::Text,
            "BYTEA" => ColumnKind::Bytes,
            "TIMESTAMP" => ColumnKind::Timestamp,
            "TIMESTAMPTZ" => ColumnKind::TimestampTz,
            "DATE" => ColumnKind::Date,
            "JSON" | "JSONB" => ColumnKind::Json,
            _ => ColumnKind::Other,
        }
    }

    /// Decode one column by its kind; a NULL of any type yields `Value::Null`
    fn column_value(pg_row: &PgRow, name: &str, kind: ColumnKind) -> Value {
        let value = match kind {
            ColumnKind::Boolean => pg_row
                .try_get::<Option<bool>, _>(name)
                .map(|v| v.map(Value::Bool)),
            ColumnKind::SmallInt => pg_row
                .try_get::<Option<i16>, _>(name)
                .map(|v| v.map(Value::from)),
            ColumnKind::Int => pg_row
                .try_get::<Option<i32>, _>(name)
                .map(|v| v.map(Value::from)),
            ColumnKind::BigInt | ColumnKind::Unsigned => pg_row
                .try_get::<Option<i64>, _>(name)
                .map(|v| v.map(Value::from)),
            ColumnKind::Real => pg_row
                .try_get::<Option<f32>, _>(name)
                .map(|v| v.map(|f| float_value(f64::from(f)))),
            ColumnKind::Double => pg_row
                .try_get::<Option<f64>, _>(name)
                .map(|v| v.map(float_value)),
            ColumnKind::Decimal => pg_row
                .try_get::<Option<rust_decimal::Decimal>, _>(name)
                .map(|v| v.and_then(|d| d.to_f64()).map(float_value)),
            ColumnKind::Bytes => pg_row
                .try_get::<Option<Vec<u8>>, _>(name)
                .map(|v| v.map(bytes_value)),
            ColumnKind::Timestamp => pg_row
                .try_get::<Option<chrono::NaiveDateTime>, _>(name)
                .map(|v| v.map(|t| Value::String(t.and_utc().to_rfc3339()))),
            ColumnKind::TimestampTz => pg_row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)
                .map(|v| v.map(|t| Value::String(t.to_rfc3339()))),
            ColumnKind::Date => pg_row
                .try_get::<Option<chrono::NaiveDate>, _>(name)
                .map(|v| v.map(|d| Value::String(d.to_string()))),
            ColumnKind::Json => pg_row.try_get::<Option<Value>, _>(name),
            ColumnKind::Text | ColumnKind::Other => pg_row
                .try_get::<Option<String>, _>(name)
                .map(|v| v.map(Value::String)),
        };
        match value {
            Ok(value) => value.unwrap_or(Value::Null),
            Err(e) => {
                tracing::trace!(column = name, error = %e, "column not decodable, returning null");
                Value::Null
            }
        }
    }
}

#[async_trait]
impl Executor for PgExecutor {
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>> {
        let rows = Self::query(statement).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::convert_row).collect())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let result = Self::query(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
