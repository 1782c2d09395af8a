//! MySQL / MariaDB executor backed by an sqlx pool

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, MySqlPool, Row as SqlxRow, TypeInfo};

use super::{ColumnKind, Executor, Row, bytes_value, float_value};
use crate::error::{CrudError, Result};
use crate::sql::statement::{SqlValue, Statement};

/// Executes statements on a MySQL pool
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(|e| CrudError::execution(format!("Database connection failed: {}", e)))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    fn bind_value<'q>(
        query: Query<'q, MySql, MySqlArguments>,
        value: &'q SqlValue,
    ) -> Query<'q, MySql, MySqlArguments> {
        match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Double(f) => query.bind(*f),
            SqlValue::Boolean(b) => query.bind(*b),
        }
    }

    fn query(statement: &Statement) -> Query<'_, MySql, MySqlArguments> {
        statement
            .params
            .iter()
            .fold(sqlx::query(&statement.sql), Self::bind_value)
    }

    fn convert_row(mysql_row: &MySqlRow) -> Row {
        let mut row = Row::new();
        for column in mysql_row.columns() {
            let name = column.name();
            let kind = Self::column_kind(column.type_info().name());
            row.insert(name.to_string(), Self::column_value(mysql_row, name, kind));
        }
        row
    }

    /// `TINYINT(1)` reports itself as `BOOLEAN`; every other integer width is
    /// read as a number.
    fn column_kind(type_name: &str) -> ColumnKind {
        if type_name.ends_with(" UNSIGNED") {
            return ColumnKind::Unsigned;
        }
        match type_name {
            "BOOLEAN" => ColumnKind::Boolean,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => ColumnKind::BigInt,
            "FLOAT" => ColumnKind::Real,
            "DOUBLE" => ColumnKind::Double,
            "DECIMAL" => ColumnKind::Decimal,
            "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM"
            | "SET" => ColumnKind::Text,
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                ColumnKind::Bytes
            }
            "DATETIME" => ColumnKind::Timestamp,
            "TIMESTAMP" => ColumnKind::TimestampTz,
            "DATE" => ColumnKind::Date,
            "JSON" => ColumnKind::Json,
            _ => ColumnKind::Other,
        }
    }

    /// Decode one column by its kind; a NULL of any type yields `Value::Null`
    fn column_value(mysql_row: &MySqlRow, name: &str, kind: ColumnKind) -> Value {
        let value = match kind {
            ColumnKind::Boolean => mysql_row
                .try_get::<Option<bool>, _>(name)
                .map(|v| v.map(Value::Bool)),
            ColumnKind::SmallInt | ColumnKind::Int | ColumnKind::BigInt => mysql_row
                .try_get::<Option<i64>, _>(name)
                .map(|v| v.map(Value::from)),
            ColumnKind::Unsigned => mysql_row
                .try_get::<Option<u64>, _>(name)
                .map(|v| v.map(Value::from)),
            ColumnKind::Real => mysql_row
                .try_get::<Option<f32>, _>(name)
                .map(|v| v.map(|f| float_value(f64::from(f)))),
            ColumnKind::Double => mysql_row
                .try_get::<Option<f64>, _>(name)
                .map(|v| v.map(float_value)),
            ColumnKind::Decimal => mysql_row
                .try_get::<Option<rust_decimal::Decimal>, _>(name)
                .map(|v| v.and_then(|d| d.to_f64()).map(float_value)),
            ColumnKind::Bytes => mysql_row
                .try_get::<Option<Vec<u8>>, _>(name)
                .map(|v| v.map(bytes_value)),
            ColumnKind::Timestamp => mysql_row
                .try_get::<Option<chrono::NaiveDateTime>, _>(name)
                .map(|v| v.map(|t| Value::String(t.and_utc().to_rfc3339()))),
            ColumnKind::TimestampTz => mysql_row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)
                .map(|v| v.map(|t| Value::String(t.to_rfc3339()))),
            ColumnKind::Date => mysql_row
                .try_get::<Option<chrono::NaiveDate>, _>(name)
                .map(|v| v.map(|d| Value::String(d.to_string()))),
            ColumnKind::Json => mysql_row.try_get::<Option<Value>, _>(name),
            ColumnKind::Text | ColumnKind::Other => mysql_row
                .try_get::<Option<String>, _>(name)
                .map(|v| v.map(Value::String))
                // Binary collation text comes back as bytes
                .or_else(|_| {
                    mysql_row
                        .try_get::<Option<Vec<u8>>, _>(name)
                        .map(|v| v.map(bytes_value))
                }),
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
impl Executor for MySqlExecutor {
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>> {
        let rows = Self::query(statement).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::convert_row).collect())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let result = Self::query(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
