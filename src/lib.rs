//! # rest-crud-sql
//!
//! Schema-driven SQL statement synthesis for REST-style CRUD.
//!
//! A declarative JSON schema is flattened into a column model once; list,
//! count, show, create, update and delete requests are then compiled into
//! dialect-specific SQL with bound parameters, and handed to an
//! [`Executor`](executor::Executor).
//!
//! ## Features
//!
//! - **Schema Flattening**: nested `object` properties become `parent___child` columns
//! - **Four Dialects**: PostgreSQL, MySQL, SQL Server and Oracle pagination, quoting and DDL
//! - **Bound Parameters**: values are bound through placeholders, with an escaped-literal fallback
//! - **Structured Filters**: equality, comparison, IN, LIKE and `$and`/`$or`/`$not` composition
//! - **Lenient or Strict**: unknown field names are dropped by default, or rejected on request
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rest_crud_sql::{CrudConfig, Dialect, Filter, ListOptions, PgExecutor, Record, Table};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = PgExecutor::connect("postgres://localhost/mydb").await?;
//!
//!     let schema = serde_json::json!({
//!         "type": "object",
//!         "properties": {
//!             "name": { "type": "string" },
//!             "email": { "type": "string", "unique": true },
//!             "salary": { "type": "number" },
//!             "address": {
//!                 "type": "object",
//!                 "properties": { "city": { "type": "string" } },
//!                 "required": []
//!             }
//!         },
//!         "required": ["name"]
//!     });
//!
//!     let table = Table::new("employee", &schema, CrudConfig::builder(Dialect::Postgres).build())?;
//!     table.create_table(&executor).await?;
//!
//!     // Create a row; `_id` is generated
//!     let row = table
//!         .create(
//!             &executor,
//!             Record::new()
//!                 .with("name", "Kavi")
//!                 .with("address.city", "Pune"),
//!         )
//!         .await?;
//!     println!("created {}", row["_id"]);
//!
//!     // Page through rows living in Pune, newest ids first
//!     let rows = table
//!         .list(
//!             &executor,
//!             &ListOptions::new()
//!                 .select("name,address.city")
//!                 .sort("-_id")
//!                 .filter(Filter::parse(r#"{"address":{"city":"Pune"}}"#)?)
//!                 .count(10),
//!         )
//!         .await?;
//!     println!("{} rows", rows.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use rest_crud_sql::{CrudConfig, DefaultSort, Dialect};
//!
//! let config = CrudConfig::builder(Dialect::MsSql)
//!     .default_count(50)        // Page size when none is requested (default 30)
//!     .strict_fields(true)      // Reject unknown field names
//!     .inline_literals(false)   // Bind values (default)
//!     .default_sort(DefaultSort::PrimaryKeyAsc)
//!     .build();
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod id;
pub mod record;
pub mod schema;
pub mod sql;
pub mod table;
pub mod types;

// Re-export main types for convenience
pub use config::{CrudConfig, CrudConfigBuilder, DefaultSort};
pub use error::{CrudError, Result};
pub use executor::{Executor, MySqlExecutor, PgExecutor, Row, run_sql};
pub use id::IdGenerator;
pub use record::{Filter, ListOptions, ListQuery, ListResponse, Record, filter_helpers};
pub use schema::{FLATTEN_SEPARATOR, FieldRegistry, PRIMARY_KEY};
pub use table::Table;
pub use types::{FieldDescriptor, SqlType};

// Re-export SQL utilities for advanced users
pub use sql::dialect::{Dialect, DialectAdapter};
pub use sql::statement::{SqlValue, Statement};
