//! Table - statement assembly and CRUD operations for one schema-backed table
//!
//! A `Table` owns the flattened [`FieldRegistry`] of its schema and turns
//! requests into complete [`Statement`]s. Statement building is pure; the
//! async operations hand the statements to an [`Executor`] and decode what
//! comes back.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{Instrument, Span};

use crate::config::{CrudConfig, DefaultSort};
use crate::error::{CrudError, Result};
use crate::executor::{Executor, Row, decode_for};
use crate::id::IdGenerator;
use crate::record::{Filter, ListOptions, ListResponse, Record, split_list};
use crate::schema::{FieldRegistry, PRIMARY_KEY};
use crate::sql::clause::{
    FieldPolicy, build_id_list, build_id_values, build_insert, build_order_by, build_pagination,
    build_select, build_update, build_where,
};
use crate::sql::ddl::DdlGenerator;
use crate::sql::dialect::DialectAdapter;
use crate::sql::sanitize::validate_table_name;
use crate::sql::statement::{ParamSink, Statement};

/// Schema-backed table
///
/// Immutable once built, so one `Table` can serve concurrent requests.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    registry: FieldRegistry,
    config: CrudConfig,
    ids: IdGenerator,
    span: Span,
}

impl Table {
    /// Build a table from its name and declarative schema
    ///
    /// Fails when the name is not a valid identifier or the schema is
    /// malformed.
    pub fn new(name: impl Into<String>, schema: &Value, config: CrudConfig) -> Result<Self> {
        let name = name.into();
        validate_table_name(&name).map_err(CrudError::InvalidIdentifier)?;
        let registry = FieldRegistry::build(schema)?;
        let span = tracing::debug_span!("table", table = %name, dialect = %config.dialect);

        Ok(Self {
            name,
            registry,
            config,
            ids: IdGenerator::new(),
            span,
        })
    }

    /// Attach the span every operation of this table runs in
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CrudConfig {
        &self.config
    }

    fn dialect(&self) -> &'static dyn DialectAdapter {
        self.config.dialect.adapter()
    }

    fn policy(&self) -> FieldPolicy {
        self.config.field_policy()
    }

    fn sink(&self) -> ParamSink<'static> {
        ParamSink::new(self.dialect(), self.config.inline_literals)
    }

    fn table_ref(&self) -> String {
        self.dialect().quote_table(&self.name)
    }

    fn pk_column(&self) -> String {
        self.dialect().quote_identifier(PRIMARY_KEY)
    }

    // ========================================================================
    // Statement assembly
    // ========================================================================

    pub fn create_table_statement(&self) -> Statement {
        let ddl = DdlGenerator::new(self.dialect());
        Statement::raw(ddl.generate_create_table(&self.name, &self.registry))
    }

    /// `SELECT count(*) AS count FROM t [WHERE ...]`
    pub fn count_statement(&self, filter: &Filter) -> Result<Statement> {
        let mut sink = self.sink();
        let mut sql = format!("SELECT count(*) AS count FROM {}", self.table_ref());
        if let Some(predicate) = build_where(&self.registry, filter, self.policy(), &mut sink)? {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
        Ok(sink.finish(sql))
    }

    /// `SELECT cols FROM t [WHERE ...] [ORDER BY ...] [pagination]`
    pub fn list_statement(&self, options: &ListOptions) -> Result<Statement> {
        let dialect = self.dialect();
        let policy = self.policy();
        let mut sink = self.sink();

        let columns = build_select(&self.registry, dialect, &options.select, policy)?
            .unwrap_or_else(|| "*".to_string());
        let mut sql = format!("SELECT {} FROM {}", columns, self.table_ref());

        if let Some(predicate) = build_where(&self.registry, &options.filter, policy, &mut sink)? {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }

        let page = build_pagination(
            dialect,
            options.count,
            options.page,
            self.config.default_count,
        );

        let order = build_order_by(&self.registry, dialect, &options.sort, policy)?
            .or_else(|| match self.config.default_sort {
                DefaultSort::PrimaryKeyAsc => Some(format!("{} ASC", self.pk_column())),
                DefaultSort::Unspecified => None,
            })
            .or_else(|| {
                page.as_ref()
                    .and_then(|_| dialect.pagination_order())
                    .map(str::to_string)
            });
        if let Some(order) = order {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        if let Some(page) = page {
            sql.push(' ');
            sql.push_str(&page);
        }

        Ok(sink.finish(sql))
    }

    /// `SELECT cols FROM t WHERE _id = ?`
    pub fn show_statement<S: AsRef<str>>(&self, id: &str, select: &[S]) -> Result<Statement> {
        let id = id.trim();
        if id.is_empty() {
            return Err(CrudError::NoIdProvided);
        }
        let mut sink = self.sink();
        let columns = build_select(&self.registry, self.dialect(), select, self.policy())?
            .unwrap_or_else(|| "*".to_string());
        let typed = self.registry.primary_key().coerce(&Value::String(id.to_string()))?;
        let placeholder = sink.push(typed);
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            columns,
            self.table_ref(),
            self.pk_column(),
            placeholder
        );
        Ok(sink.finish(sql))
    }

    /// `INSERT INTO t (...) VALUES (...)[, (...)]`
    ///
    /// Given ids are trimmed; records without one (or with a blank one) get
    /// a generated id. Returns the statement and the ids of the records in
    /// input order.
    pub fn insert_statement(&self, records: &mut [Record]) -> Result<(Statement, Vec<String>)> {
        let mut ids = Vec::with_capacity(records.len());
        for record in records.iter_mut() {
            let id = record.id().unwrap_or_else(|| self.ids.generate());
            record.set_id(id.clone());
            ids.push(id);
        }

        let mut sink = self.sink();
        let values = build_insert(&self.registry, records, self.policy(), &mut sink)?;
        let sql = format!("INSERT INTO {} {}", self.table_ref(), values);
        Ok((sink.finish(sql), ids))
    }

    /// `SELECT * FROM t WHERE _id IN (...)`
    pub fn select_by_ids_statement<S: AsRef<str>>(&self, ids: &[S]) -> Result<Statement> {
        let mut sink = self.sink();
        let list = build_id_values(&self.registry, ids, &mut sink)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} IN ({})",
            self.table_ref(),
            self.pk_column(),
            list
        );
        Ok(sink.finish(sql))
    }

    /// `UPDATE t SET ... WHERE _id IN (...)` for comma-separated ids
    pub fn update_statement(&self, ids: &str, record: &Record) -> Result<Statement> {
        if split_list(ids).is_empty() {
            return Err(CrudError::NoIdProvided);
        }
        let mut sink = self.sink();
        let assignments = build_update(&self.registry, record, self.policy(), &mut sink)?;
        let list = build_id_list(&self.registry, ids, &mut sink)?;
        let sql = format!(
            "UPDATE {} SET {} WHERE {} IN ({})",
            self.table_ref(),
            assignments,
            self.pk_column(),
            list
        );
        Ok(sink.finish(sql))
    }

    /// `DELETE FROM t WHERE _id IN (...)` for comma-separated ids
    pub fn delete_statement(&self, ids: &str) -> Result<Statement> {
        let mut sink = self.sink();
        let list = build_id_list(&self.registry, ids, &mut sink)?;
        let sql = format!(
            "DELETE FROM {} WHERE {} IN ({})",
            self.table_ref(),
            self.pk_column(),
            list
        );
        Ok(sink.finish(sql))
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Create the table if it does not exist
    pub async fn create_table<E>(&self, executor: &E) -> Result<()>
    where
        E: Executor + ?Sized,
    {
        async {
            let statement = self.create_table_statement();
            tracing::debug!("creating table");
            tracing::trace!(sql = %statement.sql, "create table statement");
            executor.execute(&statement).await?;
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Number of rows matching a filter
    pub async fn count<E>(&self, executor: &E, filter: &Filter) -> Result<u64>
    where
        E: Executor + ?Sized,
    {
        async {
            let statement = self.count_statement(filter)?;
            trace_statement("count", &statement);
            let rows = executor.fetch_all(&statement).await?;
            let count = count_from_rows(&rows)?;
            tracing::debug!(count, "counted rows");
            Ok(count)
        }
        .instrument(self.span.clone())
        .await
    }

    /// One page of rows
    pub async fn list<E>(&self, executor: &E, options: &ListOptions) -> Result<Vec<Row>>
    where
        E: Executor + ?Sized,
    {
        async {
            let statement = self.list_statement(options)?;
            trace_statement("list", &statement);
            let rows = decode_for(executor, executor.fetch_all(&statement).await?);
            tracing::debug!(rows = rows.len(), "listed rows");
            Ok(rows)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Rows, or only their number when `count_only` is set
    pub async fn list_or_count<E>(
        &self,
        executor: &E,
        options: &ListOptions,
    ) -> Result<ListResponse>
    where
        E: Executor + ?Sized,
    {
        if options.count_only {
            return Ok(ListResponse::Count(self.count(executor, &options.filter).await?));
        }
        Ok(ListResponse::Rows(self.list(executor, options).await?))
    }

    /// A single row by primary key
    pub async fn show<E, S>(&self, executor: &E, id: &str, select: &[S]) -> Result<Option<Row>>
    where
        E: Executor + ?Sized,
        S: AsRef<str>,
    {
        let statement = self.show_statement(id, select)?;
        async {
            tracing::debug!(id, "fetching row");
            trace_statement("show", &statement);
            let rows = executor.fetch_all(&statement).await?;
            Ok(decode_for(executor, rows).into_iter().next())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Insert one record and return its stored form
    pub async fn create<E>(&self, executor: &E, record: Record) -> Result<Row>
    where
        E: Executor + ?Sized,
    {
        self.create_many(executor, vec![record])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CrudError::execution("inserted row was not found"))
    }

    /// Insert records in one statement and return their stored forms
    ///
    /// Rows are re-read by primary key and returned in input order. A row that
    /// cannot be re-read is an `Execution` error.
    pub async fn create_many<E>(&self, executor: &E, mut records: Vec<Record>) -> Result<Vec<Row>>
    where
        E: Executor + ?Sized,
    {
        async {
            let (insert, ids) = self.insert_statement(&mut records)?;
            tracing::debug!(records = ids.len(), "inserting rows");
            trace_statement("insert", &insert);
            executor.execute(&insert).await?;

            let select = self.select_by_ids_statement(&ids)?;
            trace_statement("select inserted", &select);
            let rows = decode_for(executor, executor.fetch_all(&select).await?);
            order_by_ids(rows, &ids)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Update rows by comma-separated ids; yields rows affected
    pub async fn update<E>(&self, executor: &E, ids: &str, record: &Record) -> Result<u64>
    where
        E: Executor + ?Sized,
    {
        async {
            let statement = self.update_statement(ids, record)?;
            tracing::debug!(ids, "updating rows");
            trace_statement("update", &statement);
            let affected = executor.execute(&statement).await?;
            tracing::debug!(affected, "rows updated");
            Ok(affected)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Delete one row by id
    pub async fn delete<E>(&self, executor: &E, id: &str) -> Result<u64>
    where
        E: Executor + ?Sized,
    {
        if id.contains(',') {
            return Err(CrudError::validation(format!(
                "'{}' is not a single id; use delete_many",
                id
            )));
        }
        self.delete_many(executor, id).await
    }

    /// Delete rows by comma-separated ids; yields rows affected
    pub async fn delete_many<E>(&self, executor: &E, ids: &str) -> Result<u64>
    where
        E: Executor + ?Sized,
    {
        async {
            let statement = self.delete_statement(ids)?;
            tracing::debug!(ids, "deleting rows");
            trace_statement("delete", &statement);
            let affected = executor.execute(&statement).await?;
            tracing::debug!(affected, "rows deleted");
            Ok(affected)
        }
        .instrument(self.span.clone())
        .await
    }
}

fn trace_statement(operation: &str, statement: &Statement) {
    tracing::trace!(
        operation,
        sql = %statement.sql,
        params = statement.params.len(),
        "assembled statement"
    );
}

/// Read the count from the first column of the first row
///
/// Drivers disagree on the column's type and sometimes its name case, so
/// numbers, numeric strings and floats are all accepted.
fn count_from_rows(rows: &[Row]) -> Result<u64> {
    let value = rows
        .first()
        .and_then(|row| row.get("count").or_else(|| row.values().next()))
        .ok_or_else(|| CrudError::execution("count query returned no rows"))?;

    let count = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    count.ok_or_else(|| CrudError::execution(format!("count query returned '{}'", value)))
}

/// Arrange re-selected rows in the order their ids were inserted
///
/// Every inserted id must come back exactly once.
fn order_by_ids(rows: Vec<Row>, ids: &[String]) -> Result<Vec<Row>> {
    let mut by_id: HashMap<String, Row> = rows
        .into_iter()
        .filter_map(|row| {
            let id = match row.get(PRIMARY_KEY)? {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((id, row))
        })
        .collect();
    let ordered: Vec<Row> = ids.iter().filter_map(|id| by_id.remove(id)).collect();
    if ordered.len() != ids.len() {
        return Err(CrudError::execution(format!(
            "re-select found {} of {} inserted rows",
            ordered.len(),
            ids.len()
        )));
    }
    Ok(ordered)
}
