//! End-to-end statement assembly tests
//!
//! Drives `Table` operations against an in-memory executor that records every
//! statement and replays canned rows, so no database is needed.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rest_crud_sql::{
    CrudConfig, CrudError, DefaultSort, Dialect, Executor, Filter, ListOptions, ListQuery, ListResponse,
    Record, Row, SqlValue, Statement, Table, run_sql,
};
use serde_json::{Value, json};

/// Records statements and answers `fetch_all` from a queue of row sets
#[derive(Default)]
struct RecordingExecutor {
    statements: Mutex<Vec<Statement>>,
    responses: Mutex<VecDeque<Vec<Row>>>,
    affected: u64,
    literals: Option<Dialect>,
    echo_ids: bool,
}

impl RecordingExecutor {
    fn new() -> Self {
        Self::default()
    }

    fn with_affected(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    /// Driver that hands text columns back as quoted literals
    fn returning_literals(dialect: Dialect) -> Self {
        Self {
            literals: Some(dialect),
            ..Self::default()
        }
    }

    /// Answer unqueued fetches with one `_id` row per bound text value
    fn echoing_ids(affected: u64) -> Self {
        Self {
            affected,
            echo_ids: true,
            ..Self::default()
        }
    }

    fn respond(&self, rows: Vec<Row>) {
        self.responses.lock().unwrap().push_back(rows);
    }

    fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn fetch_all(&self, statement: &Statement) -> rest_crud_sql::Result<Vec<Row>> {
        self.statements.lock().unwrap().push(statement.clone());
        if let Some(rows) = self.responses.lock().unwrap().pop_front() {
            return Ok(rows);
        }
        if !self.echo_ids {
            return Ok(Vec::new());
        }
        Ok(statement
            .params
            .iter()
            .filter_map(|param| match param {
                SqlValue::Text(id) => Some(row(json!({ "_id": id }))),
                _ => None,
            })
            .collect())
    }

    async fn execute(&self, statement: &Statement) -> rest_crud_sql::Result<u64> {
        self.statements.lock().unwrap().push(statement.clone());
        Ok(self.affected)
    }

    fn text_literals(&self) -> Option<Dialect> {
        self.literals
    }
}

/// Executor whose backend always fails
struct FailingExecutor;

#[async_trait]
impl Executor for FailingExecutor {
    async fn fetch_all(&self, _statement: &Statement) -> rest_crud_sql::Result<Vec<Row>> {
        Err(CrudError::execution("connection reset"))
    }

    async fn execute(&self, _statement: &Statement) -> rest_crud_sql::Result<u64> {
        Err(CrudError::execution("connection reset"))
    }
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => panic!("row must be an object"),
    }
}

fn employee_table(dialect: Dialect) -> Table {
    let schema = json!({
        "properties": {
            "name": { "type": "string" },
            "salary": { "type": "number" },
            "address": {
                "type": "object",
                "properties": { "city": { "type": "string" } },
                "required": []
            }
        },
        "required": ["name"]
    });
    Table::new("employee", &schema, CrudConfig::builder(dialect).build()).unwrap()
}

// ==================== Create Tests ====================

#[tokio::test]
async fn test_create_many_reorders_to_input() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::with_affected(3);
    executor.respond(vec![
        row(json!({ "_id": "c", "name": "third" })),
        row(json!({ "_id": "a", "name": "first" })),
        row(json!({ "_id": "b", "name": "second" })),
    ]);

    let records = vec![
        Record::new().with("_id", "a").with("name", "first"),
        Record::new().with("_id", "b").with("name", "second"),
        Record::new().with("_id", "c").with("name", "third"),
    ];
    let rows = table.create_many(&executor, records).await.unwrap();

    let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["first", "second", "third"]);

    let statements = executor.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[0].sql,
        r#"INSERT INTO "employee" ("_id", "name") VALUES ($1, $2), ($3, $4), ($5, $6)"#
    );
    assert_eq!(
        statements[1].sql,
        r#"SELECT * FROM "employee" WHERE "_id" IN ($1, $2, $3)"#
    );
    assert_eq!(
        statements[1].params,
        vec![
            SqlValue::Text("a".into()),
            SqlValue::Text("b".into()),
            SqlValue::Text("c".into())
        ]
    );
}

#[tokio::test]
async fn test_create_generates_distinct_ids() {
    let table = employee_table(Dialect::MySql);
    let executor = RecordingExecutor::echoing_ids(2);

    let records = vec![
        Record::new().with("name", "a"),
        Record::new().with("name", "b"),
    ];
    table.create_many(&executor, records).await.unwrap();

    let insert = &executor.statements()[0];
    let ids: Vec<&SqlValue> = vec![&insert.params[0], &insert.params[2]];
    match (ids[0], ids[1]) {
        (SqlValue::Text(a), SqlValue::Text(b)) => {
            assert!(!a.is_empty());
            assert!(!b.is_empty());
            assert_ne!(a, b);
        }
        other => panic!("expected text ids, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_binds_text_unchanged() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::with_affected(1);
    executor.respond(vec![row(json!({ "_id": "x", "name": "O'Brien 100%" }))]);

    let created = table
        .create(&executor, Record::new().with("_id", "x").with("name", "O'Brien 100%"))
        .await
        .unwrap();
    assert_eq!(created["name"], "O'Brien 100%");

    let insert = &executor.statements()[0];
    assert_eq!(insert.params[1], SqlValue::Text("O'Brien 100%".into()));
}

#[tokio::test]
async fn test_create_decodes_literal_rows() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::returning_literals(Dialect::Postgres);
    executor.respond(vec![row(json!({ "_id": "'x'", "name": "'O''Brien'" }))]);

    let created = table
        .create(&executor, Record::new().with("_id", "x").with("name", "O'Brien"))
        .await
        .unwrap();
    assert_eq!(created["_id"], "x");
    assert_eq!(created["name"], "O'Brien");
}

#[tokio::test]
async fn test_create_trims_given_id() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::echoing_ids(1);

    let created = table
        .create(&executor, Record::new().with("_id", "  a1 ").with("name", "x"))
        .await
        .unwrap();
    assert_eq!(created["_id"], "a1");

    let statements = executor.statements();
    assert_eq!(statements[0].params[0], SqlValue::Text("a1".into()));
    assert_eq!(statements[1].params, vec![SqlValue::Text("a1".into())]);
}

#[tokio::test]
async fn test_create_blank_id_is_generated() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::echoing_ids(1);

    let created = table
        .create(&executor, Record::new().with("_id", " ").with("name", "x"))
        .await
        .unwrap();
    let id = created["_id"].as_str().unwrap();
    assert_eq!(id.len(), 36);

    let insert = &executor.statements()[0];
    assert_eq!(insert.params[0], SqlValue::Text(id.to_string()));
}

#[tokio::test]
async fn test_create_missing_reselected_row_fails() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::with_affected(2);
    executor.respond(vec![row(json!({ "_id": "a", "name": "first" }))]);

    let records = vec![
        Record::new().with("_id", "a").with("name", "first"),
        Record::new().with("_id", "b").with("name", "second"),
    ];
    let err = table.create_many(&executor, records).await.unwrap_err();
    assert!(matches!(err, CrudError::Execution(_)));
    assert!(err.to_string().contains("1 of 2"));
}

#[tokio::test]
async fn test_create_without_data_runs_nothing() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::new();

    let err = table
        .create(&executor, Record::new().with("unknown", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::NoData));
    assert!(err.is_client_error());
    assert!(executor.statements().is_empty());
}

// ==================== List / Count Tests ====================

#[tokio::test]
async fn test_count_is_idempotent() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::new();
    executor.respond(vec![row(json!({ "count": 4 }))]);
    executor.respond(vec![row(json!({ "count": 4 }))]);

    let filter = Filter::new().with("address", json!({ "city": "Pune" }));
    let first = table.count(&executor, &filter).await.unwrap();
    let second = table.count(&executor, &filter).await.unwrap();
    assert_eq!(first, second);

    let statements = executor.statements();
    assert_eq!(statements[0], statements[1]);
    assert_eq!(
        statements[0].sql,
        r#"SELECT count(*) AS count FROM "employee" WHERE "address___city" = $1"#
    );
}

#[tokio::test]
async fn test_list_from_query_string() {
    let table = employee_table(Dialect::MsSql);
    let executor = RecordingExecutor::returning_literals(Dialect::MsSql);
    executor.respond(vec![row(json!({ "_id": "N'1'", "name": "N'it''s A%0AB'" }))]);

    let query: ListQuery = serde_json::from_value(json!({
        "select": "name,bogus",
        "sort": "-salary,name",
        "page": "3",
        "count": "5",
        "filter": "{\"salary\":{\"$lt\":1000},\"bogus\":1}"
    }))
    .unwrap();
    let options = query.into_options().unwrap();

    let response = table.list_or_count(&executor, &options).await.unwrap();
    let rows = response.rows().unwrap();
    assert_eq!(rows[0]["name"], "it's A%0AB");

    assert_eq!(
        executor.statements()[0].sql,
        "SELECT [name] FROM [employee] WHERE [salary] < @p1 \
         ORDER BY [salary] DESC, [name] ASC OFFSET 10 ROWS FETCH FIRST 5 ROWS ONLY"
    );
}

#[tokio::test]
async fn test_count_only_short_circuits() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::new();
    executor.respond(vec![row(json!({ "count": "7" }))]);

    let options = ListOptions::new().count_only(true).count(5);
    let response = table.list_or_count(&executor, &options).await.unwrap();
    assert_eq!(response, ListResponse::Count(7));
    assert_eq!(
        executor.statements()[0].sql,
        r#"SELECT count(*) AS count FROM "employee""#
    );
}

#[tokio::test]
async fn test_unsorted_mssql_page_is_ordered() {
    let config = CrudConfig::builder(Dialect::MsSql)
        .default_sort(DefaultSort::Unspecified)
        .build();
    let schema = json!({ "properties": { "name": { "type": "string" } }, "required": [] });
    let table = Table::new("employee", &schema, config).unwrap();
    let executor = RecordingExecutor::new();

    table.list(&executor, &ListOptions::new()).await.unwrap();
    assert_eq!(
        executor.statements()[0].sql,
        "SELECT * FROM [employee] ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH FIRST 30 ROWS ONLY"
    );
}

#[tokio::test]
async fn test_like_filter_keeps_escaped_wildcard() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::new();

    let filter = Filter::new().with("name", json!({ "$like": "100\\%%" }));
    table.list(&executor, &ListOptions::new().filter(filter)).await.unwrap();

    let statement = &executor.statements()[0];
    assert!(statement.sql.contains(r#""name" LIKE $1 ESCAPE '\'"#));
    assert_eq!(statement.params[0], SqlValue::Text("100\\%%".into()));
}

#[tokio::test]
async fn test_malformed_filter_runs_nothing() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::new();

    let options = ListOptions::new().filter(Filter::new().with("salary", json!({ "$near": 1 })));
    let err = table.list(&executor, &options).await.unwrap_err();
    assert!(matches!(err, CrudError::Filter(_)));
    assert!(executor.statements().is_empty());
}

// ==================== Update / Delete Tests ====================

#[tokio::test]
async fn test_update_and_delete_statements() {
    let table = employee_table(Dialect::Oracle);
    let executor = RecordingExecutor::with_affected(2);

    let affected = table
        .update(&executor, "a,b", &Record::new().with("salary", 10))
        .await
        .unwrap();
    assert_eq!(affected, 2);

    table.delete_many(&executor, "a,b").await.unwrap();

    let statements = executor.statements();
    assert_eq!(
        statements[0].sql,
        "UPDATE \"employee\" SET \"salary\" = :1 WHERE \"_id\" IN (:2, :3)"
    );
    assert_eq!(
        statements[1].sql,
        "DELETE FROM \"employee\" WHERE \"_id\" IN (:1, :2)"
    );
}

#[tokio::test]
async fn test_update_only_primary_key_fails() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::new();

    let err = table
        .update(&executor, "X", &Record::new().with("_id", "X"))
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::NoMatchingFields));
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn test_delete_requires_ids() {
    let table = employee_table(Dialect::Postgres);
    let executor = RecordingExecutor::new();

    let err = table.delete_many(&executor, " , ").await.unwrap_err();
    assert!(matches!(err, CrudError::NoIdProvided));
}

// ==================== Execution Error Tests ====================

#[tokio::test]
async fn test_execution_errors_propagate() {
    let table = employee_table(Dialect::Postgres);

    let err = table
        .count(&FailingExecutor, &Filter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::Execution(_)));
    assert!(!err.is_client_error());
    assert!(err.to_string().contains("connection reset"));
}

#[tokio::test]
async fn test_run_sql_decodes_literal_rows() {
    let executor = RecordingExecutor::returning_literals(Dialect::MySql);
    executor.respond(vec![row(json!({ "note": "'50% off\\n'", "raw": "it's" }))]);

    let rows = run_sql(&executor, "SELECT note FROM promo").await.unwrap();
    assert_eq!(rows[0]["note"], "50% off\n");
    assert_eq!(rows[0]["raw"], "it's");
    assert_eq!(executor.statements()[0].sql, "SELECT note FROM promo");
}

#[tokio::test]
async fn test_run_sql_leaves_plain_rows_alone() {
    let executor = RecordingExecutor::new();
    executor.respond(vec![row(json!({ "note": "'quoted' 50%25" }))]);

    let rows = run_sql(&executor, "SELECT note FROM promo").await.unwrap();
    assert_eq!(rows[0]["note"], "'quoted' 50%25");
}
