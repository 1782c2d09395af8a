//! Request-side types: row payloads, filters and list options
//!
//! Includes Record, Filter, ListOptions and the query-string form ListQuery.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CrudError, Result};
use crate::executor::Row;
use crate::schema::{FLATTEN_SEPARATOR, PRIMARY_KEY, flatten_path};
use crate::types::FieldDescriptor;

/// One row payload, flat, nested or keyed by dotted paths
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value by flattened key, dotted path or plain name
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// The record's `_id`, trimmed, when it carries a non-blank one
    pub fn id(&self) -> Option<String> {
        match self.0.get(PRIMARY_KEY) {
            Some(Value::String(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert(PRIMARY_KEY.to_string(), Value::String(id.into()));
    }

    /// Value for a registry field
    ///
    /// Tried in order: the flattened key, the dotted path as a literal key,
    /// then a walk through nested objects along the path.
    pub fn get_field(&self, field: &FieldDescriptor) -> Option<&Value> {
        if let Some(value) = self.0.get(&field.key) {
            return Some(value);
        }
        if let Some(value) = self.0.get(&field.source_path) {
            return Some(value);
        }
        let mut segments = field.source_path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Flatten nested objects and dotted keys into column keys
    ///
    /// `{"address": {"city": "x"}, "a.b": 1}` becomes
    /// `{"address___city": "x", "a___b": 1}`. Arrays and scalars are leaves.
    pub fn flatten(&self) -> Map<String, Value> {
        let mut out = Map::new();
        flatten_into(&self.0, None, &mut out);
        out
    }
}

fn flatten_into(map: &Map<String, Value>, prefix: Option<&str>, out: &mut Map<String, Value>) {
    for (name, value) in map {
        let key = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, FLATTEN_SEPARATOR, flatten_path(name)),
            None => flatten_path(name),
        };
        match value {
            Value::Object(child) if !child.is_empty() => flatten_into(child, Some(&key), out),
            other => {
                out.insert(key, other.clone());
            }
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Record {
    type Error = CrudError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CrudError::validation(format!(
                "Record must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Whether an insert should write this value
///
/// `null`, `""`, `{}` and `[]` are treated as absent; `false` and `0` are
/// real values.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

// ============================================================================
// Filter
// ============================================================================

/// Structured predicate over registry fields
///
/// Top-level keys are combined with AND. A key maps to either a value
/// (equality, `null` for IS NULL, an array for IN) or an operator object
/// such as `{"$gte": 18, "$lt": 65}`. `$and`, `$or` and `$not` compose
/// sub-filters. Nested objects without operators address nested fields, so
/// `{"address": {"city": "Pune"}}` matches `address___city`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON-encoded filter; blank input is an empty filter
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(input)
            .map_err(|e| CrudError::filter(format!("filter is not valid JSON: {}", e)))?;
        Self::try_from(value)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl TryFrom<Value> for Filter {
    type Error = CrudError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self(map)),
            other => Err(CrudError::filter(format!(
                "filter must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

/// Helper functions to build filter fragments
pub mod filter_helpers {
    use serde_json::{Value, json};

    use super::Filter;

    /// field == value
    pub fn eq(field: &str, value: impl Into<Value>) -> Value {
        let value: Value = value.into();
        json!({ field: value })
    }

    /// field != value
    pub fn ne(field: &str, value: impl Into<Value>) -> Value {
        operator(field, "$ne", value.into())
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Value {
        operator(field, "$gt", value.into())
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Value {
        operator(field, "$gte", value.into())
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Value {
        operator(field, "$lt", value.into())
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Value {
        operator(field, "$lte", value.into())
    }

    fn operator(field: &str, op: &str, value: Value) -> Value {
        json!({ field: { op: value } })
    }

    /// field IN (values)
    pub fn in_list(field: &str, values: Vec<Value>) -> Value {
        json!({ field: { "$in": values } })
    }

    /// field LIKE pattern (`%` wildcards)
    pub fn like(field: &str, pattern: &str) -> Value {
        json!({ field: { "$like": pattern } })
    }

    pub fn and(parts: Vec<Value>) -> Value {
        json!({ "$and": parts })
    }

    pub fn or(parts: Vec<Value>) -> Value {
        json!({ "$or": parts })
    }

    /// Wrap a fragment into a [`Filter`]; non-object fragments give an empty filter
    pub fn build(fragment: Value) -> Filter {
        Filter::try_from(fragment).unwrap_or_default()
    }
}

// ============================================================================
// List options
// ============================================================================

/// Parameters of one list request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    /// Columns to return; empty means all
    pub select: Vec<String>,
    /// Sort tokens, `-` prefixed for descending; empty means the default order
    pub sort: Vec<String>,
    /// 1-based page; `None` means the first
    pub page: Option<i64>,
    /// Page size; `None` means the configured default, `-1` means unlimited
    pub count: Option<i64>,
    pub filter: Filter,
    /// Return only the number of matching rows
    pub count_only: bool,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the column list from a comma-separated string
    pub fn select(mut self, select: &str) -> Self {
        self.select = split_list(select);
        self
    }

    /// Set the sort tokens from a comma-separated string
    pub fn sort(mut self, sort: &str) -> Self {
        self.sort = split_list(sort);
        self
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }

    /// Return every matching row
    pub fn unlimited(mut self) -> Self {
        self.count = Some(-1);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn count_only(mut self, count_only: bool) -> Self {
        self.count_only = count_only;
        self
    }
}

/// Split a comma-separated list, trimming items and dropping empty ones
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// List parameters as they arrive in a query string
///
/// Every field is text, so bad numbers degrade to defaults instead of
/// failing deserialization. Only a malformed `filter` is an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_only: Option<String>,
}

impl ListQuery {
    /// Normalize into [`ListOptions`]
    ///
    /// `count` is kept when positive or `-1`, `page` when positive; anything
    /// else falls back to the defaults applied at statement build time.
    pub fn into_options(self) -> Result<ListOptions> {
        let count = parse_int(self.count.as_deref()).filter(|&n| n > 0 || n == -1);
        let page = parse_int(self.page.as_deref()).filter(|&n| n > 0);
        let filter = match self.filter.as_deref() {
            Some(filter) => Filter::parse(filter)?,
            None => Filter::default(),
        };
        let count_only = matches!(
            self.count_only.as_deref().map(str::trim),
            Some("true") | Some("1") | Some("")
        );

        Ok(ListOptions {
            select: self.select.as_deref().map(split_list).unwrap_or_default(),
            sort: self.sort.as_deref().map(split_list).unwrap_or_default(),
            page,
            count,
            filter,
            count_only,
        })
    }
}

fn parse_int(input: Option<&str>) -> Option<i64> {
    input.and_then(|s| s.trim().parse::<i64>().ok())
}

/// Result of a list request: the rows, or only their number
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ListResponse {
    Rows(Vec<Row>),
    Count(u64),
}

impl ListResponse {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            ListResponse::Rows(rows) => Some(rows),
            ListResponse::Count(_) => None,
        }
    }

    pub fn count(&self) -> Option<u64> {
        match self {
            ListResponse::Count(count) => Some(*count),
            ListResponse::Rows(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlType;
    use serde_json::json;

    // =========================================================================
    // Record Tests
    // =========================================================================

    #[test]
    fn test_get_field_by_key_path_and_nesting() {
        let city = FieldDescriptor::new("address___city", "address.city", SqlType::Text);

        let flat = Record::new().with("address___city", "Pune");
        let dotted = Record::new().with("address.city", "Pune");
        let nested = Record::try_from(json!({ "address": { "city": "Pune" } })).unwrap();

        for record in [flat, dotted, nested] {
            assert_eq!(record.get_field(&city), Some(&json!("Pune")));
        }
        assert!(Record::new().get_field(&city).is_none());
    }

    #[test]
    fn test_flatten_record() {
        let record = Record::try_from(json!({
            "name": "Kavi",
            "address": { "city": "Pune", "geo": { "lat": 1.5 } },
            "contact.phone": "123"
        }))
        .unwrap();
        let flat = record.flatten();
        assert_eq!(flat["name"], "Kavi");
        assert_eq!(flat["address___city"], "Pune");
        assert_eq!(flat["address___geo___lat"], 1.5);
        assert_eq!(flat["contact___phone"], "123");
        assert!(!flat.contains_key("address"));
    }

    #[test]
    fn test_record_id() {
        let mut record = Record::new().with("name", "x");
        assert!(record.id().is_none());
        record.set_id("ABC");
        assert_eq!(record.id().as_deref(), Some("ABC"));
        assert!(Record::new().with("_id", "").id().is_none());
        assert!(Record::new().with("_id", "  ").id().is_none());
        assert_eq!(Record::new().with("_id", " a ").id().as_deref(), Some("a"));
    }

    #[test]
    fn test_record_must_be_object() {
        assert!(Record::try_from(json!([1, 2])).is_err());
    }

    #[test]
    fn test_presence() {
        assert!(!is_present(&Value::Null));
        assert!(!is_present(&json!("")));
        assert!(!is_present(&json!({})));
        assert!(!is_present(&json!([])));
        assert!(is_present(&json!(false)));
        assert!(is_present(&json!(0)));
        assert!(is_present(&json!("x")));
    }

    // =========================================================================
    // Filter Tests
    // =========================================================================

    #[test]
    fn test_filter_parse() {
        assert!(Filter::parse("").unwrap().is_empty());
        assert!(Filter::parse("  ").unwrap().is_empty());
        assert!(Filter::parse("null").unwrap().is_empty());

        let filter = Filter::parse(r#"{"name":"Kavi"}"#).unwrap();
        assert_eq!(filter.as_map()["name"], "Kavi");
    }

    #[test]
    fn test_filter_parse_errors() {
        let err = Filter::parse("{name:").unwrap_err();
        assert!(matches!(err, CrudError::Filter(_)));
        let err = Filter::parse("[1,2]").unwrap_err();
        assert!(err.to_string().contains("object"));
        assert!(Filter::parse("\"text\"").is_err());
    }

    #[test]
    fn test_filter_helpers() {
        let filter = filter_helpers::build(filter_helpers::and(vec![
            filter_helpers::eq("status", "active"),
            filter_helpers::gt("price", 100),
        ]));
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({ "$and": [{ "status": "active" }, { "price": { "$gt": 100 } }] })
        );
        assert_eq!(
            filter_helpers::in_list("id", vec![json!("a"), json!("b")]),
            json!({ "id": { "$in": ["a", "b"] } })
        );
    }

    // =========================================================================
    // ListQuery Tests
    // =========================================================================

    #[test]
    fn test_list_query_normalization() {
        let query = ListQuery {
            select: Some(" name , email,,".into()),
            sort: Some("-_id".into()),
            page: Some("0".into()),
            count: Some("abc".into()),
            filter: Some(r#"{"age":{"$gt":18}}"#.into()),
            count_only: None,
        };
        let options = query.into_options().unwrap();
        assert_eq!(options.select, vec!["name", "email"]);
        assert_eq!(options.sort, vec!["-_id"]);
        assert_eq!(options.page, None);
        assert_eq!(options.count, None);
        assert!(!options.filter.is_empty());
        assert!(!options.count_only);
    }

    #[test]
    fn test_list_query_keeps_unlimited_sentinel() {
        let query = ListQuery {
            count: Some("-1".into()),
            page: Some("3".into()),
            ..Default::default()
        };
        let options = query.into_options().unwrap();
        assert_eq!(options.count, Some(-1));
        assert_eq!(options.page, Some(3));

        let query = ListQuery {
            count: Some("-5".into()),
            ..Default::default()
        };
        assert_eq!(query.into_options().unwrap().count, None);
    }

    #[test]
    fn test_list_query_bad_filter_is_error() {
        let query = ListQuery {
            filter: Some("{not json".into()),
            ..Default::default()
        };
        assert!(matches!(query.into_options(), Err(CrudError::Filter(_))));
    }

    #[test]
    fn test_list_query_from_query_string_shape() {
        let query: ListQuery =
            serde_json::from_value(json!({ "countOnly": "true", "count": "10" })).unwrap();
        let options = query.into_options().unwrap();
        assert!(options.count_only);
        assert_eq!(options.count, Some(10));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b ,,c"), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
