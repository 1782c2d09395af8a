//! Clause builders
//!
//! Each builder turns one request parameter into a SQL fragment, resolving
//! names against the [`FieldRegistry`]. Names the registry does not know are
//! dropped under [`FieldPolicy::Ignore`] and rejected under
//! [`FieldPolicy::Reject`]. Values never reach the SQL text directly: they go
//! through a [`ParamSink`], which yields a placeholder or a quoted literal.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::{CrudError, Result};
use crate::record::{Filter, Record, is_present};
use crate::schema::{FieldRegistry, PRIMARY_KEY};
use crate::sql::dialect::DialectAdapter;
use crate::sql::statement::{ParamSink, SqlValue};
use crate::types::FieldDescriptor;

/// Page size used when no valid count is configured
pub const DEFAULT_COUNT: i64 = 30;

/// Treatment of names that do not resolve to a registry field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Drop the name silently
    #[default]
    Ignore,
    /// Fail with [`CrudError::UnknownField`]
    Reject,
}

impl FieldPolicy {
    fn unknown(self, name: &str) -> Result<()> {
        match self {
            FieldPolicy::Ignore => {
                tracing::trace!(field = name, "dropping unknown field");
                Ok(())
            }
            FieldPolicy::Reject => Err(CrudError::unknown_field(name)),
        }
    }
}

/// Escape character accepted inside `$like` patterns
pub const LIKE_ESCAPE: char = '\\';

/// Bind one value coerced to the field's type
fn bind(field: &FieldDescriptor, value: &Value, sink: &mut ParamSink<'_>) -> Result<String> {
    let typed = field.coerce(value)?;
    Ok(sink.push(typed))
}

// ============================================================================
// SELECT
// ============================================================================

/// Column list for SELECT; `None` means all columns
pub fn build_select<S: AsRef<str>>(
    registry: &FieldRegistry,
    dialect: &dyn DialectAdapter,
    names: &[S],
    policy: FieldPolicy,
) -> Result<Option<String>> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for name in names {
        let name = name.as_ref();
        match registry.resolve(name) {
            Some(field) => {
                if seen.insert(field.key.as_str()) {
                    columns.push(dialect.quote_identifier(&field.key));
                }
            }
            None => policy.unknown(name)?,
        }
    }
    Ok((!columns.is_empty()).then(|| columns.join(", ")))
}

// ============================================================================
// ORDER BY
// ============================================================================

/// ORDER BY list from sort tokens, `-name` meaning descending
///
/// Input order is kept; a field named twice keeps its first direction.
pub fn build_order_by<S: AsRef<str>>(
    registry: &FieldRegistry,
    dialect: &dyn DialectAdapter,
    tokens: &[S],
    policy: FieldPolicy,
) -> Result<Option<String>> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    for token in tokens {
        let token = token.as_ref().trim();
        let (name, direction) = match token.strip_prefix('-') {
            Some(name) => (name, "DESC"),
            None => (token, "ASC"),
        };
        match registry.resolve(name) {
            Some(field) => {
                if seen.insert(field.key.as_str()) {
                    terms.push(format!(
                        "{} {}",
                        dialect.quote_identifier(&field.key),
                        direction
                    ));
                }
            }
            None if token.is_empty() => {}
            None => policy.unknown(name)?,
        }
    }
    Ok((!terms.is_empty()).then(|| terms.join(", ")))
}

// ============================================================================
// Pagination
// ============================================================================

/// Pagination fragment; `count == -1` requests every row
///
/// A missing or non-positive count falls back to `default_count` (or
/// [`DEFAULT_COUNT`] when that is not positive either); a missing or
/// non-positive page becomes 1.
pub fn build_pagination(
    dialect: &dyn DialectAdapter,
    count: Option<i64>,
    page: Option<i64>,
    default_count: i64,
) -> Option<String> {
    if count == Some(-1) {
        return None;
    }
    let fallback = if default_count > 0 {
        default_count
    } else {
        DEFAULT_COUNT
    };
    let count = count.filter(|&n| n > 0).unwrap_or(fallback) as u64;
    let page = page.filter(|&n| n > 0).unwrap_or(1) as u64;
    let offset = (page - 1).saturating_mul(count);
    Some(dialect.pagination(count, offset))
}

// ============================================================================
// WHERE
// ============================================================================

/// WHERE predicate from a structured filter; `None` when nothing applies
pub fn build_where(
    registry: &FieldRegistry,
    filter: &Filter,
    policy: FieldPolicy,
    sink: &mut ParamSink<'_>,
) -> Result<Option<String>> {
    if filter.is_empty() {
        return Ok(None);
    }
    let mut builder = WhereBuilder {
        registry,
        policy,
        sink,
    };
    let parts = builder.conjunction(filter.as_map(), None)?;
    Ok(join_and(parts))
}

fn join_and(parts: Vec<String>) -> Option<String> {
    match parts.len() {
        0 => None,
        _ => Some(parts.join(" AND ")),
    }
}

fn parenthesize(parts: Vec<String>) -> Option<String> {
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(format!("({})", parts.join(" AND "))),
    }
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

fn has_operator(map: &Map<String, Value>) -> bool {
    map.keys().any(|k| k.starts_with('$'))
}

struct WhereBuilder<'r, 's, 'd> {
    registry: &'r FieldRegistry,
    policy: FieldPolicy,
    sink: &'s mut ParamSink<'d>,
}

impl WhereBuilder<'_, '_, '_> {
    /// Predicates for every key of one filter object, implicitly ANDed
    fn conjunction(
        &mut self,
        map: &Map<String, Value>,
        prefix: Option<&str>,
    ) -> Result<Vec<String>> {
        let registry = self.registry;
        let mut parts = Vec::new();
        for (key, value) in map {
            if key.starts_with('$') {
                if let Some(part) = self.logical(key, value)? {
                    parts.push(part);
                }
                continue;
            }

            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, key),
                None => key.clone(),
            };

            if let Some(field) = registry.resolve(&path) {
                parts.extend(self.field_predicates(field, value)?);
                continue;
            }

            match value {
                Value::Object(child) if !has_operator(child) => {
                    parts.extend(self.conjunction(child, Some(&path))?);
                }
                _ => self.policy.unknown(&path)?,
            }
        }
        Ok(parts)
    }

    fn logical(&mut self, op: &str, value: &Value) -> Result<Option<String>> {
        match op {
            "$and" | "$or" => {
                let items = value.as_array().ok_or_else(|| {
                    CrudError::filter(format!("'{}' expects an array of filters", op))
                })?;
                let mut branches = Vec::new();
                for item in items {
                    let map = item.as_object().ok_or_else(|| {
                        CrudError::filter(format!("'{}' items must be objects", op))
                    })?;
                    if let Some(branch) = parenthesize(self.conjunction(map, None)?) {
                        branches.push(branch);
                    }
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(match branches.len() {
                    0 => None,
                    1 => branches.into_iter().next(),
                    _ => Some(format!("({})", branches.join(joiner))),
                })
            }
            "$not" => {
                let map = value
                    .as_object()
                    .ok_or_else(|| CrudError::filter("'$not' expects a filter object"))?;
                Ok(join_and(self.conjunction(map, None)?).map(|inner| format!("NOT ({})", inner)))
            }
            other => Err(CrudError::filter(format!(
                "operator '{}' must be applied to a field",
                other
            ))),
        }
    }

    fn field_predicates(&mut self, field: &FieldDescriptor, value: &Value) -> Result<Vec<String>> {
        let column = self.sink.dialect().quote_identifier(&field.key);
        match value {
            Value::Null => Ok(vec![format!("{} IS NULL", column)]),
            Value::Array(items) => Ok(vec![self.in_list(field, &column, items, false)?]),
            Value::Object(ops) if is_operator_object(ops) => {
                let mut parts = Vec::new();
                for (op, operand) in ops {
                    if let Some(part) = self.operator(field, &column, op, operand)? {
                        parts.push(part);
                    }
                }
                Ok(parts)
            }
            Value::Object(ops) if ops.is_empty() => Ok(Vec::new()),
            Value::Object(_) => Err(CrudError::filter(format!(
                "field '{}' expects a value or an operator object",
                field.source_path
            ))),
            scalar => Ok(vec![format!(
                "{} = {}",
                column,
                bind(field, scalar, self.sink)?
            )]),
        }
    }

    fn operator(
        &mut self,
        field: &FieldDescriptor,
        column: &str,
        op: &str,
        operand: &Value,
    ) -> Result<Option<String>> {
        let comparison = match op {
            "$eq" if operand.is_null() => return Ok(Some(format!("{} IS NULL", column))),
            "$ne" if operand.is_null() => return Ok(Some(format!("{} IS NOT NULL", column))),
            "$eq" => "=",
            "$ne" => "<>",
            "$gt" => ">",
            "$gte" => ">=",
            "$lt" => "<",
            "$lte" => "<=",
            "$in" | "$nin" => {
                let items = operand.as_array().ok_or_else(|| {
                    let path = &field.source_path;
                    CrudError::filter(format!("'{}' on '{}' expects an array", op, path))
                })?;
                if op == "$nin" && items.is_empty() {
                    return Ok(None);
                }
                return self.in_list(field, column, items, op == "$nin").map(Some);
            }
            "$like" => {
                let pattern = operand.as_str().ok_or_else(|| {
                    let path = &field.source_path;
                    CrudError::filter(format!("'$like' on '{}' expects a string", path))
                })?;
                if !field.sql_type.is_textual() {
                    return Err(CrudError::filter(format!(
                        "'$like' is only supported on text fields, not '{}'",
                        field.source_path
                    )));
                }
                let placeholder = self.sink.push(SqlValue::Text(pattern.to_string()));
                let escape = self.sink.dialect().quote_text(&LIKE_ESCAPE.to_string());
                return Ok(Some(format!(
                    "{} LIKE {} ESCAPE {}",
                    column, placeholder, escape
                )));
            }
            "$exists" => {
                let exists = operand.as_bool().ok_or_else(|| {
                    let path = &field.source_path;
                    CrudError::filter(format!("'$exists' on '{}' expects a boolean", path))
                })?;
                let test = if exists { "IS NOT NULL" } else { "IS NULL" };
                return Ok(Some(format!("{} {}", column, test)));
            }
            other => {
                return Err(CrudError::filter(format!("unknown operator '{}'", other)));
            }
        };

        if operand.is_null() || operand.is_array() || operand.is_object() {
            return Err(CrudError::filter(format!(
                "'{}' on '{}' expects a scalar value",
                op, field.source_path
            )));
        }
        let placeholder = bind(field, operand, self.sink)?;
        Ok(Some(format!("{} {} {}", column, comparison, placeholder)))
    }

    fn in_list(
        &mut self,
        field: &FieldDescriptor,
        column: &str,
        items: &[Value],
        negate: bool,
    ) -> Result<String> {
        if items.is_empty() {
            // Matches nothing
            return Ok("1 = 0".to_string());
        }
        let mut placeholders = Vec::with_capacity(items.len());
        for item in items {
            if item.is_array() || item.is_object() {
                return Err(CrudError::filter(format!(
                    "list for '{}' must only contain scalar values",
                    field.source_path
                )));
            }
            placeholders.push(bind(field, item, self.sink)?);
        }
        let keyword = if negate { "NOT IN" } else { "IN" };
        Ok(format!("{} {} ({})", column, keyword, placeholders.join(", ")))
    }
}

// ============================================================================
// INSERT
// ============================================================================

/// Column list and VALUES rows for one or more records
///
/// Only registry fields with a present value are written. In a batch the
/// column list is the union over all records, in registry order, and cells a
/// record does not carry are written as `DEFAULT`.
pub fn build_insert(
    registry: &FieldRegistry,
    records: &[Record],
    policy: FieldPolicy,
    sink: &mut ParamSink<'_>,
) -> Result<String> {
    if records.is_empty() {
        return Err(CrudError::NoData);
    }

    let mut rows: Vec<Vec<Option<&Value>>> = Vec::with_capacity(records.len());
    let mut used = vec![false; registry.len()];

    for record in records {
        if policy == FieldPolicy::Reject {
            for key in record.flatten().keys() {
                if registry.get(key).is_none() {
                    return Err(CrudError::unknown_field(key.clone()));
                }
            }
        }

        let cells: Vec<Option<&Value>> = registry
            .iter()
            .map(|field| record.get_field(field).filter(|v| is_present(v)))
            .collect();

        let has_data = registry
            .iter()
            .zip(&cells)
            .any(|(field, cell)| !field.is_primary_key && cell.is_some());
        if !has_data {
            return Err(CrudError::NoData);
        }

        for (slot, cell) in used.iter_mut().zip(&cells) {
            *slot |= cell.is_some();
        }
        rows.push(cells);
    }

    let dialect = sink.dialect();
    let columns: Vec<(usize, &FieldDescriptor)> = registry
        .iter()
        .enumerate()
        .filter(|(i, _)| used[*i])
        .collect();

    let column_list = columns
        .iter()
        .map(|(_, field)| dialect.quote_identifier(&field.key))
        .collect::<Vec<_>>()
        .join(", ");

    let mut value_rows = Vec::with_capacity(rows.len());
    for cells in rows {
        let mut values = Vec::with_capacity(columns.len());
        for (index, field) in &columns {
            match cells[*index] {
                Some(value) => values.push(bind(field, value, sink)?),
                None => values.push("DEFAULT".to_string()),
            }
        }
        value_rows.push(format!("({})", values.join(", ")));
    }

    Ok(format!("({}) VALUES {}", column_list, value_rows.join(", ")))
}

// ============================================================================
// UPDATE
// ============================================================================

/// SET assignments for a partial record; `_id` is never assigned
pub fn build_update(
    registry: &FieldRegistry,
    record: &Record,
    policy: FieldPolicy,
    sink: &mut ParamSink<'_>,
) -> Result<String> {
    let dialect = sink.dialect();
    let mut assignments = Vec::new();
    let mut seen = HashSet::new();

    for (key, value) in record.flatten() {
        match registry.get(&key) {
            Some(field) if field.is_primary_key => continue,
            Some(field) => {
                if !seen.insert(field.key.clone()) {
                    continue;
                }
                let placeholder = bind(field, &value, sink)?;
                assignments.push(format!(
                    "{} = {}",
                    dialect.quote_identifier(&field.key),
                    placeholder
                ));
            }
            None => policy.unknown(&key)?,
        }
    }

    if assignments.is_empty() {
        return Err(CrudError::NoMatchingFields);
    }
    Ok(assignments.join(", "))
}

// ============================================================================
// Primary key lists
// ============================================================================

/// Placeholder list for a comma-separated set of primary keys
pub fn build_id_list(
    registry: &FieldRegistry,
    ids: &str,
    sink: &mut ParamSink<'_>,
) -> Result<String> {
    let ids = crate::record::split_list(ids);
    build_id_values(registry, &ids, sink)
}

/// Placeholder list for already split primary keys
pub fn build_id_values<S: AsRef<str>>(
    registry: &FieldRegistry,
    ids: &[S],
    sink: &mut ParamSink<'_>,
) -> Result<String> {
    let pk = registry.primary_key();
    let mut seen = HashSet::new();
    let mut placeholders = Vec::new();
    for id in ids {
        let id = id.as_ref().trim();
        if id.is_empty() || !seen.insert(id) {
            continue;
        }
        placeholders.push(bind(pk, &Value::String(id.to_string()), sink)?);
    }
    if placeholders.is_empty() {
        return Err(CrudError::NoIdProvided);
    }
    Ok(placeholders.join(", "))
}

/// `_id IN (...)` predicate for a set of primary keys
pub fn build_id_predicate<S: AsRef<str>>(
    registry: &FieldRegistry,
    ids: &[S],
    sink: &mut ParamSink<'_>,
) -> Result<String> {
    let list = build_id_values(registry, ids, sink)?;
    Ok(format!(
        "{} IN ({})",
        sink.dialect().quote_identifier(PRIMARY_KEY),
        list
    ))
}
