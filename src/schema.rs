//! Field registry built from a declarative JSON schema
//!
//! The schema is an object with a `properties` mapping and a `required` list.
//! Nested `object` properties are flattened into single-level column keys
//! joined with [`FLATTEN_SEPARATOR`], so `address.city` becomes
//! `address___city`. The separator is chosen so it can never collide with a
//! character that means something in SQL.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::error::{CrudError, Result};
use crate::sql::sanitize::validate_identifier;
use crate::types::{FieldDescriptor, SqlType};

/// Joins the path segments of a nested property into one column key
pub const FLATTEN_SEPARATOR: &str = "___";

/// Key of the implicit primary key column
pub const PRIMARY_KEY: &str = "_id";

/// Rewrite a dotted path (`address.city`) into a column key
pub fn flatten_path(path: &str) -> String {
    path.trim().split('.').collect::<Vec<_>>().join(FLATTEN_SEPARATOR)
}

/// Ordered, immutable set of columns for one table
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl FieldRegistry {
    /// Flatten a declarative schema into column descriptors
    ///
    /// The implicit `_id` primary key comes first; the remaining fields follow
    /// the schema's own property order, depth first.
    pub fn build(schema: &Value) -> Result<Self> {
        let mut fields = vec![FieldDescriptor::primary_key(PRIMARY_KEY)];
        collect_fields(schema, None, &mut fields)?;

        let mut index = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            validate_identifier(&field.key).map_err(CrudError::schema)?;
            if index.insert(field.key.clone(), position).is_some() {
                return Err(CrudError::schema(format!(
                    "Property '{}' flattens to a duplicate column '{}'",
                    field.source_path, field.key
                )));
            }
        }

        Ok(Self { fields, index })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field by its flattened key
    pub fn get(&self, key: &str) -> Option<&FieldDescriptor> {
        self.index.get(key).map(|&i| &self.fields[i])
    }

    /// Resolve a client-supplied name: either a flattened key or a dotted path
    pub fn resolve(&self, name: &str) -> Option<&FieldDescriptor> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.get(name).or_else(|| self.get(&flatten_path(name)))
    }

    pub fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[0]
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }
}

fn collect_fields(
    schema: &Value,
    parent: Option<&str>,
    fields: &mut Vec<FieldDescriptor>,
) -> Result<()> {
    let location = parent.unwrap_or("<root>");

    let properties = match schema.get("properties") {
        Some(Value::Object(properties)) => properties,
        Some(_) => {
            return Err(CrudError::schema(format!(
                "'properties' of {} must be an object",
                location
            )));
        }
        None => {
            return Err(CrudError::schema(format!(
                "schema for {} has no 'properties'",
                location
            )));
        }
    };

    let required = required_set(schema, location)?;

    for (name, property) in properties {
        let path = match parent {
            Some(parent) => format!("{}.{}", parent, name),
            None => name.clone(),
        };

        if parent.is_none() && name == PRIMARY_KEY {
            tracing::trace!("schema declares '{}'; the implicit primary key is used", name);
            continue;
        }
        if name.contains('.') {
            return Err(CrudError::schema(format!(
                "Property name '{}' cannot contain '.'",
                path
            )));
        }

        let property = property.as_object().ok_or_else(|| {
            CrudError::schema(format!("Property '{}' must be an object", path))
        })?;

        let type_name = property.get("type").and_then(Value::as_str).ok_or_else(|| {
            CrudError::schema(format!("Property '{}' has no 'type'", path))
        })?;

        if type_name == "object" {
            collect_fields(&Value::Object(property.clone()), Some(&path), fields)?;
            continue;
        }

        let sql_type = property_type(type_name, property).ok_or_else(|| {
            CrudError::schema(format!(
                "Property '{}' has unsupported type '{}'",
                path, type_name
            ))
        })?;

        let max_length = property
            .get("maxLength")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|_| sql_type == SqlType::Text);

        fields.push(
            FieldDescriptor::new(flatten_path(&path), path.clone(), sql_type)
                .unique(property.get("unique").and_then(Value::as_bool).unwrap_or(false))
                .required(required.contains(name.as_str()))
                .max_length(max_length),
        );
    }

    Ok(())
}

/// Names listed in the schema's own `required` array
///
/// An empty array is fine; a missing key is a malformed schema.
fn required_set<'a>(schema: &'a Value, location: &str) -> Result<HashSet<&'a str>> {
    match schema.get("required") {
        Some(Value::Array(names)) => names
            .iter()
            .map(|name| {
                name.as_str().ok_or_else(|| {
                    CrudError::schema(format!(
                        "'required' of {} must only contain property names",
                        location
                    ))
                })
            })
            .collect(),
        Some(_) => Err(CrudError::schema(format!(
            "'required' of {} must be an array",
            location
        ))),
        None => Err(CrudError::schema(format!(
            "schema for {} has no 'required'",
            location
        ))),
    }
}

fn property_type(type_name: &str, property: &Map<String, Value>) -> Option<SqlType> {
    match type_name {
        "string" => {
            let binary = property.get("format").and_then(Value::as_str) == Some("binary")
                || property.contains_key("contentEncoding");
            Some(if binary { SqlType::Blob } else { SqlType::Text })
        }
        "number" => Some(SqlType::Double),
        "integer" => Some(SqlType::Number),
        "boolean" => Some(SqlType::Boolean),
        _ => None,
    }
}
