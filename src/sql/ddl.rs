//! DDL generation for registry-backed tables
//!
//! Produces the idempotent CREATE TABLE for a [`FieldRegistry`] in the
//! target dialect.

use crate::schema::FieldRegistry;
use crate::sql::dialect::DialectAdapter;
use crate::types::FieldDescriptor;

/// DDL generator for one dialect
pub struct DdlGenerator<'a> {
    dialect: &'a dyn DialectAdapter,
}

impl<'a> DdlGenerator<'a> {
    pub fn new(dialect: &'a dyn DialectAdapter) -> Self {
        Self { dialect }
    }

    /// Generate a CREATE TABLE that is a no-op when the table exists
    ///
    /// Columns follow registry order, so `_id` comes first.
    pub fn generate_create_table(&self, table_name: &str, registry: &FieldRegistry) -> String {
        let columns = registry
            .iter()
            .map(|field| self.format_column_definition(field))
            .collect::<Vec<_>>()
            .join(", ");
        self.dialect
            .create_table(&self.dialect.quote_table(table_name), &columns)
    }

    /// Format a single column definition
    pub fn format_column_definition(&self, field: &FieldDescriptor) -> String {
        let mut parts = vec![
            self.dialect.quote_identifier(&field.key),
            self.dialect.column_type(field),
        ];

        if field.is_primary_key {
            parts.push("PRIMARY KEY".to_string());
        } else if field.is_unique {
            parts.push("UNIQUE".to_string());
        }

        if field.is_required && !field.is_primary_key {
            parts.push("NOT NULL".to_string());
        }

        parts.join(" ")
    }
}
