//! SQL Identifier Validation
//!
//! Column keys and table names are written into SQL text. Dialects quote
//! them, and they are validated once (when a table is built) so that only
//! plain word characters ever reach a quoted identifier.

use std::sync::LazyLock;

use regex::Regex;

/// Longest identifier accepted by every supported dialect
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Validate a column key or a table name part
///
/// Rules:
/// - Must start with a letter or underscore
/// - Can only contain ASCII letters, digits and underscores
/// - At most [`MAX_IDENTIFIER_LENGTH`] characters
///
/// Reserved words such as `order` or `user` are accepted.
///
/// # Example
/// ```
/// use rest_crud_sql::sql::validate_identifier;
///
/// assert!(validate_identifier("address___city").is_ok());
/// assert!(validate_identifier("order").is_ok());
/// assert!(validate_identifier("first-name").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Identifier cannot be empty".to_string());
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(format!(
            "Identifier '{}' is longer than {} characters.",
            name, MAX_IDENTIFIER_LENGTH
        ));
    }

    if !IDENTIFIER.is_match(name) {
        return Err(format!(
            "Identifier '{}' is invalid. Must start with a letter or underscore and contain only letters, numbers, and underscores.",
            name
        ));
    }

    Ok(())
}

/// Validate a table name, optionally qualified by one schema (`hr.employee`)
pub fn validate_table_name(name: &str) -> Result<(), String> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(format!(
            "Table name '{}' may have at most one schema qualifier.",
            name
        ));
    }
    parts.into_iter().try_for_each(validate_identifier)
}
