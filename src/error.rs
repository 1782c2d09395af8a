//! Error types for CRUD statement synthesis and execution

use thiserror::Error;

/// Boxed failure reported by an [`Executor`](crate::executor::Executor)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while building or running CRUD statements
#[derive(Debug, Error)]
pub enum CrudError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid filter: {0}")]
    Filter(String),

    #[error("No data to insert")]
    NoData,

    #[error("Data has no matching field to update")]
    NoMatchingFields,

    #[error("No id provided")]
    NoIdProvided,

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Execution error: {0}")]
    Execution(#[source] BoxError),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrudError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn filter(msg: impl Into<String>) -> Self {
        Self::Filter(msg.into())
    }

    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField(name.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn execution(err: impl Into<BoxError>) -> Self {
        Self::Execution(err.into())
    }

    /// Whether the failure was caused by the request rather than the backend
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Filter(_)
                | Self::NoData
                | Self::NoMatchingFields
                | Self::NoIdProvided
                | Self::UnknownField(_)
                | Self::Validation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CrudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(CrudError::filter("bad").is_client_error());
        assert!(CrudError::NoData.is_client_error());
        assert!(CrudError::NoMatchingFields.is_client_error());
        assert!(CrudError::NoIdProvided.is_client_error());
        assert!(CrudError::unknown_field("x").is_client_error());
        assert!(CrudError::validation("x").is_client_error());
    }

    #[test]
    fn test_server_errors() {
        assert!(!CrudError::schema("missing properties").is_client_error());
        assert!(!CrudError::execution("connection reset").is_client_error());
        assert!(!CrudError::InvalidIdentifier("a b".into()).is_client_error());
    }

    #[test]
    fn test_execution_error_keeps_source() {
        let err = CrudError::execution("deadlock detected");
        assert_eq!(err.to_string(), "Execution error: deadlock detected");
        assert!(std::error::Error::source(&err).is_some());
    }
}
