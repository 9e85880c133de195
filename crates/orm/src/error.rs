//! Error types for the relationship engine
//!
//! Every failure of a `find`, `find_by_id` or `pull_related` call is reported
//! through [`ModelError`]. Schema, path and registry errors are raised before
//! any query runs; collaborator errors are passed through unchanged.

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// A requested attribute or path segment is not declared in the schema
    #[error("No such attribute '{attribute}' on model '{model}'")]
    NoSuchAttribute { model: String, attribute: String },

    /// The named attribute exists but is not a relationship slot
    #[error("No such relationship '{relation}' on model '{model}'")]
    NoSuchRelationship { model: String, relation: String },

    /// The registry cannot resolve a model name
    #[error("No such model '{0}'")]
    NoSuchModel(String),

    /// The model has already been attached to a registry
    #[error("Model '{0}' is already attached to a registry")]
    AlreadyAttached(String),

    /// The model was used before being attached to a registry
    #[error("Model '{0}' is not attached to a registry")]
    NotAttached(String),

    /// A scalar attribute failed its required/type constraint on write
    #[error("Validation failed for '{model}.{attribute}': {reason}")]
    ValidationFailed {
        model: String,
        attribute: String,
        reason: String,
    },

    /// Error raised by the query collaborator
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// No record matched the requested primary key
    #[error("Record not found in table '{table}' for key {key}")]
    NotFound { table: String, key: String },

    /// A fetched row carries no usable primary key
    #[error("Row from table '{table}' is missing primary key '{column}'")]
    MissingPrimaryKey { table: String, column: String },

    /// Invalid schema, registry or loader configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ModelError {
    pub(crate) fn no_such_attribute(model: &str, attribute: &str) -> Self {
        ModelError::NoSuchAttribute {
            model: model.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn no_such_relationship(model: &str, relation: &str) -> Self {
        ModelError::NoSuchRelationship {
            model: model.to_string(),
            relation: relation.to_string(),
        }
    }

    pub(crate) fn validation(model: &str, attribute: &str, reason: impl Into<String>) -> Self {
        ModelError::ValidationFailed {
            model: model.to_string(),
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::QueryFailed(err.to_string())
    }
}
