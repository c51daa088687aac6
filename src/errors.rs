use thiserror::Error;
use uuid::Uuid;

use crate::validation::{Field, FieldError};

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Represents one or more fields failing validation.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Represents a value that must be unique colliding with an existing
    /// record.
    #[error("{0} already exists")]
    Duplicate(Field),

    /// Represents a well-formed ID with no record behind it.
    #[error("Record not found")]
    NonExistentId(Uuid),

    /// Represents an ID that cannot name any record.
    #[error("Record not found")]
    InvalidId(String),

    /// Represents a request body that is not a JSON record.
    #[error("Malformed request body")]
    MalformedBody(#[source] serde_json::Error),

    /// Represents an SQL error.
    #[error("Database error")]
    Sqlx { source: sqlx::Error },
}

impl RegistryError {
    /// Returns the per-field errors to report alongside the message.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            RegistryError::Validation(errors) => errors.clone(),
            RegistryError::Duplicate(field) => {
                vec![FieldError::new(*field, format!("{}", self))]
            }
            _ => vec![],
        }
    }

    /// Whether the error is the caller’s to fix.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RegistryError::Sqlx { .. })
    }
}

/// Enumerates errors in the start-up configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("must define {name} environment variable")]
    MissingVariable { name: String },

    #[error("could not parse {name} environment variable ({value:?})")]
    InvalidVariable { name: String, value: String },
}
