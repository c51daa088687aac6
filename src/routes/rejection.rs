use serde::Serialize;
use warp::reject;

use crate::errors::RegistryError;
use crate::validation::FieldError;

/// A handler failure, remembering which operation it interrupted.
#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: RegistryError,
}

impl Rejection {
    pub fn new(context: Context, error: RegistryError) -> Self {
        Rejection { context, error }
    }

    /// Builds the response body. Server-side failures get a generic
    /// message; their underlying error is only included when
    /// `expose_errors` is set.
    pub fn flatten(&self, expose_errors: bool) -> FlattenedRejection {
        let client_error = self.error.is_client_error();

        let message = if client_error {
            format!("{}", self.error)
        } else {
            self.context.failure_message().to_owned()
        };

        let error = match &self.error {
            RegistryError::Sqlx { source } if expose_errors => Some(format!("{}", source)),
            _ => None,
        };

        FlattenedRejection {
            success: false,
            context: self.context.clone(),
            message,
            errors: self.error.field_errors(),
            error,
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    pub(crate) success: bool,
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Context {
    List,
    Create,
    Retrieve { id: String },
    Update { id: String },
    Delete { id: String },
}

impl Context {
    pub fn list() -> Context {
        Context::List
    }

    pub fn create() -> Context {
        Context::Create
    }

    pub fn retrieve(id: String) -> Context {
        Context::Retrieve { id }
    }

    pub fn update(id: String) -> Context {
        Context::Update { id }
    }

    pub fn delete(id: String) -> Context {
        Context::Delete { id }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Context::List => "Error fetching records",
            Context::Create => "Error creating record",
            Context::Retrieve { .. } => "Error fetching record",
            Context::Update { .. } => "Error updating record",
            Context::Delete { .. } => "Error deleting record",
        }
    }
}
