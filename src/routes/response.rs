use serde::Serialize;

use crate::record::Record;

/// The body of every successful records response.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T> SuccessResponse<T> {
    fn new(message: Option<&'static str>, count: Option<usize>, data: Option<T>) -> Self {
        SuccessResponse {
            success: true,
            message,
            count,
            data,
        }
    }
}

impl SuccessResponse<Vec<Record>> {
    pub fn list(records: Vec<Record>) -> Self {
        Self::new(None, Some(records.len()), Some(records))
    }
}

impl SuccessResponse<Record> {
    pub fn found(record: Record) -> Self {
        Self::new(None, None, Some(record))
    }

    pub fn created(record: Record) -> Self {
        Self::new(Some("Record created successfully"), None, Some(record))
    }

    pub fn updated(record: Record) -> Self {
        Self::new(Some("Record updated successfully"), None, Some(record))
    }
}

impl SuccessResponse<()> {
    pub fn deleted() -> Self {
        Self::new(Some("Record deleted successfully"), None, None)
    }
}

/// The body of a failure that belongs to no particular operation.
#[derive(Debug, Serialize)]
pub struct FailureResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl FailureResponse {
    pub fn new(message: impl Into<String>) -> Self {
        FailureResponse {
            success: false,
            message: message.into(),
            error: None,
        }
    }

    pub fn with_error(self, error: impl Into<String>) -> Self {
        FailureResponse {
            error: Some(error.into()),
            ..self
        }
    }
}
