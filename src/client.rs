//! The registry front end, independent of any particular UI toolkit.
//! [`App`] drives the server through [`ApiClient`] and keeps everything
//! a page shows in [`AppState`]; [`render`] turns that state into HTML.

use thiserror::Error;

use crate::validation::FieldError;

mod api;
pub mod render;
mod state;
mod toast;

pub use self::api::ApiClient;
pub use self::state::{matches, App, AppState, Form, Submission};
pub use self::toast::{Toast, ToastKind, Toasts, TOAST_LIFETIME};

/// Enumerates errors seen by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never got a response.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("could not encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// The response wasn’t the JSON envelope the server sends.
    #[error("unexpected response (status {status})")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// The server refused the request.
    #[error("{message}")]
    Rejected {
        status: u16,
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("response carried no data")]
    MissingData,
}

impl ClientError {
    /// The HTTP status of a refusal, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Rejected { status, .. } | ClientError::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }
}
