use crate::resource_id::ParseError;
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("management API returned HTTP {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("long-running operation finished as {status}: {message}")]
    OperationFailed { status: String, message: String },
    #[error("operation was cancelled")]
    Cancelled,
    #[error("operation task exited without reporting a result")]
    OperationAbandoned,
    #[error(transparent)]
    ResourceId(#[from] ParseError),
    #[error("management API response is missing `{0}`")]
    MissingField(&'static str),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// True when the management API reported that the addressed resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }
}

pub type Result<T> = result::Result<T, Error>;
