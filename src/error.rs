use std::path::PathBuf;
use thiserror::Error;

use crate::client::VendorError;

/// Errors surfaced to callers of the dispatcher.
///
/// Transient vendor failures never show up here unless retries run out, and
/// context-length failures are downgraded to an entry with a null response.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Configuration { message: String, path: Option<PathBuf> },

    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),

    #[error("Invalid request parameters: {0}")]
    Validation(String),

    #[error("API request failed: {0}")]
    Api(VendorError),

    #[error("API failed {attempts} times for this request, please try again later (last error: {last_error})")]
    RetriesExhausted { attempts: u32, last_error: VendorError },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Error::Configuration {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
