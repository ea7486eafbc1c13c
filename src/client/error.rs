use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::util::sanitize_error;

/// Error body returned by the CloudAPI on failure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub minor_error_code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error {status} ({minor_code}): {message}")]
    Api {
        status: StatusCode,
        minor_code: String,
        message: String,
    },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("found {count} entities of type {kind} named '{name}'")]
    Ambiguous {
        kind: &'static str,
        name: String,
        count: usize,
    },

    #[error("login failed: {message}")]
    Login { message: String },

    #[error("login response did not carry the {0} header")]
    MissingAccessToken(&'static str),

    #[error("token file {path}: {message}")]
    TokenFile { path: String, message: String },

    #[error("task {task} failed: {message}")]
    Task { task: String, message: String },
}

impl ClientError {
    pub fn api(status: StatusCode, body: ApiErrorBody) -> Self {
        Self::Api {
            status,
            minor_code: body.minor_error_code,
            message: body.message,
        }
    }

    /// Text safe to show in a diagnostic.
    ///
    /// Only bodies written by the server are scrubbed: they may echo the
    /// submitted credentials. Local errors keep paths and URLs intact.
    pub fn redacted(&self) -> String {
        match self {
            Self::Api {
                status,
                minor_code,
                message,
            } => format!("API error {status} ({minor_code}): {}", sanitize_error(message)),
            Self::Login { message } => format!("login failed: {}", sanitize_error(message)),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api {
                status, minor_code, ..
            } => *status == StatusCode::NOT_FOUND || minor_code == "NOT_FOUND",
            _ => false,
        }
    }

    /// The server is holding a lock on the entity; the same request may succeed later.
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Api {
                status, minor_code, ..
            } => *status == StatusCode::SERVICE_UNAVAILABLE || minor_code == "BUSY_ENTITY",
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
