use thiserror::Error;

use crate::api::HueError;

#[derive(Error, Debug)]
pub enum HueClientError {
    #[error("Bridge rejected API key: {0}")]
    Unauthorized(String),

    #[error("Bridge is busy: {0}")]
    BridgeBusy(String),

    #[error("Bridge returned error {}: {} ({})", .0.typ, .0.description, .0.address)]
    Api(HueError),

    #[error("Unexpected status {status} during {action}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        action: String,
    },

    #[error("API key must not be empty")]
    EmptyApiKey,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl HueClientError {
    /// Non-success HTTP statuses are logged and skipped by callers that
    /// tolerate partial scene updates; everything else aborts the pass.
    #[must_use]
    pub const fn is_status_error(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { .. })
    }
}

pub type HueResult<T> = Result<T, HueClientError>;
