use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /* daemon errors */
    #[error("No Hue bridges found in {0}")]
    NoBridges(Utf8PathBuf),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Entity {entity}: invalid attribute {attribute}: {reason}")]
    InvalidAttribute {
        entity: String,
        attribute: &'static str,
        reason: String,
    },

    #[error("{0}")]
    Service(String),

    /* mapped errors */
    #[error(transparent)]
    Hue(#[from] hue::HueClientError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

impl ApiError {
    pub fn service_error(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    pub fn invalid_attribute(
        entity: impl Into<String>,
        attribute: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            entity: entity.into(),
            attribute,
            reason: reason.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
