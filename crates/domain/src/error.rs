/// Shared error type used across all gardena crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("authentication: {0}")]
    Authentication(String),

    /// The resource API answered with an unexpected status. `body` holds the
    /// raw response payload for inspection.
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: serde_json::Value },

    #[error("validation: {0}")]
    Validation(String),

    /// A response body did not have the expected JSON:API shape.
    #[error("decode: {0}")]
    Decode(String),

    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status carried by an [`Error::Api`], if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
