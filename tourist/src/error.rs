use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}: {1}")]
    Context(String, Box<Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid status code: {0}")]
    InvalidStatus(u16),

    #[error("Request returned an invalid response")]
    InvalidResponse,

    #[error("No data in response")]
    NoData,

    #[error("Could not parse the data as JSON ({} bytes): {source}", .payload.len())]
    Decode {
        source: serde_json::Error,
        payload: Bytes,
    },

    #[error("Malformed search response: {0}")]
    MalformedSearchResponse(String),

    #[error("Api error {code}: {message}")]
    ApiError { code: i64, message: String },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Url parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Tokio task-related error: {0}")]
    Tokio(String),

    #[error("Database error: {0}")]
    DbError(String),

    #[error("Format error: {0}")]
    FormatError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Inconsistent task state: {0}")]
    InconsistentTask(String),

    #[error("Pipeline of pin {0} was cancelled")]
    Cancelled(i64),

    #[error("An unexpected error occurred: {0}")]
    Other(String),
}

impl<T> From<SendError<T>> for Error {
    fn from(e: SendError<T>) -> Self {
        Error::Tokio(e.to_string())
    }
}

pub trait Context<T, E> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e.into())))
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
