use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandoverError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Failed to initialize database: {0}")]
    DatabaseInitializationError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("HTTP transport error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Email provider rejected request ({status}): {body}")]
    ProviderError { status: u16, body: String },
}
