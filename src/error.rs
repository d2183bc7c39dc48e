//! Error types for gmail-archiver

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or unreadable client configuration, bad settings.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Gmail API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Gmail service unavailable ({status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors after which no further requests should be issued in this run.
    pub fn halts_run(&self) -> bool {
        matches!(
            self,
            Error::RateLimited(_) | Error::ServiceUnavailable { .. } | Error::Authorization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
