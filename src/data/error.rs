use std::error::Error as _;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(std::io::Error),
    #[error("{0}")]
    Csv(csv::Error),
    #[error("{0}")]
    Json(serde_json::Error),
    #[error("{}", describe(.0))]
    Http(reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid base URL {0:?}")]
    InvalidUrl(String),
    #[error("pagination does not terminate: next_url repeated after {pages} pages")]
    RepeatedPage { pages: usize },
}

// reqwest keeps the interesting part (timeout, DNS, TLS) in the source chain
fn describe(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        // Request URLs carry the API key
        Self::Http(e.without_url())
    }
}
