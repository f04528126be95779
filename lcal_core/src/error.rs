//! Errors of the calendar pipeline.

use thiserror::Error;

/// Errors that can occur while generating a calendar.
#[derive(Error, Debug)]
pub enum Error {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse failed: {0}")]
    Parse(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("invalid pattern: {0}")]
    Pattern(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors of a single outbound request.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("{url} was still loading after {attempts} attempts")]
    StillLoading { url: String, attempts: u32 },
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Pattern(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
