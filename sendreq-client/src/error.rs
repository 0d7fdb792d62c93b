use std::time::Duration;
use thiserror::Error;

/// Why a single request did not produce a full response.
///
/// Errors are stored as rendered messages so results stay cheap to clone and compare.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Http(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed reading response body: {0}")]
    Body(String),
}

impl RequestError {
    pub(crate) fn from_hyper(e: &hyper::Error) -> RequestError {
        if e.is_connect() {
            RequestError::Connect(e.to_string())
        } else {
            RequestError::Http(e.to_string())
        }
    }
}
