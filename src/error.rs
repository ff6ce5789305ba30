//! Error types shared by the gateway, the stores and the command layer.
//!
//! Transport failures, non-success statuses and empty lookups are all
//! surfaced through the same `Error` so callers can show one message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response (connection refused, DNS, ...).
    #[error("network error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("server responded with {status}: {message}")]
    Status { status: u16, message: String },

    /// A lookup came back empty.
    #[error("{0}")]
    NotFound(String),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Input rejected before anything was sent.
    #[error("{0}")]
    Invalid(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Error::Status {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            },
            None if e.is_decode() => Error::Transport(format!("could not decode body: {e}")),
            None => Error::Transport(e.to_string()),
        }
    }
}

impl Error {
    /// True when the API reported that the addressed resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Status { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_includes_code() {
        let e = Error::Status { status: 500, message: "boom".into() };
        assert_eq!(e.to_string(), "server responded with 500: boom");
    }

    #[test]
    fn test_not_found_detection() {
        assert!(Error::NotFound("Invalid credentials".into()).is_not_found());
        assert!(Error::Status { status: 404, message: "Not Found".into() }.is_not_found());
        assert!(!Error::Transport("refused".into()).is_not_found());
    }
}
