//! Error types for the remote compute client.

use thiserror::Error;

/// Errors produced by the remote compute client.
///
/// Transient failures (timeouts, connection resets, 5xx) are distinguished
/// from permanent rejections so callers can retry the former and surface the
/// latter immediately.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("platform rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transient platform error: {0}")]
    Transient(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Whether retrying the operation later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result alias for remote operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::Transient("503".into()).is_transient());
        assert!(!Error::Rejected {
            status: 400,
            message: "bad region".into()
        }
        .is_transient());
        assert!(!Error::Auth("expired".into()).is_transient());
    }
}
