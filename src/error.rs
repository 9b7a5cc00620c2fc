// src/error.rs
//! Typed errors for the boundaries where callers branch on the failure kind.
//! Everything above these boundaries propagates with `anyhow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The shared cancellation token fired while waiting (throttle, fetch).
    #[error("operation cancelled")]
    Cancelled,

    /// The search backend answered with an error document.
    #[error("search backend error ({status}): {body}")]
    Backend { status: u16, body: String },

    /// The destination returned a structured JSON:API error.
    #[error("destination API error ({status}): {title} - {detail}")]
    Api {
        status: u16,
        title: String,
        detail: String,
    },

    /// The destination returned an error status without a parseable error body.
    #[error("destination API error: {status}")]
    Status { status: String },

    #[error("decode response: {0}")]
    Decode(String),

    #[error("http request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("duplicate store: {0}")]
    Store(String),
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

impl From<redis::RedisError> for SyncError {
    fn from(e: redis::RedisError) -> Self {
        SyncError::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_carries_title_and_detail() {
        let e = SyncError::Api {
            status: 422,
            title: "Unprocessable Entity".into(),
            detail: "title: This value should not be null.".into(),
        };
        assert_eq!(
            e.to_string(),
            "destination API error (422): Unprocessable Entity - title: This value should not be null."
        );
        assert!(!e.is_cancelled());
        assert!(SyncError::Cancelled.is_cancelled());
    }
}
