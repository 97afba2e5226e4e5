//! Error types for followgraph
//!
//! Setup and read-path failures use [`FollowGraphError`]. Per-item mutation
//! failures never surface here: they are captured as
//! [`MutationOutcome`](crate::integrations::MutationOutcome) values.

use thiserror::Error;

/// Result type alias for followgraph operations
pub type Result<T> = std::result::Result<T, FollowGraphError>;

/// Error type for followgraph operations
#[derive(Error, Debug)]
pub enum FollowGraphError {
    /// Configuration errors (missing token, invalid batch size)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP errors
    #[error("Network error: {0}")]
    Network(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Unexpected status from the GitHub API
    #[error("GitHub API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// User or resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited (seconds until the limit resets)
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl crate::integrations::retry::RetryableError for FollowGraphError {
    fn retry_decision(&self) -> crate::integrations::retry::RetryDecision {
        use crate::integrations::retry::RetryDecision;
        use std::time::Duration;

        match self {
            FollowGraphError::Network(_) => RetryDecision::Retry,
            FollowGraphError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else if let Some(status) = e.status() {
                    status_retry_decision(status.as_u16())
                } else if e.is_decode() {
                    RetryDecision::NoRetry
                } else {
                    RetryDecision::Retry
                }
            }
            FollowGraphError::Api { status, .. } => status_retry_decision(*status),
            FollowGraphError::RateLimited(secs) => {
                RetryDecision::RetryAfter(Duration::from_secs(*secs))
            }
            FollowGraphError::Config(_)
            | FollowGraphError::Io(_)
            | FollowGraphError::Auth(_)
            | FollowGraphError::Json(_)
            | FollowGraphError::Yaml(_)
            | FollowGraphError::NotFound(_)
            | FollowGraphError::Other(_) => RetryDecision::NoRetry,
        }
    }
}

fn status_retry_decision(status: u16) -> crate::integrations::retry::RetryDecision {
    use crate::integrations::retry::RetryDecision;
    use std::time::Duration;

    match status {
        429 => RetryDecision::RetryAfter(Duration::from_secs(60)),
        500..=599 => RetryDecision::Retry,
        _ => RetryDecision::NoRetry,
    }
}
