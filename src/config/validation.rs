//! Configuration validation
//!
//! Collects every problem in a [`FollowGraphConfig`] instead of stopping at
//! the first one, so `followgraph` can report them together at startup.

use super::followgraph_config::FollowGraphConfig;
use crate::FollowGraphError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a followgraph configuration
pub fn validate_config(config: &FollowGraphConfig) -> ValidationResult {
    let mut errors = Vec::new();

    let url = config.github.api_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        errors.push(ValidationError::new(
            "github.api_url",
            format!("Invalid URL '{}': must start with http:// or https://", url),
        ));
    }

    if config.github.token_env.trim().is_empty() {
        errors.push(ValidationError::new(
            "github.token_env",
            "Token environment variable name must not be empty",
        ));
    }

    if let Some(ref name) = config.github.username {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(
                "github.username",
                "Username must not be blank when set",
            ));
        }
    }

    if config.batch.batch_size == 0 {
        errors.push(ValidationError::new(
            "batch.batch_size",
            "Batch size must be greater than 0",
        ));
    }

    if !(1..=100).contains(&config.batch.page_size) {
        errors.push(ValidationError::new(
            "batch.page_size",
            format!(
                "Page size {} out of range (1-100)",
                config.batch.page_size
            ),
        ));
    }

    if config.batch.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "batch.request_timeout_secs",
            "Request timeout must be greater than 0",
        ));
    }

    if config.consistency.max_consistency_attempts == 0 {
        errors.push(ValidationError::new(
            "consistency.max_consistency_attempts",
            "At least one consistency check attempt is required",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate and fold all errors into a single [`FollowGraphError::Config`]
pub fn validate_config_result(config: &FollowGraphConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let joined = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        FollowGraphError::Config(joined)
    })
}
