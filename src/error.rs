//! Custom error types for livingreview.
//!
//! Only a few of these ever reach a caller: source failures are absorbed by the
//! fan-out and validation problems degrade a record instead of rejecting it.
//! Storage errors are the ones that always propagate.

use thiserror::Error;

/// Main error type for livingreview operations.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Payload could not be understood
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status from API
        code: i32,
        /// Error message from API
        message: String,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persistence layer failure
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias using `ReviewError`
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| ReviewError::Parse(msg.to_string()))
    }
}
