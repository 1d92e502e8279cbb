//! Error types for inbox triage.

use std::time::Duration;

/// Rule configuration errors. Raised while loading, never per call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Keyword list for signal '{signal}' is empty")]
    EmptyKeywordList { signal: String },

    #[error("No generic response template for intent '{intent}'")]
    MissingTemplate { intent: String },

    #[error("Keyword '{keyword}' appears in both positive and negative lists")]
    OverlappingSentiment { keyword: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed inbound message. The engine rejects rather than guesses.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Message must be a JSON object")]
    NotAnObject,

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Field {field} must be a string")]
    NotAString { field: String },

    #[error("Malformed message: {0}")]
    Malformed(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
