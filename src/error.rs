//!
//! # Custom Error Handling
//!
//! This module defines the error type `AppError` used throughout the client.
//! Failures that the API contract treats as ordinary outcomes (a rejected
//! request, an unreachable server) are normally recovered into data by the
//! query facade and the managers; `AppError` is what travels below and above
//! that boundary: transport errors inside the HTTP layer, local storage
//! failures, and programmer misuse of a component outside its lifecycle.
//!
//! `From` conversions for `reqwest::Error`, `serde_json::Error`,
//! `std::io::Error` and `validator::ValidationErrors` are derived so the `?`
//! operator works across those boundaries.

use thiserror::Error;
use validator::ValidationErrors;

/// Represents all errors that can occur within the client.
#[derive(Debug, Error)]
pub enum AppError {
    /// No response was obtained: connection refused, DNS failure, timeout,
    /// or a body that could not be read.
    #[error("Transport Error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a status outside the accepted `[200, 500)` range.
    #[error("Server Error: HTTP {status}")]
    Server { status: u16 },

    /// A response body or a stored record was not valid JSON for the expected shape.
    #[error("Decode Error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading or writing durable local storage failed.
    #[error("Storage Error: {0}")]
    Storage(#[from] std::io::Error),

    /// Local input validation failed before any request was made.
    #[error("Validation Error: {0}")]
    Validation(#[from] ValidationErrors),

    /// The configuration is unusable (e.g. an empty base URL).
    #[error("Configuration Error: {0}")]
    Config(String),

    /// A component was used outside its valid lifecycle. This indicates a
    /// wiring bug, not a runtime condition.
    #[error("Misuse: {0}")]
    Misuse(String),
}

impl AppError {
    /// Whether the error came from the network side of the client (and
    /// would therefore be reported to callers as a failed query).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AppError::Transport(_) | AppError::Server { .. } | AppError::Decode(_)
        )
    }
}
