//! Error types for rsload.
//!
//! Defines the run-fatal error enum used throughout the application. Per-query
//! failures reported by the target (timeouts, throttling, server errors) are
//! not errors here; they are classified into [`crate::query::Outcome`] values.

use thiserror::Error;

/// Main error type for rsload operations.
#[derive(Error, Debug)]
pub enum RsloadError {
    /// Configuration errors (invalid config file, missing credential, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport faults talking to the target (DNS, TLS, refused connection, auth at preflight)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The target answered but the body could not be interpreted.
    #[error("Response error: {0}")]
    Response(String),

    /// Report output errors (CSV files, output directory).
    #[error("Output error: {0}")]
    Output(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RsloadError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a response error with the given message.
    pub fn response(msg: impl Into<String>) -> Self {
        Self::Response(msg.into())
    }

    /// Creates an output error with the given message.
    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Connection(_) => "Connection Error",
            Self::Response(_) => "Response Error",
            Self::Output(_) => "Output Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Classifies a [`reqwest::Error`] raised before a status was received.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::connection(format!("Request timed out in transport: {err}"))
        } else if err.is_connect() {
            Self::connection(format!("Failed to connect to target: {err}"))
        } else {
            Self::connection(format!("Request failed: {err}"))
        }
    }
}

impl From<csv::Error> for RsloadError {
    fn from(err: csv::Error) -> Self {
        Self::output(err.to_string())
    }
}

/// Result type alias using RsloadError.
pub type Result<T> = std::result::Result<T, RsloadError>;
