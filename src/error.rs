//! Error types for the fortune bot

use thiserror::Error;

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while producing or posting a fortune
#[derive(Error, Debug)]
pub enum Error {
    /// Required configuration is missing or malformed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The shell command could not be started or waited on
    #[error("Command execution failed: {0}")]
    Command(String),

    /// Failed to lay out or draw the text
    #[error("Rendering failed: {0}")]
    Render(String),

    /// Failed to encode the canvas as PNG
    #[error("PNG encoding failed: {0}")]
    Encode(String),

    /// Transport-level failure (connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-2xx status
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// A 2xx response whose body is not the expected JSON
    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Failures of the render step (exit code 4).
    pub fn is_render_failure(&self) -> bool {
        matches!(self, Error::Render(_) | Error::Encode(_))
    }

    /// Failures of the upload request itself (exit code 5).
    ///
    /// Status and body-decoding errors fall in the same category as transport
    /// errors, the way a single HTTP client error type would report them.
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::HttpStatus { .. } | Error::InvalidResponse(_)
        )
    }
}
