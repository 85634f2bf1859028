/*!
 * Error types for the subchain application.
 *
 * This module contains custom error types for the different layers of the
 * application, using the thiserror crate for ergonomic error definitions:
 * - `ServiceError`: failures talking to a backend collaborator
 * - `GameError`: session-level failures and rejected transitions
 * - `AppError`: top-level wrapper used by the binary
 */

use thiserror::Error;

use crate::game::session::SessionState;

/// Errors that can occur when calling a backend collaborator
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Error when sending a request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing a response body fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the backend itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the backend
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The configured endpoint cannot be used as a base URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Errors raised by the session engine and the candidate sources
#[derive(Error, Debug)]
pub enum GameError {
    /// No corpus partition is selected, nothing can be fetched
    #[error("No corpus selected, select at least one corpus")]
    EmptyCorpusSelection,

    /// The sentence has no usable trailing character after filler stripping
    #[error("No anchor character in sentence: {text:?}")]
    NoAnchorChar {
        /// The offending sentence text
        text: String,
    },

    /// A collaborator call failed
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(#[from] ServiceError),

    /// The action is not allowed in the current state
    #[error("Cannot {action} while {state:?}")]
    InvalidTransition {
        /// Name of the rejected action
        action: &'static str,
        /// State the session was in
        state: SessionState,
    },

    /// Confirmation attempted while the pending clip is loading or failed
    #[error("Pending clip is not ready")]
    ClipNotReady,

    /// Export attempted with too few accumulated clips
    #[error("Export needs at least {required} clips, have {available}")]
    NotEnoughClips {
        /// Minimum number of clips
        required: usize,
        /// Clips currently accumulated
        available: usize,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a backend collaborator
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Error from the session engine
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}
