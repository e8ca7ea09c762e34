//! Error types for authflow.

use thiserror::Error;

use crate::events::MessageKind;
use crate::session::StoreError;

/// Primary error type for all flow operations.
///
/// Every remote-call failure resolves to exactly one of the five remote
/// kinds ([`ErrorKind`]) before control returns to the caller; the
/// classification lives in the http module.
#[derive(Debug, Error)]
pub enum FlowError {
    /// No response reached the client (connectivity, DNS, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// The backend reported a server-side fault, or returned a payload
    /// this client could not decode.
    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// The backend rejected the session credential (401 class).
    #[error("Unauthorized")]
    Unauthorized,

    /// A client-side precondition failed. Blocks the current step and
    /// never reaches the event bus.
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// The backend handled the request and declined it with a
    /// human-readable reason (wrong password, duplicate account, cooldown).
    #[error("{message}")]
    Business { kind: MessageKind, message: String },

    /// The local session record could not be read or written. Surfaces
    /// like a server fault: blocking, non-retryable.
    #[error("Session storage error: {0}")]
    Storage(String),
}

/// Classification used when deciding state transitions and bus routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Server,
    Auth,
    Validation,
    Business,
}

impl FlowError {
    /// Create a local validation error for the named field.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a server error with the given application status.
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into one of the five remote kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Server { .. } | Self::Storage(_) => ErrorKind::Server,
            Self::Unauthorized => ErrorKind::Auth,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Business { .. } => ErrorKind::Business,
        }
    }

    /// Whether the flow may retry the same step without leaving it.
    pub fn is_retryable_in_place(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::Business)
    }
}

impl From<reqwest::Error> for FlowError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Server {
                status: error.status().map_or(0, |s| s.as_u16()),
                message: error.to_string(),
            }
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<StoreError> for FlowError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, FlowError>;
