//! Error Types
//!
//! Errors surfaced by the conversation engine. Transport-level failures live in
//! [`crate::backend::BackendError`] and are mapped into [`ChatError`] by the
//! request controller once a request settles.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors from the conversation engine
#[derive(Debug, Error)]
pub enum ChatError {
    /// A request was started while another one is still live
    #[error("a request is already in flight")]
    AlreadyInFlight,

    /// The user aborted the in-flight request
    #[error("request cancelled by user")]
    UserAbort,

    /// The backend could not be reached or returned an unreadable body
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The backend answered with a structured error
    #[error("{0}")]
    BackendError(String),

    /// Insights polling ran out of attempts
    #[error("insights did not arrive after {attempts} attempts")]
    EnrichmentTimeout {
        /// Number of status checks made
        attempts: u32,
    },

    /// The insights job reported a failure
    #[error("insights unavailable: {0}")]
    EnrichmentError(String),

    /// Message text was empty or whitespace
    #[error("message cannot be empty")]
    EmptyMessage,

    /// Message text exceeded the configured limit
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),

    /// An edit was committed while no turn is editable
    #[error("no turn is currently editable")]
    NoEditableTurn,
}

impl ChatError {
    /// Whether this error should be shown to the user at all
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::AlreadyInFlight | Self::UserAbort)
    }

    /// Whether this error is recorded in conversation history as an assistant turn
    #[must_use]
    pub fn is_recorded_in_history(&self) -> bool {
        matches!(self, Self::BackendError(_))
    }
}

impl From<BackendError> for ChatError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Status { detail, .. } => Self::BackendError(detail),
            BackendError::Transport(msg) | BackendError::Decode(msg) => {
                Self::TransportFailure(msg)
            }
        }
    }
}

/// Result alias for engine operations
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(
            ChatError::AlreadyInFlight.to_string(),
            "a request is already in flight"
        );
        assert_eq!(
            ChatError::BackendError("Missing X-OpsFlo-Env header".to_string()).to_string(),
            "Missing X-OpsFlo-Env header"
        );
        assert_eq!(
            ChatError::EnrichmentTimeout { attempts: 20 }.to_string(),
            "insights did not arrive after 20 attempts"
        );
        assert_eq!(
            ChatError::MessageTooLong(4000).to_string(),
            "message exceeds maximum length of 4000 characters"
        );
    }

    #[test]
    fn test_visibility_and_history_policy() {
        assert!(!ChatError::AlreadyInFlight.is_user_visible());
        assert!(!ChatError::UserAbort.is_user_visible());
        assert!(ChatError::TransportFailure("refused".into()).is_user_visible());

        assert!(ChatError::BackendError("bad".into()).is_recorded_in_history());
        assert!(!ChatError::TransportFailure("refused".into()).is_recorded_in_history());
        assert!(!ChatError::EnrichmentError("boom".into()).is_recorded_in_history());
    }

    #[test]
    fn test_from_backend_error() {
        let err: ChatError = BackendError::Status {
            status: 422,
            detail: "query too vague".to_string(),
        }
        .into();
        assert!(matches!(err, ChatError::BackendError(ref d) if d == "query too vague"));

        let err: ChatError = BackendError::Transport("connection refused".to_string()).into();
        assert!(matches!(err, ChatError::TransportFailure(_)));

        let err: ChatError = BackendError::Decode("expected value".to_string()).into();
        assert!(matches!(err, ChatError::TransportFailure(_)));
    }
}
