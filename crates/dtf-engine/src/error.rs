// Engine error type.

use dtf_core::{FormError, SequenceNumber, ViewId};

/// Errors raised while resolving choices or driving a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The template references a field it does not contain.
    #[error("malformed form template: {0}")]
    DataIntegrity(#[from] FormError),

    /// A choice was reported for a view that was not rendered from a
    /// multiple-choice field.
    #[error("view {view_id} has no loop stack for field {sequence_number}")]
    InvalidViewState {
        view_id: ViewId,
        sequence_number: SequenceNumber,
    },

    #[error("choice {choice_index} out of range for field {sequence_number} ({available} choices)")]
    ChoiceOutOfRange {
        sequence_number: SequenceNumber,
        choice_index: usize,
        available: usize,
    },

    #[error("no rendered view {0}")]
    NoSuchView(ViewId),

    #[error("session already started")]
    AlreadyStarted,

    #[error("session is closed")]
    SessionClosed,

    #[error("session stopped after an error")]
    SessionErrored,

    #[error("more than {limit} views rendered in one session")]
    TraversalLimitExceeded { limit: usize },
}

impl EngineError {
    /// Whether the error ends the session rather than just the current call.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::DataIntegrity(_) | EngineError::TraversalLimitExceeded { .. }
        )
    }
}
