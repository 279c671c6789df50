// Data-integrity errors raised by the form model.

use crate::field::SequenceNumber;

/// A template references something it does not contain.
///
/// These errors mean the template itself is malformed. They are never
/// retried; the traversal session turns them into an error state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("sequence number {0} not found in template")]
    NotFound(SequenceNumber),

    #[error("sequence number {0} appears more than once in template")]
    DuplicateSequenceNumber(SequenceNumber),

    #[error("field {0} is not a loop start")]
    NotALoopStart(SequenceNumber),

    #[error("loop starting at {0} has no matching loop end")]
    UnterminatedLoop(SequenceNumber),

    #[error("loop starting at {start} names {end} as its end, which is not a loop end after it")]
    LoopEndMismatch {
        start: SequenceNumber,
        end: SequenceNumber,
    },

    #[error("choice {choice_index} of field {sequence_number} branches to missing field {target}")]
    ChoiceBranchNotFound {
        sequence_number: SequenceNumber,
        choice_index: usize,
        target: SequenceNumber,
    },
}
