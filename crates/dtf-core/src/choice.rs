// Multiple-choice values and the event the renderer sends when one is picked.

use serde::{Deserialize, Serialize};

use crate::field::{SequenceNumber, ViewId};

/// One selectable value of a multiple-choice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub value: String,

    /// Sequence number to jump to when this choice is selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_target: Option<SequenceNumber>,
}

impl Choice {
    /// A choice that continues with the next field.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            branch_target: None,
        }
    }

    /// A choice that jumps to `target`.
    pub fn branching(value: impl Into<String>, target: SequenceNumber) -> Self {
        Self {
            value: value.into(),
            branch_target: Some(target),
        }
    }
}

/// A driver selection reported by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormChoice {
    pub sequence_number: SequenceNumber,
    pub choice_index: usize,
    #[serde(default)]
    pub branch_target_sequence_number: Option<SequenceNumber>,
    pub view_id: ViewId,
}

impl FormChoice {
    pub fn new(
        sequence_number: SequenceNumber,
        choice_index: usize,
        branch_target_sequence_number: Option<SequenceNumber>,
        view_id: ViewId,
    ) -> Self {
        Self {
            sequence_number,
            choice_index,
            branch_target_sequence_number,
            view_id,
        }
    }
}
