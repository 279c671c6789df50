// Boundary form of a traversal decision.
//
// Hosts exchange decisions as five integers where -1 means "none". Inside the
// engine decisions are tagged variants; this type only exists at the edge.

use serde::{Deserialize, Serialize};

use crate::field::{SequenceNumber, ViewId};

/// Sentinel for "no value" in boundary decisions.
pub const NONE: i64 = -1;

/// Outcome of resolving one driver choice, in the host's wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalDecision {
    pub branch_target_id: i64,
    pub selected_view_id: i64,
    pub loop_end_id: i64,
    pub actual_loop_count: i64,
    pub current_loop_count: i64,
}

impl Default for TraversalDecision {
    /// No pending decision: every slot is -1.
    fn default() -> Self {
        Self {
            branch_target_id: NONE,
            selected_view_id: NONE,
            loop_end_id: NONE,
            actual_loop_count: NONE,
            current_loop_count: NONE,
        }
    }
}

impl TraversalDecision {
    /// Build a decision from optional parts, mapping `None` to -1.
    pub fn new(
        branch_target: Option<SequenceNumber>,
        selected_view: Option<ViewId>,
        loop_end: Option<SequenceNumber>,
        actual_loop_count: Option<i32>,
        current_loop_count: Option<i32>,
    ) -> Self {
        Self {
            branch_target_id: branch_target.map_or(NONE, i64::from),
            selected_view_id: selected_view.map_or(NONE, i64::from),
            loop_end_id: loop_end.map_or(NONE, i64::from),
            actual_loop_count: actual_loop_count.map_or(NONE, i64::from),
            current_loop_count: current_loop_count.map_or(NONE, i64::from),
        }
    }

    /// Whether this decision carries anything to act on.
    pub fn is_pending(&self) -> bool {
        self.selected_view_id != NONE
    }

    /// Whether the decision carries loop bookkeeping.
    pub fn is_loop(&self) -> bool {
        self.actual_loop_count != NONE
    }
}
