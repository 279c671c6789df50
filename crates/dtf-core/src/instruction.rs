// Instructions sent from the traversal session to the host renderer.

use serde::{Deserialize, Serialize};

use crate::field::{FieldDefinition, ViewId};

/// Whether a freshly built view is attached to the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attachment {
    /// Show the view now.
    Attach,
    /// Keep the view for its value but do not show it (skipped by a branch).
    Suppressed,
}

/// One step of output from a traversal session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RenderInstruction {
    /// Build a view for `field` under `view_id`.
    #[serde(rename_all = "camelCase")]
    Render {
        view_id: ViewId,
        field: FieldDefinition,
        attachment: Attachment,
    },
    /// Drop every view whose id is `from_view_id` or greater.
    #[serde(rename_all = "camelCase")]
    Remove { from_view_id: ViewId },
    /// No field remains to be rendered.
    Complete,
    /// The form cannot be displayed.
    Errored { message: String },
}

impl RenderInstruction {
    /// View id of a render instruction.
    pub fn rendered_view(&self) -> Option<ViewId> {
        match self {
            RenderInstruction::Render { view_id, .. } => Some(*view_id),
            _ => None,
        }
    }
}
