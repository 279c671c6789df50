// Field kinds and field definitions.
//
// A field definition is both a thing the driver fills in and an instruction
// for the traversal engine: multiple-choice fields may branch, loop markers
// delimit repeated regions.

use serde::{Deserialize, Serialize};

use crate::choice::Choice;

/// Position identity of a field within its template (a.k.a. qnum).
pub type SequenceNumber = u32;

/// Stable identity of a field across responses.
pub type FieldId = u32;

/// Session-unique identity of one rendered field instance.
pub type ViewId = u32;

/// Values filled in by the host without driver interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AutoKind {
    DriverName,
    Date,
    VehicleLocation,
    VehicleLatLong,
    VehicleOdometer,
    VehicleFuel,
}

/// Kind of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    /// Free text entry.
    Text,
    /// Plain integer entry.
    Numeric,
    /// Numeric entry with sign, decimals and thousands separators.
    NumericEnhanced,
    /// Masked text entry.
    Password,
    /// Scanned barcode value(s).
    Barcode,
    /// Date and time picker.
    DateTime,
    /// Single selection from a list of choices, may branch.
    MultipleChoice,
    /// Reference to a captured image.
    ImageReference,
    /// Captured signature.
    SignatureCapture,
    /// Read-only text shown to the driver.
    Display,
    /// Start of a repeated region.
    LoopStart,
    /// End of a repeated region. Never shown to the driver.
    LoopEnd,
    /// Value filled in by the host.
    Auto(AutoKind),
}

impl FieldKind {
    /// Whether the driver is expected to enter a value for this field.
    pub fn needs_driver_input(self) -> bool {
        matches!(
            self,
            FieldKind::Text
                | FieldKind::Numeric
                | FieldKind::NumericEnhanced
                | FieldKind::Password
                | FieldKind::Barcode
                | FieldKind::DateTime
                | FieldKind::MultipleChoice
                | FieldKind::ImageReference
                | FieldKind::SignatureCapture
        )
    }

    /// Whether the field is edited through a text-input style widget.
    pub fn is_text_input_style(self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::Numeric | FieldKind::NumericEnhanced | FieldKind::Password
        )
    }

    /// Whether the host fills the value automatically.
    pub fn is_auto(self) -> bool {
        matches!(self, FieldKind::Auto(_))
    }

    /// Whether the field is a loop-start or loop-end marker.
    pub fn is_loop_marker(self) -> bool {
        matches!(self, FieldKind::LoopStart | FieldKind::LoopEnd)
    }
}

/// One field of a form template.
///
/// Everything except `ui_data` and `view_id` is fixed by the template. Those
/// two change while a session runs; `sequence_number` and `field_id` never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub sequence_number: SequenceNumber,
    pub field_id: FieldId,
    pub kind: FieldKind,

    /// Question text shown next to the input.
    #[serde(default)]
    pub label: String,

    /// Branch target of the currently selected choice, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_target_sequence_number: Option<SequenceNumber>,

    /// Number of passes for a loop region starting at this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_count: Option<i32>,

    /// Sequence number of the loop-end marker closing this loop region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_end_sequence_number: Option<SequenceNumber>,

    #[serde(default)]
    pub required: bool,

    #[serde(default = "default_true")]
    pub driver_editable: bool,

    #[serde(default)]
    pub dispatch_editable: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,

    /// Current driver-entered or pre-filled value.
    #[serde(default)]
    pub ui_data: String,

    /// View of the most recent rendered instance of this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<ViewId>,
}

fn default_true() -> bool {
    true
}

impl FieldDefinition {
    /// Create a driver-editable, optional field with no value.
    pub fn new(sequence_number: SequenceNumber, field_id: FieldId, kind: FieldKind) -> Self {
        Self {
            sequence_number,
            field_id,
            kind,
            label: String::new(),
            branch_target_sequence_number: None,
            loop_count: None,
            loop_end_sequence_number: None,
            required: false,
            driver_editable: true,
            dispatch_editable: false,
            choices: Vec::new(),
            ui_data: String::new(),
            view_id: None,
        }
    }

    /// Create a multiple-choice field.
    pub fn multiple_choice(
        sequence_number: SequenceNumber,
        field_id: FieldId,
        choices: Vec<Choice>,
    ) -> Self {
        Self {
            choices,
            ..Self::new(sequence_number, field_id, FieldKind::MultipleChoice)
        }
    }

    /// Create a loop-start marker repeating its region `loop_count` times.
    pub fn loop_start(
        sequence_number: SequenceNumber,
        field_id: FieldId,
        loop_count: i32,
        loop_end: Option<SequenceNumber>,
    ) -> Self {
        Self {
            loop_count: Some(loop_count),
            loop_end_sequence_number: loop_end,
            ..Self::new(sequence_number, field_id, FieldKind::LoopStart)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.ui_data = value.into();
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_driver_editable(mut self, editable: bool) -> Self {
        self.driver_editable = editable;
        self
    }

    /// Whether any choice of this field carries a branch target.
    pub fn has_branching_choices(&self) -> bool {
        self.choices.iter().any(|c| c.branch_target.is_some())
    }

    /// Index of the choice whose value equals `value`.
    pub fn choice_index_for_value(&self, value: &str) -> Option<usize> {
        self.choices.iter().position(|c| c.value == value)
    }

    /// Whether the driver has not entered anything yet.
    pub fn is_unanswered(&self) -> bool {
        self.ui_data.trim().is_empty()
    }
}
