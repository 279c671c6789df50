//! Shared data model for dynamic form templates.
//!
//! A form template is an ordered list of field definitions that doubles as a
//! small program: plain fields render in order, multiple-choice fields can
//! branch, and loop-start/loop-end markers delimit repeated regions. This crate
//! holds the types shared by the traversal engine and its bindings.
//!
//! # Architecture
//!
//! - [`field`] -- Field kinds, capabilities and field definitions
//! - [`choice`] -- Selectable choices and driver choice events
//! - [`template`] -- Ordered field list with sequence-number addressing
//! - [`response`] -- Previously entered values used to pre-populate a form
//! - [`decision`] -- Boundary traversal decision (`-1` means "none")
//! - [`instruction`] -- Render/remove instructions sent to the host renderer
//! - [`error`] -- Data-integrity errors

pub mod choice;
pub mod decision;
pub mod error;
pub mod field;
pub mod instruction;
pub mod response;
pub mod template;

pub use choice::{Choice, FormChoice};
pub use decision::TraversalDecision;
pub use error::FormError;
pub use field::{AutoKind, FieldDefinition, FieldId, FieldKind, SequenceNumber, ViewId};
pub use instruction::{Attachment, RenderInstruction};
pub use response::UiResponse;
pub use template::FormTemplate;
