//! Traversal engine for dynamic form templates.
//!
//! Walks a [`dtf_core::FormTemplate`] as a small program: plain fields are
//! emitted in order, multiple-choice answers may branch, and loop regions
//! repeat under a per-view stack of loop frames. A separate draft diff
//! decides whether an in-progress form differs from its saved snapshot.
//!
//! # Architecture
//!
//! - [`loop_stack`] -- Loop frames and the per-view stack map
//! - [`resolver`] -- Branch resolution for driver choices and loop ends
//! - [`slot`] -- Single pending-decision hand-off (last write wins)
//! - [`prefill`] -- Pre-population of values from an earlier response
//! - [`session`] -- The traversal state machine driving a renderer
//! - [`draft`] -- Unsaved-change detection against a saved snapshot
//! - [`options`] -- Session configuration

pub mod draft;
pub mod error;
pub mod loop_stack;
pub mod options;
pub mod prefill;
pub mod resolver;
pub mod session;
pub mod slot;

pub use draft::{DraftSnapshot, DraftTracker};
pub use error::EngineError;
pub use loop_stack::{LoopFrame, LoopStack, ViewFieldStackMap};
pub use options::SessionOptions;
pub use resolver::{Branch, Resolution};
pub use session::{FormSession, RenderedView, SessionState};
