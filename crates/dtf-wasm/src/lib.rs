// WASM bindings for the dynamic form traversal engine.
//
// Provides a `WasmFormSession` class exported via wasm-bindgen that wraps
// the `FormSession` from dtf-engine, and a `WasmDraftTracker` for unsaved
// change detection. Templates, choices, instructions and decisions cross the
// boundary as plain JavaScript objects using serde-wasm-bindgen.
//
// Usage from JavaScript:
//
//   const session = new WasmFormSession(template, savedResponse);
//   session.start();                          // => [{ type: "render", viewId: 1, ... }, ...]
//   session.choose({ sequenceNumber: 2, choiceIndex: 1,
//                    branchTargetSequenceNumber: 5, viewId: 2 });
//                                             // => { branchTargetId: 5, selectedViewId: 2, ... }
//   session.pump();                           // => [{ type: "render", ... }, { type: "complete" }]
//   session.setValue(1, "ACME Freight");
//   session.renderedFields();                 // => [{ sequenceNumber: 1, ... }, ...]
//   session.close();

use serde::Serialize;
use wasm_bindgen::prelude::*;

use dtf_core::{FieldDefinition, FormChoice, FormTemplate, UiResponse};
use dtf_engine::{DraftSnapshot, DraftTracker, EngineError, FormSession, SessionState};

// ============================================================================
// Serde-serializable DTO types for JS interop
// ============================================================================

/// Serializable representation of the session state.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsSessionState {
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    view_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

// ============================================================================
// Conversion helpers
// ============================================================================

fn state_to_js(state: &SessionState) -> JsSessionState {
    let (name, sequence_number, view_id, error) = match state {
        SessionState::Idle => ("idle", None, None, None),
        SessionState::Rendering(seq) => ("rendering", Some(*seq), None, None),
        SessionState::AwaitingResponse {
            sequence_number,
            view_id,
        } => ("awaitingResponse", Some(*sequence_number), Some(*view_id), None),
        SessionState::Completed => ("completed", None, None, None),
        SessionState::Errored(e) => ("errored", None, None, Some(e.to_string())),
        SessionState::Closed => ("closed", None, None, None),
    };
    JsSessionState {
        state: name,
        sequence_number,
        view_id,
        error,
    }
}

fn engine_error_to_js(e: EngineError) -> JsError {
    JsError::new(&e.to_string())
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsError::new(&e.to_string()))
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, JsError> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsError::new(&e.to_string()))
}

fn snapshot_from_js(fields: JsValue, recipients: Vec<String>) -> Result<DraftSnapshot, JsError> {
    let fields: Vec<FieldDefinition> = from_js(fields)?;
    Ok(DraftSnapshot::new(fields, recipients))
}

// ============================================================================
// WasmFormSession
// ============================================================================

/// One traversal of a form template for a web renderer.
#[wasm_bindgen]
pub struct WasmFormSession {
    session: FormSession,
}

#[wasm_bindgen]
impl WasmFormSession {
    /// Create a session from a template object.
    ///
    /// - `template`: `{ formId, name, fields: [...] }`
    /// - `response`: saved response `{ [fieldId]: [values...] }` used to
    ///   pre-fill rendered fields (optional)
    #[wasm_bindgen(constructor)]
    pub fn new(template: JsValue, response: Option<JsValue>) -> Result<WasmFormSession, JsError> {
        let template: FormTemplate = from_js(template)?;
        let mut session = FormSession::new(template);
        if let Some(response) = response {
            let response: UiResponse = from_js(response)?;
            session = session.with_response(&response);
        }
        Ok(WasmFormSession { session })
    }

    /// Render until the first unanswered choice or the end of the form.
    ///
    /// Returns an array of instruction objects tagged by `type`
    /// ("render", "remove", "complete", "errored").
    pub fn start(&mut self) -> Result<JsValue, JsError> {
        let instructions = self.session.start().map_err(engine_error_to_js)?;
        to_js(&instructions)
    }

    /// Resolve a driver choice without applying it.
    ///
    /// Returns the decision object; `-1` marks absent fields.
    pub fn choose(&mut self, choice: JsValue) -> Result<JsValue, JsError> {
        let choice: FormChoice = from_js(choice)?;
        let decision = self.session.choose(&choice).map_err(engine_error_to_js)?;
        to_js(&decision)
    }

    /// Apply the pending decision and return the resulting instructions.
    pub fn pump(&mut self) -> Result<JsValue, JsError> {
        to_js(&self.session.pump())
    }

    /// Resolve and apply a driver choice in one call.
    pub fn answer(&mut self, choice: JsValue) -> Result<JsValue, JsError> {
        let choice: FormChoice = from_js(choice)?;
        let instructions = self.session.answer(&choice).map_err(engine_error_to_js)?;
        to_js(&instructions)
    }

    /// Record a value typed into a rendered non-choice field.
    #[wasm_bindgen(js_name = "setValue")]
    pub fn set_value(&mut self, view_id: u32, value: String) -> Result<(), JsError> {
        self.session
            .set_value(view_id, value)
            .map_err(engine_error_to_js)
    }

    /// Decision published by `choose` and not yet applied, or null.
    #[wasm_bindgen(js_name = "pendingDecision")]
    pub fn pending_decision(&self) -> Result<JsValue, JsError> {
        match self.session.pending_decision() {
            Some(decision) => to_js(&decision),
            None => Ok(JsValue::NULL),
        }
    }

    /// Current state as `{ state, sequenceNumber?, viewId?, error? }`.
    pub fn state(&self) -> Result<JsValue, JsError> {
        to_js(&state_to_js(self.session.state()))
    }

    /// Field instances currently alive, in rendering order.
    #[wasm_bindgen(js_name = "renderedFields")]
    pub fn rendered_fields(&self) -> Result<JsValue, JsError> {
        let arr = js_sys::Array::new();
        for view in self.session.rendered_views() {
            arr.push(&to_js(&view.field)?);
        }
        Ok(arr.into())
    }

    /// Stop the session and release its loop stacks.
    pub fn close(&mut self) {
        self.session.close();
    }

    /// Release resources held by this instance.
    ///
    /// After calling this method, the instance should not be used.
    pub fn terminate(self) {
        // Drop self, releasing all resources.
    }

    // =========================================================================
    // Option setters
    // =========================================================================

    /// Set whether optional, non-branching choices pause traversal.
    #[wasm_bindgen(js_name = "setGateOptionalChoices")]
    pub fn set_gate_optional_choices(&mut self, value: bool) {
        self.session.set_gate_optional_choices(value);
    }

    /// Set whether fields skipped by a forward branch are emitted suppressed.
    #[wasm_bindgen(js_name = "setEmitSkippedFields")]
    pub fn set_emit_skipped_fields(&mut self, value: bool) {
        self.session.set_emit_skipped_fields(value);
    }

    /// Set the maximum number of views rendered in one session.
    #[wasm_bindgen(js_name = "setMaxRenderedViews")]
    pub fn set_max_rendered_views(&mut self, value: usize) {
        self.session.set_max_rendered_views(value);
    }
}

// ============================================================================
// WasmDraftTracker
// ============================================================================

/// Unsaved-change detection against the last saved snapshot.
#[wasm_bindgen]
pub struct WasmDraftTracker {
    tracker: DraftTracker,
}

#[wasm_bindgen]
impl WasmDraftTracker {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmDraftTracker {
        WasmDraftTracker {
            tracker: DraftTracker::new(),
        }
    }

    /// Record the given fields and recipients as the last saved state.
    pub fn capture(&mut self, fields: JsValue, recipients: Vec<String>) -> Result<(), JsError> {
        self.tracker.capture(snapshot_from_js(fields, recipients)?);
        Ok(())
    }

    /// Record the session's rendered fields as the last saved state.
    #[wasm_bindgen(js_name = "captureSession")]
    pub fn capture_session(&mut self, session: &WasmFormSession, recipients: Vec<String>) {
        self.tracker
            .capture(session.session.draft_snapshot(recipients));
    }

    /// Whether the given fields differ from the saved state.
    #[wasm_bindgen(js_name = "hasSomethingToDraft")]
    pub fn has_something_to_draft(
        &self,
        fields: JsValue,
        recipients: Vec<String>,
        check_recipients: bool,
    ) -> Result<bool, JsError> {
        let current = snapshot_from_js(fields, recipients)?;
        Ok(self.tracker.has_something_to_draft(&current, check_recipients))
    }
}

impl Default for WasmDraftTracker {
    fn default() -> Self {
        Self::new()
    }
}
