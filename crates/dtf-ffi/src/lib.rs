// FFI functions are inherently unsafe: callers must ensure pointer validity.
// Safety contracts are documented per-function in the public API comments.
#![allow(clippy::missing_safety_doc)]

// dtf-ffi: C-compatible FFI layer for FormSession.
//
// This crate exposes a stable C ABI for native hosts (Android/JNI,
// iOS/Swift, etc.). Structured values cross the boundary as UTF-8 JSON
// strings in the same camelCase shape the serde types use.
//
// Memory management rules:
// - Opaque `FormSession` pointer: created by `dtf_session_new`, freed by `dtf_session_free`.
// - Returned strings: caller must free with `dtf_free_str`.
// - All input strings are UTF-8 encoded, null-terminated C strings.

use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;

use serde::Deserialize;
use tracing::warn;

use dtf_core::{FieldDefinition, FormChoice, FormTemplate, UiResponse};
use dtf_engine::{DraftSnapshot, DraftTracker, FormSession};

// ── Session lifecycle ───────────────────────────────────────────

/// Create a traversal session from a template.
///
/// - `template_json`: `{"formId", "name", "fields": [...]}` (required)
/// - `response_json`: saved response `{"fieldId": ["value", ...]}` (optional, NULL to skip)
///
/// Returns an opaque pointer on success, NULL on failure.
/// On failure, if `error_out` is non-NULL, it receives a heap-allocated error string
/// that the caller must free with `dtf_free_str`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_session_new(
    template_json: *const c_char,
    response_json: *const c_char,
    error_out: *mut *mut c_char,
) -> *mut FormSession {
    let template_json = match c_arg(template_json, "template_json") {
        Ok(json) => json,
        Err(e) => {
            report(error_out, e);
            return ptr::null_mut();
        }
    };
    let template: FormTemplate = match serde_json::from_str(template_json) {
        Ok(t) => t,
        Err(e) => {
            report(error_out, format!("invalid template: {e}"));
            return ptr::null_mut();
        }
    };

    let mut session = FormSession::new(template);
    if !response_json.is_null() {
        let parsed = c_arg(response_json, "response_json").and_then(|json| {
            serde_json::from_str::<UiResponse>(json).map_err(|e| format!("invalid response: {e}"))
        });
        match parsed {
            Ok(response) => session = session.with_response(&response),
            Err(e) => {
                report(error_out, e);
                return ptr::null_mut();
            }
        }
    }
    Box::into_raw(Box::new(session))
}

/// Free a session created by `dtf_session_new`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_session_free(session: *mut FormSession) {
    if !session.is_null() {
        drop(unsafe { Box::from_raw(session) });
    }
}

/// Stop a session and release its loop stacks. The pointer stays valid
/// until `dtf_session_free`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_session_close(session: *mut FormSession) {
    if let Some(session) = unsafe { session.as_mut() } {
        session.close();
    }
}

// ── Traversal ───────────────────────────────────────────────────

/// Render until the first unanswered choice or the end of the form.
///
/// Returns a JSON array of instructions. Caller must free with `dtf_free_str`.
/// Returns NULL on error and fills `error_out` if non-NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_session_start(
    session: *mut FormSession,
    error_out: *mut *mut c_char,
) -> *mut c_char {
    let Some(session) = (unsafe { session.as_mut() }) else {
        report(error_out, "session is null");
        return ptr::null_mut();
    };
    match session.start() {
        Ok(instructions) => json_to_c(&instructions, error_out),
        Err(e) => {
            report(error_out, e);
            ptr::null_mut()
        }
    }
}

/// Resolve a driver choice without applying it.
///
/// - `choice_json`: `{"sequenceNumber", "choiceIndex", "branchTargetSequenceNumber", "viewId"}`
///
/// Returns the decision as JSON (`-1` marks absent fields). Caller must free
/// with `dtf_free_str`. Returns NULL on error and fills `error_out` if non-NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_session_choose(
    session: *mut FormSession,
    choice_json: *const c_char,
    error_out: *mut *mut c_char,
) -> *mut c_char {
    let Some(session) = (unsafe { session.as_mut() }) else {
        report(error_out, "session is null");
        return ptr::null_mut();
    };
    let Some(choice) = parse_choice(choice_json, error_out) else {
        return ptr::null_mut();
    };
    match session.choose(&choice) {
        Ok(decision) => json_to_c(&decision, error_out),
        Err(e) => {
            report(error_out, e);
            ptr::null_mut()
        }
    }
}

/// Apply the pending decision, if any.
///
/// Returns a JSON array of instructions (empty when nothing was pending).
/// Caller must free with `dtf_free_str`. Returns NULL if `session` is NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_session_pump(session: *mut FormSession) -> *mut c_char {
    let Some(session) = (unsafe { session.as_mut() }) else {
        return ptr::null_mut();
    };
    json_to_c(&session.pump(), ptr::null_mut())
}

/// Resolve and apply a driver choice in one call.
///
/// Returns a JSON array of instructions. Caller must free with `dtf_free_str`.
/// Returns NULL on error and fills `error_out` if non-NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_session_answer(
    session: *mut FormSession,
    choice_json: *const c_char,
    error_out: *mut *mut c_char,
) -> *mut c_char {
    let Some(session) = (unsafe { session.as_mut() }) else {
        report(error_out, "session is null");
        return ptr::null_mut();
    };
    let Some(choice) = parse_choice(choice_json, error_out) else {
        return ptr::null_mut();
    };
    match session.answer(&choice) {
        Ok(instructions) => json_to_c(&instructions, error_out),
        Err(e) => {
            report(error_out, e);
            ptr::null_mut()
        }
    }
}

/// Record a value typed into a rendered non-choice field.
/// Returns 0 on success, -1 on error (with `error_out` filled if non-NULL).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_session_set_value(
    session: *mut FormSession,
    view_id: u32,
    value: *const c_char,
    error_out: *mut *mut c_char,
) -> c_int {
    let Some(session) = (unsafe { session.as_mut() }) else {
        report(error_out, "session is null");
        return -1;
    };
    let value = match c_arg(value, "value") {
        Ok(value) => value,
        Err(e) => {
            report(error_out, e);
            return -1;
        }
    };
    match session.set_value(view_id, value) {
        Ok(()) => 0,
        Err(e) => {
            report(error_out, e);
            -1
        }
    }
}

/// Field instances currently alive, as a JSON array in rendering order.
///
/// Caller must free with `dtf_free_str`. Returns NULL if `session` is NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_session_rendered_fields(session: *const FormSession) -> *mut c_char {
    let Some(session) = (unsafe { session.as_ref() }) else {
        return ptr::null_mut();
    };
    json_to_c(&session.rendered_fields(), ptr::null_mut())
}

// ── Option setters ──────────────────────────────────────────────

macro_rules! bool_setter {
    ($name:ident, $method:ident) => {
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(session: *mut FormSession, value: c_int) {
            if let Some(session) = unsafe { session.as_mut() } {
                session.$method(value != 0);
            }
        }
    };
}

bool_setter!(dtf_set_gate_optional_choices, set_gate_optional_choices);
bool_setter!(dtf_set_emit_skipped_fields, set_emit_skipped_fields);

/// Set the maximum number of views rendered in one session. Negative values
/// are ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_set_max_rendered_views(session: *mut FormSession, value: c_int) {
    if let (Some(session), Ok(value)) = (unsafe { session.as_mut() }, usize::try_from(value)) {
        session.set_max_rendered_views(value);
    }
}

// ── Draft diff ──────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotJson {
    fields: Vec<FieldDefinition>,
    #[serde(default)]
    recipients: Vec<String>,
}

/// Whether the current snapshot differs from the saved one.
///
/// - `saved_json`: `{"fields": [...], "recipients": [...]}` (NULL when nothing was saved yet)
/// - `current_json`: same shape (required)
/// - `check_recipients`: non-zero to compare recipients as well
///
/// A saved snapshot that cannot be read counts as no baseline, so the result
/// is 1. Returns 1 when there is something to draft, 0 when not, -1 when the
/// current snapshot is invalid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_has_something_to_draft(
    saved_json: *const c_char,
    current_json: *const c_char,
    check_recipients: c_int,
    error_out: *mut *mut c_char,
) -> c_int {
    let current = match parse_snapshot(current_json) {
        Ok(current) => current,
        Err(e) => {
            report(error_out, e);
            return -1;
        }
    };
    let mut tracker = DraftTracker::new();
    if !saved_json.is_null() {
        match parse_snapshot(saved_json) {
            Ok(saved) => tracker.capture(saved),
            Err(e) => warn!(error = %e, "saved snapshot ignored"),
        }
    }
    if tracker.has_something_to_draft(&current, check_recipients != 0) { 1 } else { 0 }
}

// ── Utility functions ───────────────────────────────────────────

/// Free a heap-allocated C string returned by dtf functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtf_free_str(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

// ── Internal helpers ────────────────────────────────────────────

/// Borrow a required C string argument named `name`.
fn c_arg<'a>(s: *const c_char, name: &str) -> Result<&'a str, String> {
    if s.is_null() {
        return Err(format!("{name} is null"));
    }
    unsafe { CStr::from_ptr(s) }
        .to_str()
        .map_err(|_| format!("{name} is not UTF-8"))
}

/// Hand `s` to the caller as an owned C string. Interior NUL bytes are dropped.
fn into_c_string(s: String) -> *mut c_char {
    let c = CString::new(s).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|&b| b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    c.into_raw()
}

fn report(error_out: *mut *mut c_char, err: impl std::fmt::Display) {
    if let Some(slot) = unsafe { error_out.as_mut() } {
        *slot = into_c_string(err.to_string());
    }
}

fn json_to_c<T: serde::Serialize + ?Sized>(value: &T, error_out: *mut *mut c_char) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => into_c_string(json),
        Err(e) => {
            report(error_out, e);
            ptr::null_mut()
        }
    }
}

fn parse_choice(choice_json: *const c_char, error_out: *mut *mut c_char) -> Option<FormChoice> {
    c_arg(choice_json, "choice_json")
        .and_then(|json| serde_json::from_str(json).map_err(|e| format!("invalid choice: {e}")))
        .map_err(|e| report(error_out, e))
        .ok()
}

fn parse_snapshot(json: *const c_char) -> Result<DraftSnapshot, String> {
    let json = c_arg(json, "snapshot")?;
    serde_json::from_str::<SnapshotJson>(json)
        .map(|s| DraftSnapshot::new(s.fields, s.recipients))
        .map_err(|e| format!("invalid snapshot: {e}"))
}
