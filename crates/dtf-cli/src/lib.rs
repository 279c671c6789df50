// dtf-cli: shared utilities for CLI tools.

use std::path::{Path, PathBuf};
use std::process;

use serde::Deserialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use dtf_core::{FieldDefinition, FormChoice, FormTemplate, UiResponse, ViewId};
use dtf_engine::{DraftSnapshot, DraftTracker, FormSession};

/// Environment variable naming the template file when `-t` is not given.
pub const TEMPLATE_ENV: &str = "DTF_TEMPLATE_PATH";

/// Install a stderr tracing subscriber driven by `RUST_LOG`, `warn` by default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load a form template from JSON.
///
/// Search order:
/// 1. `template_path` argument (if provided)
/// 2. `DTF_TEMPLATE_PATH` environment variable
pub fn load_template(template_path: Option<&str>) -> Result<FormTemplate, String> {
    let path = match template_path {
        Some(p) => PathBuf::from(p),
        None => std::env::var(TEMPLATE_ENV).map(PathBuf::from).map_err(|_| {
            format!("no template given: pass -t PATH or set {TEMPLATE_ENV}")
        })?,
    };
    read_json(&path)
}

/// Load a saved response (field id to ordered values) from JSON.
pub fn load_response(path: &str) -> Result<UiResponse, String> {
    read_json(Path::new(path))
}

/// Wire shape of a draft snapshot file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFile {
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl From<SnapshotFile> for DraftSnapshot {
    fn from(file: SnapshotFile) -> Self {
        DraftSnapshot::new(file.fields, file.recipients)
    }
}

/// Load a draft snapshot from JSON.
pub fn load_snapshot(path: &str) -> Result<DraftSnapshot, String> {
    read_json::<SnapshotFile>(Path::new(path)).map(DraftSnapshot::from)
}

/// Build a draft tracker whose baseline is the saved snapshot at `path`.
///
/// A saved snapshot that cannot be read leaves the tracker without a
/// baseline, so everything counts as something to draft.
pub fn saved_tracker(path: Option<&str>) -> DraftTracker {
    let mut tracker = DraftTracker::new();
    if let Some(path) = path {
        match load_snapshot(path) {
            Ok(saved) => tracker.capture(saved),
            Err(e) => warn!(error = %e, "saved snapshot ignored"),
        }
    }
    tracker
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&contents)
        .map_err(|e| format!("failed to parse {}: {}", path.display(), e))
}

/// Build the choice event for picking choice `choice_index` on a rendered
/// view, taking the branch target from the field's choice list.
///
/// Returns `None` when the view is not alive.
pub fn choice_for_view(
    session: &FormSession,
    view_id: ViewId,
    choice_index: usize,
) -> Option<FormChoice> {
    let view = session
        .rendered_views()
        .iter()
        .find(|r| r.view_id == view_id)?;
    let target = view
        .field
        .choices
        .get(choice_index)
        .and_then(|c| c.branch_target);
    Some(FormChoice::new(
        view.field.sequence_number,
        choice_index,
        target,
        view_id,
    ))
}

/// Take a `--NAME=VALUE`, `--NAME VALUE` or `-S VALUE` option out of `args`.
///
/// Returns `(value, remaining_args)`.
pub fn parse_option(args: &[String], long: &str, short: &str) -> (Option<String>, Vec<String>) {
    let long_flag = format!("--{long}");
    let long_prefix = format!("--{long}=");
    let mut value = None;
    let mut remaining = Vec::new();
    let mut skip_next = false;

    for (i, arg) in args.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if let Some(val) = arg.strip_prefix(&long_prefix) {
            value = Some(val.to_string());
        } else if *arg == long_flag || arg == short {
            if i + 1 < args.len() {
                value = Some(args[i + 1].clone());
                skip_next = true;
            } else {
                eprintln!("error: {} requires a value", arg);
                process::exit(1);
            }
        } else {
            remaining.push(arg.clone());
        }
    }

    (value, remaining)
}

/// Report `err` on stderr and exit with code 1.
pub fn fatal(err: impl std::fmt::Display) -> ! {
    eprintln!("error: {err}");
    process::exit(1);
}

/// Whether the driver asked for usage instead of a walk.
pub fn wants_help(args: &[String]) -> bool {
    args.iter().any(|a| matches!(a.as_str(), "-h" | "--help"))
}
