// Draft reconciliation: does the form differ from its last saved snapshot?
//
// Content differs when the field lists differ in length, or when a pair at
// the same position differs in kind or value. Two DateTime fields never count
// as different, whatever their values.

use std::collections::BTreeSet;

use dtf_core::{FieldDefinition, FieldKind};

/// Field values and selected recipients at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftSnapshot {
    fields: Vec<FieldDefinition>,
    recipients: BTreeSet<String>,
}

impl DraftSnapshot {
    pub fn new<I, S>(fields: Vec<FieldDefinition>, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields,
            recipients: recipients.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn recipients(&self) -> &BTreeSet<String> {
        &self.recipients
    }
}

/// Whether two field lists differ in content.
pub fn has_some_differences_in_content(saved: &[FieldDefinition], current: &[FieldDefinition]) -> bool {
    if saved.len() != current.len() {
        return true;
    }
    saved
        .iter()
        .zip(current)
        .any(|(old, new)| fields_differ(old, new))
}

fn fields_differ(old: &FieldDefinition, new: &FieldDefinition) -> bool {
    if old.kind != new.kind {
        return true;
    }
    if old.kind == FieldKind::DateTime {
        return false;
    }
    old.ui_data != new.ui_data
}

/// Whether the recipient selections differ, ignoring order.
pub fn recipients_differ(saved: &BTreeSet<String>, current: &BTreeSet<String>) -> bool {
    saved != current
}

/// Remembers the last saved snapshot of a form.
#[derive(Debug, Clone, Default)]
pub struct DraftTracker {
    baseline: Option<DraftSnapshot>,
}

impl DraftTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker whose baseline is `snapshot`.
    pub fn with_baseline(snapshot: DraftSnapshot) -> Self {
        Self {
            baseline: Some(snapshot),
        }
    }

    /// Record `snapshot` as the last saved state.
    pub fn capture(&mut self, snapshot: DraftSnapshot) {
        self.baseline = Some(snapshot);
    }

    pub fn baseline(&self) -> Option<&DraftSnapshot> {
        self.baseline.as_ref()
    }

    /// Whether `current` holds anything not in the saved snapshot.
    ///
    /// Recipients are compared only when `check_recipients` is set. Without a
    /// saved snapshot the answer is always `true`.
    pub fn has_something_to_draft(&self, current: &DraftSnapshot, check_recipients: bool) -> bool {
        let Some(saved) = &self.baseline else {
            return true;
        };
        has_some_differences_in_content(&saved.fields, &current.fields)
            || (check_recipients && recipients_differ(&saved.recipients, &current.recipients))
    }
}
