// Previously entered values used to pre-populate a form before traversal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field::FieldId;

/// Values a driver entered earlier (a reply, a restored draft), keyed by
/// field identity.
///
/// A field rendered several times inside a loop has one value per rendered
/// instance, in rendering order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UiResponse {
    values: BTreeMap<FieldId, Vec<String>>,
}

impl UiResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for the next rendered instance of `field_id`.
    pub fn push(&mut self, field_id: FieldId, value: impl Into<String>) {
        self.values.entry(field_id).or_default().push(value.into());
    }

    /// Values recorded for `field_id`, in rendering order.
    pub fn values_for(&self, field_id: FieldId) -> &[String] {
        self.values.get(&field_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &[String])> {
        self.values.iter().map(|(id, v)| (*id, v.as_slice()))
    }
}
