// Pre-population of field values from an earlier response.

use std::collections::VecDeque;

use hashbrown::HashMap;

use dtf_core::{FieldId, UiResponse};

/// Queue of earlier values per field, handed out one per rendered instance.
///
/// A field rendered again in a later loop pass takes the next value, so a
/// response saved from a looped form replays into the same instances.
#[derive(Debug, Clone, Default)]
pub struct ResponsePrefill {
    queues: HashMap<FieldId, VecDeque<String>>,
}

impl ResponsePrefill {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_response(response: &UiResponse) -> Self {
        let queues: HashMap<FieldId, VecDeque<String>> = response
            .iter()
            .map(|(field_id, values)| (field_id, values.iter().cloned().collect()))
            .collect();
        Self { queues }
    }

    /// Value for the next rendered instance of `field_id`.
    pub fn next_value(&mut self, field_id: FieldId) -> Option<String> {
        self.queues.get_mut(&field_id).and_then(VecDeque::pop_front)
    }

    /// Number of values not yet handed out for `field_id`.
    pub fn remaining(&self, field_id: FieldId) -> usize {
        self.queues.get(&field_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }
}
