// Single-slot hand-off between choice resolution and re-rendering.
//
// Only the most recent driver action matters: publishing while a value is
// still pending replaces it.

/// Holds at most one pending value.
#[derive(Debug, Clone)]
pub struct DecisionSlot<T> {
    pending: Option<T>,
    overwritten: u64,
}

impl<T> Default for DecisionSlot<T> {
    fn default() -> Self {
        Self {
            pending: None,
            overwritten: 0,
        }
    }
}

impl<T> DecisionSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning the unconsumed value it replaced.
    pub fn publish(&mut self, value: T) -> Option<T> {
        let replaced = self.pending.replace(value);
        if replaced.is_some() {
            self.overwritten += 1;
        }
        replaced
    }

    /// Consume the pending value.
    pub fn take(&mut self) -> Option<T> {
        self.pending.take()
    }

    pub fn peek(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of values replaced before being consumed.
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_consumes_once() {
        let mut slot = DecisionSlot::new();
        assert_eq!(slot.publish(1), None);
        assert_eq!(slot.take(), Some(1));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn last_write_wins() {
        let mut slot = DecisionSlot::new();
        slot.publish("first");
        assert_eq!(slot.publish("second"), Some("first"));
        assert_eq!(slot.overwritten(), 1);
        assert_eq!(slot.peek(), Some(&"second"));
        assert_eq!(slot.take(), Some("second"));
    }

    #[test]
    fn clear_drops_pending() {
        let mut slot = DecisionSlot::new();
        slot.publish(5);
        slot.clear();
        assert!(!slot.is_pending());
    }
}
