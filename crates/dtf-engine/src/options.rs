// Session configuration.

/// Default cap on rendered views per session.
pub const DEFAULT_MAX_RENDERED_VIEWS: usize = 10_000;

/// Options controlling how a traversal session advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Pause on unanswered multiple-choice fields even when they are optional
    /// and none of their choices branch. Default: true.
    pub gate_optional_choices: bool,

    /// Emit fields jumped over by a forward branch as suppressed views so the
    /// host keeps them for persistence. Default: false.
    pub emit_skipped_fields: bool,

    /// Maximum number of views alive in one session. Exceeding it errors the
    /// session. Default: [`DEFAULT_MAX_RENDERED_VIEWS`].
    pub max_rendered_views: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            gate_optional_choices: true,
            emit_skipped_fields: false,
            max_rendered_views: DEFAULT_MAX_RENDERED_VIEWS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = SessionOptions::default();
        assert!(options.gate_optional_choices);
        assert!(!options.emit_skipped_fields);
        assert_eq!(options.max_rendered_views, 10_000);
    }
}
