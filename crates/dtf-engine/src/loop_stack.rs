// Loop frames and the per-view stack map.
//
// Each multiple-choice view freezes a copy of the loop stack that was active
// when it was built. Re-answering that view later resolves against the frozen
// copy, so passes completed after the view was built never leak backwards.

use hashbrown::HashMap;

use dtf_core::{SequenceNumber, ViewId};

/// Bookkeeping for one active loop region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopFrame {
    pub start_sequence_number: SequenceNumber,
    pub end_sequence_number: SequenceNumber,
    /// Passes configured on the loop start.
    pub configured_loop_count: i32,
    /// Passes still to run after the current one. Never negative.
    pub remaining_loop_count: i32,
    /// Passes left including the current one, counting down from the
    /// configured count.
    pub current_loop_count: i32,
}

impl LoopFrame {
    /// Frame for the first pass through a loop of `loop_count` passes.
    pub fn new(start: SequenceNumber, end: SequenceNumber, loop_count: i32) -> Self {
        Self {
            start_sequence_number: start,
            end_sequence_number: end,
            configured_loop_count: loop_count,
            remaining_loop_count: (loop_count - 1).max(0),
            current_loop_count: loop_count,
        }
    }

    pub fn has_passes_remaining(&self) -> bool {
        self.remaining_loop_count > 0
    }

    /// Move to the next pass. Does nothing once the loop is exhausted.
    pub fn advance_pass(&mut self) {
        if self.has_passes_remaining() {
            self.current_loop_count = self.remaining_loop_count;
            self.remaining_loop_count -= 1;
        }
    }

    /// 1-based number of the current pass.
    pub fn pass_number(&self) -> i32 {
        self.configured_loop_count - self.current_loop_count + 1
    }
}

/// Stack of loop frames, innermost on top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStack {
    frames: Vec<LoopFrame>,
}

impl LoopStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: LoopFrame) {
        self.frames.push(frame);
    }

    pub fn peek(&self) -> Option<&LoopFrame> {
        self.frames.last()
    }

    pub fn peek_mut(&mut self) -> Option<&mut LoopFrame> {
        self.frames.last_mut()
    }

    /// Frame directly below the top, if any.
    pub fn parent(&self) -> Option<&LoopFrame> {
        self.frames.len().checked_sub(2).map(|i| &self.frames[i])
    }

    /// Remove the top frame. An empty stack just means no loop is active.
    pub fn pop(&mut self) -> Option<LoopFrame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Frames from outermost to innermost.
    pub fn iter(&self) -> impl Iterator<Item = &LoopFrame> {
        self.frames.iter()
    }
}

/// Loop stacks keyed by the multiple-choice view they were frozen for.
///
/// Owned by a single traversal session; cleared when the session closes.
#[derive(Debug, Clone, Default)]
pub struct ViewFieldStackMap {
    stacks: HashMap<ViewId, LoopStack>,
}

impl ViewFieldStackMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame for the first pass of a loop onto the stack of `view_id`,
    /// creating the stack if the view is unseen.
    pub fn push_frame(
        &mut self,
        view_id: ViewId,
        start: SequenceNumber,
        end: SequenceNumber,
        loop_count: i32,
    ) {
        self.stacks
            .entry(view_id)
            .or_default()
            .push(LoopFrame::new(start, end, loop_count));
    }

    pub fn peek_frame(&self, view_id: ViewId) -> Option<&LoopFrame> {
        self.stacks.get(&view_id).and_then(LoopStack::peek)
    }

    /// Pop the top frame of `view_id`. The view keeps its (possibly empty)
    /// entry so an exhausted loop stays distinguishable from no loop at all.
    pub fn pop_frame(&mut self, view_id: ViewId) -> Option<LoopFrame> {
        self.stacks.get_mut(&view_id).and_then(LoopStack::pop)
    }

    /// Independent copy of the stack of `view_id`.
    pub fn clone_stack_copy(&self, view_id: ViewId) -> Option<LoopStack> {
        self.stacks.get(&view_id).cloned()
    }

    /// Freeze `stack` as the stack of `view_id`, replacing any earlier one.
    pub fn insert_stack(&mut self, view_id: ViewId, stack: LoopStack) {
        self.stacks.insert(view_id, stack);
    }

    pub fn contains(&self, view_id: ViewId) -> bool {
        self.stacks.contains_key(&view_id)
    }

    /// Drop the stacks of every view numbered `from_view_id` or higher.
    pub fn discard_from(&mut self, from_view_id: ViewId) {
        self.stacks.retain(|view, _| *view < from_view_id);
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn clear(&mut self) {
        self.stacks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_frame_counts() {
        let frame = LoopFrame::new(3, 5, 3);
        assert_eq!(frame.configured_loop_count, 3);
        assert_eq!(frame.remaining_loop_count, 2);
        assert_eq!(frame.current_loop_count, 3);
        assert_eq!(frame.pass_number(), 1);
    }

    #[test]
    fn advance_counts_down_and_stops_at_zero() {
        let mut frame = LoopFrame::new(3, 5, 3);
        frame.advance_pass();
        assert_eq!((frame.current_loop_count, frame.remaining_loop_count), (2, 1));
        assert_eq!(frame.pass_number(), 2);
        frame.advance_pass();
        assert_eq!((frame.current_loop_count, frame.remaining_loop_count), (1, 0));
        assert!(!frame.has_passes_remaining());
        frame.advance_pass();
        assert_eq!((frame.current_loop_count, frame.remaining_loop_count), (1, 0));
    }

    #[test]
    fn non_positive_count_never_goes_negative() {
        let frame = LoopFrame::new(1, 2, 0);
        assert_eq!(frame.remaining_loop_count, 0);
        assert!(!frame.has_passes_remaining());
    }

    #[test]
    fn stack_parent_is_below_top() {
        let mut stack = LoopStack::new();
        assert!(stack.parent().is_none());
        stack.push(LoopFrame::new(1, 9, 2));
        assert!(stack.parent().is_none());
        stack.push(LoopFrame::new(2, 8, 3));
        assert_eq!(stack.parent().map(|f| f.start_sequence_number), Some(1));
        assert_eq!(stack.peek().map(|f| f.start_sequence_number), Some(2));
    }

    #[test]
    fn pop_on_empty_is_not_an_error() {
        let mut stack = LoopStack::new();
        assert_eq!(stack.pop(), None);
        let mut map = ViewFieldStackMap::new();
        assert_eq!(map.pop_frame(4), None);
    }

    #[test]
    fn popped_view_keeps_its_entry() {
        let mut map = ViewFieldStackMap::new();
        map.push_frame(1, 3, 5, 2);
        assert_eq!(map.peek_frame(1).map(|f| f.current_loop_count), Some(2));
        assert!(map.pop_frame(1).is_some());
        assert!(map.contains(1));
        assert!(map.peek_frame(1).is_none());
        assert!(!map.contains(2));
    }

    #[test]
    fn cloned_stack_is_independent() {
        let mut map = ViewFieldStackMap::new();
        map.push_frame(1, 3, 5, 2);
        let mut copy = map.clone_stack_copy(1).unwrap();
        copy.peek_mut().unwrap().advance_pass();
        copy.push(LoopFrame::new(4, 4, 1));
        assert_eq!(map.peek_frame(1).map(|f| f.remaining_loop_count), Some(1));
        assert_eq!(map.clone_stack_copy(1).unwrap().depth(), 1);
    }

    #[test]
    fn discard_from_drops_later_views() {
        let mut map = ViewFieldStackMap::new();
        for view in 1..=4 {
            map.insert_stack(view, LoopStack::new());
        }
        map.discard_from(3);
        assert!(map.contains(2));
        assert!(!map.contains(3));
        assert_eq!(map.len(), 2);
    }
}
