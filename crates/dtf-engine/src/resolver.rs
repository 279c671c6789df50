// Branch resolution.
//
// Decides where traversal continues after a driver choice or after the
// arrival at a loop-end marker. Resolution runs on a copy of the relevant
// loop stack and hands back the stack as it stands after the decision;
// nothing is committed until the session consumes the result, so resolving
// the same choice twice yields the same outcome.
//
// Rules for a choice with an explicit branch target:
// - target is the start of the innermost tracked loop and that loop has
//   passes left: run another pass (`LoopContinue`)
// - anything else: plain `Jump`
//
// Rules without a target (fall-through):
// - choice closes the body of the innermost loop: close one pass, which
//   either continues the loop or pops it (`LoopExit`, handing control to
//   the parent frame when there is one)
// - otherwise: `Jump` to the next field, or `End` past the last one

use tracing::debug;

use dtf_core::{FieldKind, FormChoice, FormTemplate, SequenceNumber, TraversalDecision, ViewId};

use crate::error::EngineError;
use crate::loop_stack::{LoopFrame, LoopStack, ViewFieldStackMap};

/// Where traversal continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Continue at `target` with no loop bookkeeping.
    Jump { target: SequenceNumber },
    /// Run another pass of the loop described by `frame` from its start.
    LoopContinue {
        frame: LoopFrame,
        loop_end: Option<SequenceNumber>,
    },
    /// Leave an exhausted loop. `target` is `None` when nothing follows the
    /// loop; `parent` is the enclosing loop that now owns control.
    LoopExit {
        target: Option<SequenceNumber>,
        parent: Option<LoopFrame>,
    },
    /// Nothing follows.
    End,
}

impl Branch {
    /// Sequence number traversal resumes at, if any.
    pub fn target(&self) -> Option<SequenceNumber> {
        match self {
            Branch::Jump { target } => Some(*target),
            Branch::LoopContinue { frame, .. } => Some(frame.start_sequence_number),
            Branch::LoopExit { target, .. } => *target,
            Branch::End => None,
        }
    }

    /// Boundary form of this branch for the view that caused it.
    pub fn to_decision(&self, selected_view: ViewId) -> TraversalDecision {
        let view = Some(selected_view);
        match *self {
            Branch::Jump { target } => TraversalDecision::new(Some(target), view, None, None, None),
            Branch::LoopContinue { frame, loop_end } => TraversalDecision::new(
                Some(frame.start_sequence_number),
                view,
                loop_end,
                Some(frame.configured_loop_count),
                Some(frame.current_loop_count),
            ),
            Branch::LoopExit {
                target,
                parent: Some(parent),
            } => TraversalDecision::new(
                target,
                view,
                Some(parent.end_sequence_number),
                Some(parent.configured_loop_count),
                Some(parent.current_loop_count),
            ),
            Branch::LoopExit { target, parent: None } => {
                TraversalDecision::new(target, view, None, None, None)
            }
            Branch::End => TraversalDecision::new(None, view, None, None, None),
        }
    }
}

/// A branch together with the loop stack it leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub branch: Branch,
    pub stack: LoopStack,
}

impl Resolution {
    pub fn decision(&self, selected_view: ViewId) -> TraversalDecision {
        self.branch.to_decision(selected_view)
    }
}

/// Resolve a driver choice against the stack frozen for its view.
///
/// Fails with [`EngineError::InvalidViewState`] when the view has no frozen
/// stack, and with [`EngineError::DataIntegrity`] when the template does not
/// contain a referenced field.
pub fn resolve(
    choice: &FormChoice,
    template: &FormTemplate,
    stacks: &ViewFieldStackMap,
) -> Result<Resolution, EngineError> {
    let mut stack =
        stacks
            .clone_stack_copy(choice.view_id)
            .ok_or(EngineError::InvalidViewState {
                view_id: choice.view_id,
                sequence_number: choice.sequence_number,
            })?;
    template.field_at(choice.sequence_number)?;

    let branch = match choice.branch_target_sequence_number {
        Some(target) => explicit_branch(template, &mut stack, target)?,
        None => fall_through(template, &mut stack, choice.sequence_number)?,
    };
    debug!(
        view_id = choice.view_id,
        sequence_number = choice.sequence_number,
        ?branch,
        "resolved choice"
    );
    Ok(Resolution { branch, stack })
}

/// Resolve the arrival at the loop-end marker `loop_end` with `stack` active.
///
/// A marker reached without a matching frame (for instance by jumping onto
/// it) just continues with the following field.
pub fn resolve_loop_end(
    template: &FormTemplate,
    stack: &LoopStack,
    loop_end: SequenceNumber,
) -> Result<Resolution, EngineError> {
    let mut stack = stack.clone();
    let branch = close_loop_pass(template, &mut stack, loop_end)?;
    Ok(Resolution { branch, stack })
}

fn explicit_branch(
    template: &FormTemplate,
    stack: &mut LoopStack,
    target: SequenceNumber,
) -> Result<Branch, EngineError> {
    let field = template.field_at(target)?;
    if field.kind == FieldKind::LoopStart {
        if let Some(frame) = stack.peek_mut() {
            if frame.start_sequence_number == target && frame.has_passes_remaining() {
                frame.advance_pass();
                let frame = *frame;
                let loop_end = template.previous_sequence_number(target)?;
                return Ok(Branch::LoopContinue { frame, loop_end });
            }
        }
    }
    Ok(Branch::Jump { target })
}

fn fall_through(
    template: &FormTemplate,
    stack: &mut LoopStack,
    after: SequenceNumber,
) -> Result<Branch, EngineError> {
    let Some(next) = template.next_sequence_number(after)? else {
        return Ok(Branch::End);
    };
    if stack
        .peek()
        .is_some_and(|frame| frame.end_sequence_number == next)
    {
        return close_loop_pass(template, stack, next);
    }
    Ok(Branch::Jump { target: next })
}

/// One pass of the innermost loop has reached `loop_end`.
fn close_loop_pass(
    template: &FormTemplate,
    stack: &mut LoopStack,
    loop_end: SequenceNumber,
) -> Result<Branch, EngineError> {
    match stack.peek_mut() {
        Some(frame) if frame.end_sequence_number == loop_end => {
            if frame.has_passes_remaining() {
                frame.advance_pass();
                return Ok(Branch::LoopContinue {
                    frame: *frame,
                    loop_end: Some(loop_end),
                });
            }
        }
        _ => return continue_after(template, loop_end),
    }

    stack.pop();
    let target = template.next_sequence_number(loop_end)?;
    Ok(Branch::LoopExit {
        target,
        parent: stack.peek().copied(),
    })
}

fn continue_after(template: &FormTemplate, after: SequenceNumber) -> Result<Branch, EngineError> {
    Ok(match template.next_sequence_number(after)? {
        Some(target) => Branch::Jump { target },
        None => Branch::End,
    })
}
