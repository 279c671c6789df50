// FormSession: the traversal state machine feeding a host renderer.
//
// The session walks the template in list order and emits one render
// instruction per field. It pauses on multiple-choice fields that still need
// an answer, resolves answers through the resolver, and resumes wherever the
// decision points. Loop markers are handled inline: a loop start pushes a
// frame onto the working stack, a loop end closes one pass.
//
// Design notes:
// - Every multiple-choice view freezes a copy of the working stack in the
//   view stack map. Answering that view resolves against the frozen copy.
// - Answers are published into a single-slot decision hand-off and applied
//   by `pump`; `answer` does both in one call.
// - When an answer is applied, every view rendered after the answered view
//   is removed before traversal resumes. A backward jump also removes the
//   views from the target up to the answered view, so the range is rendered
//   once more under fresh view ids.
// - The chosen value is written into the view when the decision is applied.
//   A decision replaced in the slot leaves no trace.
// - Values from an earlier response are handed to rendered instances in
//   order. A pre-filled choice is resolved on the spot, so replaying a saved
//   response walks the same path.

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use dtf_core::{
    Attachment, FieldDefinition, FieldKind, FormChoice, FormTemplate, RenderInstruction,
    SequenceNumber, TraversalDecision, UiResponse, ViewId,
};

use crate::draft::DraftSnapshot;
use crate::error::EngineError;
use crate::loop_stack::{LoopFrame, LoopStack, ViewFieldStackMap};
use crate::options::SessionOptions;
use crate::prefill::ResponsePrefill;
use crate::resolver::{self, Branch, Resolution};
use crate::slot::DecisionSlot;

/// View id handed to the first rendered field.
pub const FIRST_VIEW_ID: ViewId = 1;

/// Where a session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Not started.
    Idle,
    /// Working on the field with this sequence number.
    Rendering(SequenceNumber),
    /// Paused until the driver answers the choice rendered as `view_id`.
    AwaitingResponse {
        sequence_number: SequenceNumber,
        view_id: ViewId,
    },
    /// Every field on the current path has been rendered. Earlier choices
    /// can still be re-answered.
    Completed,
    /// The form cannot be displayed.
    Errored(EngineError),
    /// Torn down by the host.
    Closed,
}

/// One field instance handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    pub view_id: ViewId,
    pub field: FieldDefinition,
    pub attachment: Attachment,
}

#[derive(Debug, Clone)]
struct PendingDecision {
    view_id: ViewId,
    sequence_number: SequenceNumber,
    value: String,
    branch_target: Option<SequenceNumber>,
    resolution: Resolution,
}

/// Traversal of one form template for one render session.
pub struct FormSession {
    template: FormTemplate,
    /// Template values before anything was rendered, by field index.
    defaults: Vec<String>,
    options: SessionOptions,
    state: SessionState,
    cursor: usize,
    next_view_id: ViewId,
    rendered: Vec<RenderedView>,
    view_by_sequence: HashMap<SequenceNumber, ViewId>,
    stacks: ViewFieldStackMap,
    working: LoopStack,
    owner: Option<ViewId>,
    slot: DecisionSlot<PendingDecision>,
    prefill: ResponsePrefill,
}

impl FormSession {
    /// Create an idle session with default options.
    pub fn new(template: FormTemplate) -> Self {
        Self::with_options(template, SessionOptions::default())
    }

    pub fn with_options(template: FormTemplate, options: SessionOptions) -> Self {
        let defaults = template.fields().iter().map(|f| f.ui_data.clone()).collect();
        Self {
            template,
            defaults,
            options,
            state: SessionState::Idle,
            cursor: 0,
            next_view_id: FIRST_VIEW_ID,
            rendered: Vec::new(),
            view_by_sequence: HashMap::new(),
            stacks: ViewFieldStackMap::new(),
            working: LoopStack::new(),
            owner: None,
            slot: DecisionSlot::new(),
            prefill: ResponsePrefill::new(),
        }
    }

    /// Pre-populate rendered instances from an earlier response.
    pub fn with_response(mut self, response: &UiResponse) -> Self {
        self.prefill = ResponsePrefill::from_response(response);
        self
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Render from the first field until a choice needs an answer or the
    /// form is complete.
    ///
    /// A malformed template moves the session to [`SessionState::Errored`]
    /// and yields a single `Errored` instruction.
    pub fn start(&mut self) -> Result<Vec<RenderInstruction>, EngineError> {
        match &self.state {
            SessionState::Idle => {}
            SessionState::Closed => return Err(EngineError::SessionClosed),
            _ => return Err(EngineError::AlreadyStarted),
        }
        info!(
            form_id = self.template.form_id(),
            fields = self.template.len(),
            "starting form session"
        );

        let mut out = Vec::new();
        if let Err(err) = self.template.validate() {
            self.fail(err.into(), &mut out);
            return Ok(out);
        }
        self.cursor = 0;
        if let Err(err) = self.drive(&mut out) {
            self.fail(err, &mut out);
        }
        Ok(out)
    }

    /// Resolve a driver choice and publish the decision without applying it.
    ///
    /// A decision still pending from an earlier call is replaced. Errors that
    /// end the session also move it to [`SessionState::Errored`].
    pub fn choose(&mut self, choice: &FormChoice) -> Result<TraversalDecision, EngineError> {
        self.ensure_live()?;
        let invalid = EngineError::InvalidViewState {
            view_id: choice.view_id,
            sequence_number: choice.sequence_number,
        };
        let position = self
            .rendered_position(choice.view_id)
            .ok_or_else(|| invalid.clone())?;
        let field = &self.rendered[position].field;
        if field.kind != FieldKind::MultipleChoice
            || field.sequence_number != choice.sequence_number
        {
            return Err(invalid);
        }
        let Some(selected) = field.choices.get(choice.choice_index) else {
            return Err(EngineError::ChoiceOutOfRange {
                sequence_number: choice.sequence_number,
                choice_index: choice.choice_index,
                available: field.choices.len(),
            });
        };
        let value = selected.value.clone();

        let resolution = match resolver::resolve(choice, &self.template, &self.stacks) {
            Ok(resolution) => resolution,
            Err(err) => {
                if err.is_session_fatal() {
                    warn!(error = %err, "choice resolution failed");
                    self.slot.clear();
                    self.state = SessionState::Errored(err.clone());
                }
                return Err(err);
            }
        };

        let decision = resolution.decision(choice.view_id);
        let replaced = self.slot.publish(PendingDecision {
            view_id: choice.view_id,
            sequence_number: choice.sequence_number,
            value,
            branch_target: choice.branch_target_sequence_number,
            resolution,
        });
        if let Some(replaced) = replaced {
            debug!(
                replaced_view = replaced.view_id,
                view_id = choice.view_id,
                "pending decision replaced"
            );
        }
        Ok(decision)
    }

    /// Apply the pending decision, if any, and render until the next pause.
    pub fn pump(&mut self) -> Vec<RenderInstruction> {
        let mut out = Vec::new();
        let Some(pending) = self.slot.take() else {
            return out;
        };
        if matches!(self.state, SessionState::Closed | SessionState::Errored(_)) {
            return out;
        }
        let Some(position) = self.rendered_position(pending.view_id) else {
            debug!(view_id = pending.view_id, "decision for removed view dropped");
            return out;
        };

        if let Err(err) = self.apply_pending(position, pending, &mut out) {
            self.fail(err, &mut out);
        }
        out
    }

    fn apply_pending(
        &mut self,
        position: usize,
        pending: PendingDecision,
        out: &mut Vec<RenderInstruction>,
    ) -> Result<(), EngineError> {
        let PendingDecision {
            view_id,
            sequence_number,
            value,
            branch_target,
            resolution,
        } = pending;

        let view = &mut self.rendered[position].field;
        view.ui_data = value.clone();
        view.branch_target_sequence_number = branch_target;

        let keep = match resolution.branch {
            Branch::Jump { target } => self.first_view_to_rerender(position, target)?,
            _ => position + 1,
        };
        self.discard_from(keep, out)?;
        if self.view_by_sequence.get(&sequence_number) == Some(&view_id) {
            self.template.set_ui_data(sequence_number, value)?;
            self.template.set_branch_target(sequence_number, branch_target)?;
        }

        self.working = resolution.stack;
        self.owner = Some(view_id);
        self.apply_branch(resolution.branch, sequence_number, out)?;
        self.drive(out)
    }

    /// Position of the first view to drop when the view at `position` jumps
    /// to `target`. A forward jump keeps everything up to the answered view.
    /// A backward jump also drops the answered view and the views before it
    /// back to the latest instance of `target`.
    fn first_view_to_rerender(
        &self,
        position: usize,
        target: SequenceNumber,
    ) -> Result<usize, EngineError> {
        let target_index = self.template.index_of(target)?;
        let origin = self.rendered[position].field.sequence_number;
        if target_index > self.template.index_of(origin)? {
            return Ok(position + 1);
        }

        let mut first = position;
        for (p, view) in self.rendered[..=position].iter().enumerate().rev() {
            let index = self.template.index_of(view.field.sequence_number)?;
            if index < target_index {
                break;
            }
            first = p;
            if index == target_index {
                break;
            }
        }
        Ok(first)
    }

    /// Resolve a driver choice and apply it at once.
    ///
    /// Errors that end the session come back as an `Errored` instruction;
    /// other errors leave the session untouched and are returned.
    pub fn answer(&mut self, choice: &FormChoice) -> Result<Vec<RenderInstruction>, EngineError> {
        match self.choose(choice) {
            Ok(_) => Ok(self.pump()),
            Err(err) if err.is_session_fatal() => Ok(vec![RenderInstruction::Errored {
                message: err.to_string(),
            }]),
            Err(err) => Err(err),
        }
    }

    /// Record a value typed into a rendered non-choice field.
    pub fn set_value(&mut self, view_id: ViewId, value: impl Into<String>) -> Result<(), EngineError> {
        self.ensure_live()?;
        let position = self
            .rendered_position(view_id)
            .ok_or(EngineError::NoSuchView(view_id))?;
        let field = &mut self.rendered[position].field;
        if field.kind == FieldKind::MultipleChoice {
            return Err(EngineError::InvalidViewState {
                view_id,
                sequence_number: field.sequence_number,
            });
        }
        field.ui_data = value.into();
        let sequence_number = field.sequence_number;
        let value = field.ui_data.clone();
        if self.view_by_sequence.get(&sequence_number) == Some(&view_id) {
            self.template.set_ui_data(sequence_number, value)?;
        }
        Ok(())
    }

    /// Stop the session and release its loop stacks.
    pub fn close(&mut self) {
        info!(
            form_id = self.template.form_id(),
            rendered = self.rendered.len(),
            "closing form session"
        );
        self.stacks.clear();
        self.working.clear();
        self.slot.clear();
        self.owner = None;
        self.state = SessionState::Closed;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn set_gate_optional_choices(&mut self, value: bool) {
        self.options.gate_optional_choices = value;
    }

    pub fn set_emit_skipped_fields(&mut self, value: bool) {
        self.options.emit_skipped_fields = value;
    }

    pub fn set_max_rendered_views(&mut self, value: usize) {
        self.options.max_rendered_views = value;
    }

    pub fn template(&self) -> &FormTemplate {
        &self.template
    }

    /// Views currently alive, in rendering order.
    pub fn rendered_views(&self) -> &[RenderedView] {
        &self.rendered
    }

    /// Field instances currently alive, in rendering order.
    pub fn rendered_fields(&self) -> Vec<FieldDefinition> {
        self.rendered.iter().map(|r| r.field.clone()).collect()
    }

    /// Snapshot of the rendered fields with the given recipient selection.
    pub fn draft_snapshot<I, S>(&self, recipients: I) -> DraftSnapshot
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DraftSnapshot::new(self.rendered_fields(), recipients)
    }

    /// View of the latest rendered instance of `sequence_number`.
    pub fn view_for_sequence(&self, sequence_number: SequenceNumber) -> Option<ViewId> {
        self.view_by_sequence.get(&sequence_number).copied()
    }

    /// Id the next rendered view will get.
    pub fn next_view_id(&self) -> ViewId {
        self.next_view_id
    }

    pub fn stacks(&self) -> &ViewFieldStackMap {
        &self.stacks
    }

    pub fn working_stack(&self) -> &LoopStack {
        &self.working
    }

    /// View whose answer drives the current traversal.
    pub fn owner_view(&self) -> Option<ViewId> {
        self.owner
    }

    /// Decision published by [`FormSession::choose`] and not yet applied.
    pub fn pending_decision(&self) -> Option<TraversalDecision> {
        self.slot
            .peek()
            .map(|pending| pending.resolution.decision(pending.view_id))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_live(&self) -> Result<(), EngineError> {
        match self.state {
            SessionState::Closed => Err(EngineError::SessionClosed),
            SessionState::Errored(_) => Err(EngineError::SessionErrored),
            _ => Ok(()),
        }
    }

    fn rendered_position(&self, view_id: ViewId) -> Option<usize> {
        self.rendered
            .binary_search_by_key(&view_id, |r| r.view_id)
            .ok()
    }

    fn fail(&mut self, err: EngineError, out: &mut Vec<RenderInstruction>) {
        warn!(error = %err, "form traversal aborted");
        self.slot.clear();
        out.push(RenderInstruction::Errored {
            message: err.to_string(),
        });
        self.state = SessionState::Errored(err);
    }

    /// Emit fields from the cursor until a pause or the end of the form.
    fn drive(&mut self, out: &mut Vec<RenderInstruction>) -> Result<(), EngineError> {
        loop {
            let Some((sequence_number, kind)) = self
                .template
                .field_at_index(self.cursor)
                .map(|f| (f.sequence_number, f.kind))
            else {
                self.state = SessionState::Completed;
                info!(rendered = self.rendered.len(), "form traversal complete");
                out.push(RenderInstruction::Complete);
                return Ok(());
            };
            self.state = SessionState::Rendering(sequence_number);

            match kind {
                FieldKind::LoopEnd => {
                    let resolution =
                        resolver::resolve_loop_end(&self.template, &self.working, sequence_number)?;
                    debug!(sequence_number, branch = ?resolution.branch, "loop pass closed");
                    self.working = resolution.stack;
                    self.apply_branch(resolution.branch, sequence_number, out)?;
                }
                FieldKind::LoopStart => self.enter_loop(sequence_number, out)?,
                FieldKind::MultipleChoice => {
                    if self.render_choice(sequence_number, out)? {
                        return Ok(());
                    }
                }
                _ => {
                    self.emit(self.cursor, Attachment::Attach, out)?;
                    self.cursor += 1;
                }
            }
        }
    }

    fn enter_loop(
        &mut self,
        sequence_number: SequenceNumber,
        out: &mut Vec<RenderInstruction>,
    ) -> Result<(), EngineError> {
        let loop_count = self.template.field_at(sequence_number)?.loop_count.unwrap_or(1);
        let end = self.template.matching_loop_end(sequence_number)?;
        if loop_count <= 0 {
            debug!(sequence_number, "loop without passes skipped");
            self.cursor = self.template.index_of(end)? + 1;
            return Ok(());
        }

        let next_pass = self
            .working
            .peek()
            .is_some_and(|frame| frame.start_sequence_number == sequence_number);
        if !next_pass {
            self.working
                .push(LoopFrame::new(sequence_number, end, loop_count));
        }
        self.emit(self.cursor, Attachment::Attach, out)?;
        self.cursor += 1;
        Ok(())
    }

    /// Render a multiple-choice field. Returns `true` when traversal must
    /// wait for the driver.
    fn render_choice(
        &mut self,
        sequence_number: SequenceNumber,
        out: &mut Vec<RenderInstruction>,
    ) -> Result<bool, EngineError> {
        let view_id = self.emit(self.cursor, Attachment::Attach, out)?;
        self.stacks.insert_stack(view_id, self.working.clone());

        let position = self.rendered.len() - 1;
        let (preselected, gates) = {
            let field = &self.rendered[position].field;
            let preselected = if field.is_unanswered() {
                None
            } else {
                field
                    .choice_index_for_value(&field.ui_data)
                    .map(|i| (i, field.choices[i].branch_target))
            };
            (preselected, self.gates(field))
        };

        if let Some((choice_index, branch_target)) = preselected {
            let choice = FormChoice::new(sequence_number, choice_index, branch_target, view_id);
            let resolution = resolver::resolve(&choice, &self.template, &self.stacks)?;
            debug!(view_id, choice_index, "pre-filled choice replayed");
            self.rendered[position].field.branch_target_sequence_number = branch_target;
            if let Branch::Jump { target } = resolution.branch {
                let keep = self.first_view_to_rerender(position, target)?;
                self.discard_from(keep, out)?;
            }
            if self.view_by_sequence.get(&sequence_number) == Some(&view_id) {
                self.template.set_branch_target(sequence_number, branch_target)?;
            }
            self.working = resolution.stack;
            self.owner = Some(view_id);
            self.apply_branch(resolution.branch, sequence_number, out)?;
            return Ok(false);
        }

        if gates {
            debug!(view_id, sequence_number, "awaiting driver choice");
            self.state = SessionState::AwaitingResponse {
                sequence_number,
                view_id,
            };
            return Ok(true);
        }
        self.cursor += 1;
        Ok(false)
    }

    /// Whether an unanswered choice field blocks traversal.
    fn gates(&self, field: &FieldDefinition) -> bool {
        field.driver_editable
            && (field.required
                || self.options.gate_optional_choices
                || field.has_branching_choices())
    }

    /// Move the cursor to where `branch` points. `origin` is the field the
    /// branch was resolved at.
    fn apply_branch(
        &mut self,
        branch: Branch,
        origin: SequenceNumber,
        out: &mut Vec<RenderInstruction>,
    ) -> Result<(), EngineError> {
        self.cursor = match branch {
            Branch::Jump { target } => {
                let index = self.template.index_of(target)?;
                if self.options.emit_skipped_fields {
                    let origin_index = self.template.index_of(origin)?;
                    for skipped in origin_index + 1..index {
                        if !self.template.fields()[skipped].kind.is_loop_marker() {
                            self.emit(skipped, Attachment::Suppressed, out)?;
                        }
                    }
                }
                index
            }
            Branch::LoopContinue { frame, .. } => {
                self.template.index_of(frame.start_sequence_number)?
            }
            Branch::LoopExit {
                target: Some(target),
                ..
            } => self.template.index_of(target)?,
            Branch::LoopExit { target: None, .. } | Branch::End => self.template.len(),
        };
        Ok(())
    }

    /// Hand the field at `index` to the renderer under a fresh view id.
    fn emit(
        &mut self,
        index: usize,
        attachment: Attachment,
        out: &mut Vec<RenderInstruction>,
    ) -> Result<ViewId, EngineError> {
        let limit = self.options.max_rendered_views;
        if self.rendered.len() >= limit {
            return Err(EngineError::TraversalLimitExceeded { limit });
        }

        let mut field = self.template.fields()[index].clone();
        let view_id = self.next_view_id;
        self.next_view_id += 1;

        let prefilled = self.prefill.next_value(field.field_id);
        field.ui_data = prefilled.unwrap_or_else(|| self.defaults[index].clone());
        field.view_id = Some(view_id);
        if field.kind == FieldKind::MultipleChoice {
            field.branch_target_sequence_number = None;
        }

        let sequence_number = field.sequence_number;
        self.template.set_ui_data(sequence_number, field.ui_data.clone())?;
        self.template.set_view_id(sequence_number, Some(view_id))?;
        self.view_by_sequence.insert(sequence_number, view_id);

        debug!(view_id, sequence_number, ?attachment, "render field");
        out.push(RenderInstruction::Render {
            view_id,
            field: field.clone(),
            attachment,
        });
        self.rendered.push(RenderedView {
            view_id,
            field,
            attachment,
        });
        Ok(view_id)
    }

    /// Remove every view from position `keep` on and point the template back
    /// at the instances that remain.
    fn discard_from(
        &mut self,
        keep: usize,
        out: &mut Vec<RenderInstruction>,
    ) -> Result<(), EngineError> {
        let Some(from_view_id) = self.rendered.get(keep).map(|r| r.view_id) else {
            return Ok(());
        };
        self.rendered.truncate(keep);
        self.stacks.discard_from(from_view_id);
        debug!(from_view_id, "views removed");
        out.push(RenderInstruction::Remove { from_view_id });

        self.view_by_sequence.clear();
        let mut latest: HashMap<SequenceNumber, (ViewId, String)> = HashMap::new();
        for view in &self.rendered {
            self.view_by_sequence
                .insert(view.field.sequence_number, view.view_id);
            latest.insert(
                view.field.sequence_number,
                (view.view_id, view.field.ui_data.clone()),
            );
        }

        let sequence_numbers: Vec<SequenceNumber> = self
            .template
            .fields()
            .iter()
            .map(|f| f.sequence_number)
            .collect();
        for (index, sequence_number) in sequence_numbers.into_iter().enumerate() {
            let (view_id, value) = match latest.remove(&sequence_number) {
                Some((view_id, value)) => (Some(view_id), value),
                None => (None, self.defaults[index].clone()),
            };
            self.template.set_view_id(sequence_number, view_id)?;
            self.template.set_ui_data(sequence_number, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtf_core::{Choice, FormError};

    fn text(seq: SequenceNumber) -> FieldDefinition {
        FieldDefinition::new(seq, seq * 10, FieldKind::Text)
    }

    fn loop_end(seq: SequenceNumber) -> FieldDefinition {
        FieldDefinition::new(seq, seq * 10, FieldKind::LoopEnd)
    }

    /// 1 Text, 2 Choice(Continue | Skip -> 5), 3 LoopStart(2), 4 Text,
    /// 5 LoopEnd, 6 Text
    fn scenario() -> FormTemplate {
        FormTemplate::new(
            1,
            "Scenario",
            vec![
                text(1),
                FieldDefinition::multiple_choice(
                    2,
                    20,
                    vec![Choice::new("Continue"), Choice::branching("Skip", 5)],
                ),
                FieldDefinition::loop_start(3, 30, 2, None),
                text(4),
                loop_end(5),
                text(6),
            ],
        )
    }

    fn rendered_sequence(out: &[RenderInstruction]) -> Vec<SequenceNumber> {
        out.iter()
            .filter_map(|i| match i {
                RenderInstruction::Render { field, .. } => Some(field.sequence_number),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn linear_form_renders_every_field_once() {
        let template = FormTemplate::new(1, "Linear", (1..=5).map(text).collect());
        let mut session = FormSession::new(template);
        let out = session.start().unwrap();
        assert_eq!(rendered_sequence(&out), [1, 2, 3, 4, 5]);
        assert_eq!(out.last(), Some(&RenderInstruction::Complete));
        assert_eq!(session.state(), &SessionState::Completed);
        assert!(session.pending_decision().is_none());
        assert!(session.stacks().is_empty());
    }

    #[test]
    fn view_ids_increase_from_first() {
        let template = FormTemplate::new(1, "Linear", (1..=3).map(text).collect());
        let mut session = FormSession::new(template);
        let out = session.start().unwrap();
        let views: Vec<ViewId> = out.iter().filter_map(RenderInstruction::rendered_view).collect();
        assert_eq!(views, [1, 2, 3]);
        assert_eq!(session.next_view_id(), 4);
        assert_eq!(session.view_for_sequence(2), Some(2));
    }

    #[test]
    fn pauses_on_unanswered_choice() {
        let mut session = FormSession::new(scenario());
        let out = session.start().unwrap();
        assert_eq!(rendered_sequence(&out), [1, 2]);
        assert_eq!(
            session.state(),
            &SessionState::AwaitingResponse {
                sequence_number: 2,
                view_id: 2
            }
        );
        assert!(session.stacks().contains(2));
        assert!(!session.stacks().contains(1));
    }

    #[test]
    fn skip_choice_jumps_over_loop() {
        let mut session = FormSession::new(scenario());
        session.start().unwrap();
        let decision = session.choose(&FormChoice::new(2, 1, Some(5), 2)).unwrap();
        assert_eq!(decision.branch_target_id, 5);
        assert_eq!(decision.loop_end_id, -1);
        let out = session.pump();
        assert_eq!(rendered_sequence(&out), [6]);
        assert_eq!(session.state(), &SessionState::Completed);
    }

    #[test]
    fn continue_choice_runs_loop_twice() {
        let mut session = FormSession::new(scenario());
        session.start().unwrap();
        let out = session.answer(&FormChoice::new(2, 0, None, 2)).unwrap();
        assert_eq!(rendered_sequence(&out), [3, 4, 3, 4, 6]);
        assert_eq!(out.last(), Some(&RenderInstruction::Complete));
        assert!(session.working_stack().is_empty());
        assert_eq!(session.template().field_at(2).unwrap().ui_data, "Continue");
    }

    #[test]
    fn re_answering_removes_later_views() {
        let mut session = FormSession::new(scenario());
        session.start().unwrap();
        session.answer(&FormChoice::new(2, 0, None, 2)).unwrap();
        assert_eq!(session.rendered_views().len(), 7);

        let out = session.answer(&FormChoice::new(2, 1, Some(5), 2)).unwrap();
        assert_eq!(out[0], RenderInstruction::Remove { from_view_id: 3 });
        assert_eq!(rendered_sequence(&out), [6]);
        let alive: Vec<SequenceNumber> = session
            .rendered_views()
            .iter()
            .map(|r| r.field.sequence_number)
            .collect();
        assert_eq!(alive, [1, 2, 6]);
        assert_eq!(session.view_for_sequence(4), None);
        assert_eq!(session.template().field_at(4).unwrap().view_id, None);
    }

    #[test]
    fn last_published_decision_wins() {
        let mut session = FormSession::new(scenario());
        session.start().unwrap();
        session.choose(&FormChoice::new(2, 0, None, 2)).unwrap();
        session.choose(&FormChoice::new(2, 1, Some(5), 2)).unwrap();
        assert_eq!(
            session.pending_decision().map(|d| d.branch_target_id),
            Some(5)
        );
        let out = session.pump();
        assert_eq!(rendered_sequence(&out), [6]);
        assert!(session.pump().is_empty());
    }

    fn alive(session: &FormSession) -> Vec<(ViewId, SequenceNumber)> {
        session
            .rendered_views()
            .iter()
            .map(|r| (r.view_id, r.field.sequence_number))
            .collect()
    }

    /// 1 Text, 2 Text, 3 Choice(Back -> 2 | Done), 4 Text
    fn review_form() -> FormTemplate {
        FormTemplate::new(
            1,
            "Review",
            vec![
                text(1),
                text(2),
                FieldDefinition::multiple_choice(
                    3,
                    30,
                    vec![Choice::branching("Back", 2), Choice::new("Done")],
                ),
                text(4),
            ],
        )
    }

    #[test]
    fn backward_jump_renders_target_range_once() {
        let mut session = FormSession::new(review_form());
        session.start().unwrap();
        session.set_value(2, "draft note").unwrap();

        let out = session.answer(&FormChoice::new(3, 0, Some(2), 3)).unwrap();
        assert_eq!(out[0], RenderInstruction::Remove { from_view_id: 2 });
        assert_eq!(rendered_sequence(&out), [2, 3]);
        assert_eq!(alive(&session), [(1, 1), (4, 2), (5, 3)]);
        assert_eq!(
            session.state(),
            &SessionState::AwaitingResponse {
                sequence_number: 3,
                view_id: 5
            }
        );
        assert!(!session.stacks().contains(3));
        assert!(session.stacks().contains(5));
        assert_eq!(session.template().field_at(2).unwrap().ui_data, "");
        assert_eq!(session.template().field_at(3).unwrap().view_id, Some(5));

        let out = session.answer(&FormChoice::new(3, 1, None, 5)).unwrap();
        assert_eq!(rendered_sequence(&out), [4]);
        assert_eq!(alive(&session), [(1, 1), (4, 2), (5, 3), (6, 4)]);
        assert_eq!(session.state(), &SessionState::Completed);
    }

    #[test]
    fn backward_jump_to_first_field_replaces_every_view() {
        let template = FormTemplate::new(
            1,
            "Restart",
            vec![
                text(1),
                FieldDefinition::multiple_choice(
                    2,
                    20,
                    vec![Choice::branching("Back", 1), Choice::new("Done")],
                ),
                text(3),
            ],
        );
        let mut session = FormSession::new(template);
        session.start().unwrap();
        let out = session.answer(&FormChoice::new(2, 0, Some(1), 2)).unwrap();
        assert_eq!(out[0], RenderInstruction::Remove { from_view_id: 1 });
        assert_eq!(rendered_sequence(&out), [1, 2]);
        assert_eq!(alive(&session), [(3, 1), (4, 2)]);
    }

    #[test]
    fn replaced_decision_leaves_its_view_untouched() {
        let template = FormTemplate::new(
            1,
            "Two choices",
            vec![
                FieldDefinition::multiple_choice(1, 10, vec![Choice::new("A"), Choice::new("B")]),
                FieldDefinition::multiple_choice(2, 20, vec![Choice::new("X"), Choice::new("Y")]),
            ],
        );
        let mut session = FormSession::new(template);
        session.start().unwrap();
        session.answer(&FormChoice::new(1, 0, None, 1)).unwrap();

        session.choose(&FormChoice::new(1, 1, None, 1)).unwrap();
        assert_eq!(session.rendered_views()[0].field.ui_data, "A");
        session.choose(&FormChoice::new(2, 0, None, 2)).unwrap();
        let out = session.pump();
        assert_eq!(out, [RenderInstruction::Complete]);

        assert_eq!(session.rendered_views()[0].field.ui_data, "A");
        assert_eq!(session.template().field_at(1).unwrap().ui_data, "A");
        assert_eq!(session.rendered_views()[1].field.ui_data, "X");
        assert_eq!(session.template().field_at(2).unwrap().ui_data, "X");
        assert_eq!(session.state(), &SessionState::Completed);
    }

    #[test]
    fn unknown_view_leaves_session_alive() {
        let mut session = FormSession::new(scenario());
        session.start().unwrap();
        let err = session.answer(&FormChoice::new(2, 0, None, 9)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidViewState { view_id: 9, .. }));
        let err = session.answer(&FormChoice::new(1, 0, None, 1)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidViewState { view_id: 1, .. }));
        assert!(matches!(
            session.state(),
            SessionState::AwaitingResponse { .. }
        ));
        assert!(session.answer(&FormChoice::new(2, 0, None, 2)).is_ok());
    }

    #[test]
    fn choice_index_checked() {
        let mut session = FormSession::new(scenario());
        session.start().unwrap();
        let err = session.choose(&FormChoice::new(2, 5, None, 2)).unwrap_err();
        assert_eq!(
            err,
            EngineError::ChoiceOutOfRange {
                sequence_number: 2,
                choice_index: 5,
                available: 2
            }
        );
    }

    #[test]
    fn dangling_target_errors_the_session() {
        let mut session = FormSession::new(scenario());
        session.start().unwrap();
        let out = session.answer(&FormChoice::new(2, 1, Some(77), 2)).unwrap();
        assert!(matches!(out[0], RenderInstruction::Errored { .. }));
        assert_eq!(
            session.state(),
            &SessionState::Errored(EngineError::DataIntegrity(FormError::NotFound(77)))
        );
        assert_eq!(
            session.answer(&FormChoice::new(2, 0, None, 2)),
            Err(EngineError::SessionErrored)
        );
    }

    #[test]
    fn malformed_template_is_not_displayed() {
        let template = FormTemplate::new(
            1,
            "Broken",
            vec![
                text(1),
                FieldDefinition::multiple_choice(2, 20, vec![Choice::branching("Go", 40)]),
            ],
        );
        let mut session = FormSession::new(template);
        let out = session.start().unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], RenderInstruction::Errored { .. }));
        assert!(matches!(session.state(), SessionState::Errored(_)));
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut session = FormSession::new(scenario());
        session.start().unwrap();
        assert_eq!(session.start(), Err(EngineError::AlreadyStarted));
    }

    #[test]
    fn zero_count_loop_is_skipped() {
        let template = FormTemplate::new(
            1,
            "Empty loop",
            vec![
                text(1),
                FieldDefinition::loop_start(2, 20, 0, None),
                text(3),
                loop_end(4),
                text(5),
            ],
        );
        let mut session = FormSession::new(template);
        let out = session.start().unwrap();
        assert_eq!(rendered_sequence(&out), [1, 5]);
    }

    #[test]
    fn optional_choice_does_not_gate_when_configured() {
        let template = FormTemplate::new(
            1,
            "Optional",
            vec![
                FieldDefinition::multiple_choice(1, 10, vec![Choice::new("A"), Choice::new("B")]),
                text(2),
            ],
        );
        let mut session = FormSession::new(template);
        session.set_gate_optional_choices(false);
        let out = session.start().unwrap();
        assert_eq!(rendered_sequence(&out), [1, 2]);
        assert_eq!(session.state(), &SessionState::Completed);
    }

    #[test]
    fn required_choice_gates_even_when_optional_ones_do_not() {
        let template = FormTemplate::new(
            1,
            "Required",
            vec![
                FieldDefinition::multiple_choice(1, 10, vec![Choice::new("A")]).with_required(true),
                text(2),
            ],
        );
        let mut session = FormSession::new(template);
        session.set_gate_optional_choices(false);
        session.start().unwrap();
        assert!(matches!(
            session.state(),
            SessionState::AwaitingResponse { .. }
        ));
    }

    #[test]
    fn skipped_fields_emitted_suppressed() {
        let mut session = FormSession::new(scenario());
        session.set_emit_skipped_fields(true);
        session.start().unwrap();
        let out = session.answer(&FormChoice::new(2, 1, Some(5), 2)).unwrap();
        let attachments: Vec<(SequenceNumber, Attachment)> = out
            .iter()
            .filter_map(|i| match i {
                RenderInstruction::Render {
                    field, attachment, ..
                } => Some((field.sequence_number, *attachment)),
                _ => None,
            })
            .collect();
        assert_eq!(
            attachments,
            [(4, Attachment::Suppressed), (6, Attachment::Attach)]
        );
    }

    #[test]
    fn prefilled_response_replays_path() {
        let mut response = UiResponse::new();
        response.push(10, "load 42");
        response.push(20, "Continue");
        response.push(40, "first pass");
        response.push(40, "second pass");
        let mut session = FormSession::new(scenario()).with_response(&response);
        let out = session.start().unwrap();
        assert_eq!(rendered_sequence(&out), [1, 2, 3, 4, 3, 4, 6]);
        let values: Vec<&str> = session
            .rendered_views()
            .iter()
            .filter(|r| r.field.sequence_number == 4)
            .map(|r| r.field.ui_data.as_str())
            .collect();
        assert_eq!(values, ["first pass", "second pass"]);
        assert_eq!(session.owner_view(), Some(2));
    }

    #[test]
    fn set_value_updates_instance_and_template() {
        let mut session = FormSession::new(scenario());
        session.start().unwrap();
        session.set_value(1, "load 7").unwrap();
        assert_eq!(session.rendered_views()[0].field.ui_data, "load 7");
        assert_eq!(session.template().field_at(1).unwrap().ui_data, "load 7");
        assert_eq!(session.template().field_at(1).unwrap().field_id, 10);
        assert_eq!(session.set_value(99, "x"), Err(EngineError::NoSuchView(99)));
        assert!(session.set_value(2, "Skip").is_err());
    }

    #[test]
    fn rendering_limit_errors_session() {
        let template = FormTemplate::new(1, "Long", (1..=10).map(text).collect());
        let mut session = FormSession::new(template);
        session.set_max_rendered_views(4);
        let out = session.start().unwrap();
        assert_eq!(rendered_sequence(&out), [1, 2, 3, 4]);
        assert_eq!(
            session.state(),
            &SessionState::Errored(EngineError::TraversalLimitExceeded { limit: 4 })
        );
    }

    #[test]
    fn close_releases_stacks() {
        let mut session = FormSession::new(scenario());
        session.start().unwrap();
        session.choose(&FormChoice::new(2, 0, None, 2)).unwrap();
        session.close();
        assert!(session.stacks().is_empty());
        assert!(session.pending_decision().is_none());
        assert!(session.pump().is_empty());
        assert_eq!(
            session.choose(&FormChoice::new(2, 0, None, 2)),
            Err(EngineError::SessionClosed)
        );
    }
}
