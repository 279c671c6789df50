// Form model: an ordered field list addressed by sequence number.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::field::{FieldDefinition, FieldKind, SequenceNumber, ViewId};

/// An ordered list of field definitions.
///
/// Fields are addressed by sequence number; lookups go through an index built
/// at construction time. The list order is the default traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TemplateData", into = "TemplateData")]
pub struct FormTemplate {
    form_id: u32,
    name: String,
    fields: Vec<FieldDefinition>,
    index: HashMap<SequenceNumber, usize>,
}

/// Wire shape of a template (no index).
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateData {
    #[serde(default)]
    form_id: u32,
    #[serde(default)]
    name: String,
    fields: Vec<FieldDefinition>,
}

impl From<TemplateData> for FormTemplate {
    fn from(data: TemplateData) -> Self {
        FormTemplate::new(data.form_id, data.name, data.fields)
    }
}

impl From<FormTemplate> for TemplateData {
    fn from(template: FormTemplate) -> Self {
        TemplateData {
            form_id: template.form_id,
            name: template.name,
            fields: template.fields,
        }
    }
}

impl FormTemplate {
    /// Build a template from fields in traversal order.
    ///
    /// When a sequence number is duplicated, lookups resolve to its first
    /// occurrence; [`FormTemplate::validate`] reports the duplicate.
    pub fn new(form_id: u32, name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            index.entry(field.sequence_number).or_insert(i);
        }
        Self {
            form_id,
            name: name.into(),
            fields,
            index,
        }
    }

    pub fn form_id(&self) -> u32 {
        self.form_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field with the given sequence number.
    pub fn field_at(&self, sequence_number: SequenceNumber) -> Result<&FieldDefinition, FormError> {
        self.index_of(sequence_number).map(|i| &self.fields[i])
    }

    /// Position of the given sequence number in the field list.
    pub fn index_of(&self, sequence_number: SequenceNumber) -> Result<usize, FormError> {
        self.index
            .get(&sequence_number)
            .copied()
            .ok_or(FormError::NotFound(sequence_number))
    }

    pub fn field_at_index(&self, index: usize) -> Option<&FieldDefinition> {
        self.fields.get(index)
    }

    /// Sequence number of the first field at or after position `index`.
    /// `None` once `index` is past the end of the form.
    pub fn first_sequence_number_at_or_after(&self, index: usize) -> Option<SequenceNumber> {
        self.fields.get(index).map(|f| f.sequence_number)
    }

    pub fn first_sequence_number(&self) -> Option<SequenceNumber> {
        self.first_sequence_number_at_or_after(0)
    }

    /// Sequence number following `sequence_number` in list order.
    pub fn next_sequence_number(
        &self,
        sequence_number: SequenceNumber,
    ) -> Result<Option<SequenceNumber>, FormError> {
        let i = self.index_of(sequence_number)?;
        Ok(self.first_sequence_number_at_or_after(i + 1))
    }

    /// Sequence number preceding `sequence_number` in list order.
    pub fn previous_sequence_number(
        &self,
        sequence_number: SequenceNumber,
    ) -> Result<Option<SequenceNumber>, FormError> {
        let i = self.index_of(sequence_number)?;
        Ok(i.checked_sub(1).and_then(|p| self.first_sequence_number_at_or_after(p)))
    }

    /// Sequence number of the loop-end marker closing the loop that starts
    /// at `start`.
    ///
    /// An explicit `loop_end_sequence_number` wins; otherwise the list is
    /// scanned forward, skipping nested loop regions.
    pub fn matching_loop_end(&self, start: SequenceNumber) -> Result<SequenceNumber, FormError> {
        let start_index = self.index_of(start)?;
        let field = &self.fields[start_index];
        if field.kind != FieldKind::LoopStart {
            return Err(FormError::NotALoopStart(start));
        }

        if let Some(end) = field.loop_end_sequence_number {
            let end_index = self.index_of(end)?;
            if end_index <= start_index || self.fields[end_index].kind != FieldKind::LoopEnd {
                return Err(FormError::LoopEndMismatch { start, end });
            }
            return Ok(end);
        }

        let mut depth = 0usize;
        for candidate in &self.fields[start_index + 1..] {
            match candidate.kind {
                FieldKind::LoopStart => depth += 1,
                FieldKind::LoopEnd if depth == 0 => return Ok(candidate.sequence_number),
                FieldKind::LoopEnd => depth -= 1,
                _ => {}
            }
        }
        Err(FormError::UnterminatedLoop(start))
    }

    /// Check that every sequence number is unique and every branch and loop
    /// reference points at a field of this template.
    pub fn validate(&self) -> Result<(), FormError> {
        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if !seen.insert(field.sequence_number) {
                return Err(FormError::DuplicateSequenceNumber(field.sequence_number));
            }
        }

        for field in &self.fields {
            if let Some(target) = field.branch_target_sequence_number {
                self.index_of(target)?;
            }
            for (choice_index, choice) in field.choices.iter().enumerate() {
                if let Some(target) = choice.branch_target {
                    if !self.index.contains_key(&target) {
                        return Err(FormError::ChoiceBranchNotFound {
                            sequence_number: field.sequence_number,
                            choice_index,
                            target,
                        });
                    }
                }
            }
            if field.kind == FieldKind::LoopStart {
                self.matching_loop_end(field.sequence_number)?;
            }
        }
        Ok(())
    }

    /// Replace the value of a field. Identity is untouched.
    pub fn set_ui_data(
        &mut self,
        sequence_number: SequenceNumber,
        value: impl Into<String>,
    ) -> Result<(), FormError> {
        let i = self.index_of(sequence_number)?;
        self.fields[i].ui_data = value.into();
        Ok(())
    }

    /// Record the view of the latest rendered instance of a field.
    pub fn set_view_id(
        &mut self,
        sequence_number: SequenceNumber,
        view_id: Option<ViewId>,
    ) -> Result<(), FormError> {
        let i = self.index_of(sequence_number)?;
        self.fields[i].view_id = view_id;
        Ok(())
    }

    /// Record the branch target of the choice selected on a field.
    pub fn set_branch_target(
        &mut self,
        sequence_number: SequenceNumber,
        target: Option<SequenceNumber>,
    ) -> Result<(), FormError> {
        let i = self.index_of(sequence_number)?;
        self.fields[i].branch_target_sequence_number = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::Choice;

    fn scenario_template() -> FormTemplate {
        FormTemplate::new(
            1,
            "Delivery",
            vec![
                FieldDefinition::new(1, 10, FieldKind::Text),
                FieldDefinition::multiple_choice(
                    2,
                    20,
                    vec![Choice::new("Continue"), Choice::branching("Skip", 5)],
                ),
                FieldDefinition::loop_start(3, 30, 2, None),
                FieldDefinition::new(4, 40, FieldKind::Text),
                FieldDefinition::new(5, 50, FieldKind::LoopEnd),
                FieldDefinition::new(6, 60, FieldKind::Text),
            ],
        )
    }

    #[test]
    fn lookups_by_sequence_number() {
        let t = scenario_template();
        assert_eq!(t.index_of(4).unwrap(), 3);
        assert_eq!(t.field_at(6).unwrap().field_id, 60);
        assert_eq!(t.index_of(99), Err(FormError::NotFound(99)));
    }

    #[test]
    fn first_at_or_after_index() {
        let t = scenario_template();
        assert_eq!(t.first_sequence_number_at_or_after(0), Some(1));
        assert_eq!(t.first_sequence_number_at_or_after(5), Some(6));
        assert_eq!(t.first_sequence_number_at_or_after(6), None);
    }

    #[test]
    fn neighbours_in_list_order() {
        let t = scenario_template();
        assert_eq!(t.next_sequence_number(5).unwrap(), Some(6));
        assert_eq!(t.next_sequence_number(6).unwrap(), None);
        assert_eq!(t.previous_sequence_number(1).unwrap(), None);
        assert_eq!(t.previous_sequence_number(3).unwrap(), Some(2));
    }

    #[test]
    fn loop_end_found_by_scan() {
        let t = scenario_template();
        assert_eq!(t.matching_loop_end(3).unwrap(), 5);
        assert_eq!(t.matching_loop_end(4), Err(FormError::NotALoopStart(4)));
    }

    #[test]
    fn nested_loop_end_scan_skips_inner_region() {
        let t = FormTemplate::new(
            1,
            "Nested",
            vec![
                FieldDefinition::loop_start(1, 10, 2, None),
                FieldDefinition::loop_start(2, 20, 3, None),
                FieldDefinition::new(3, 30, FieldKind::Text),
                FieldDefinition::new(4, 40, FieldKind::LoopEnd),
                FieldDefinition::new(5, 50, FieldKind::LoopEnd),
            ],
        );
        assert_eq!(t.matching_loop_end(1).unwrap(), 5);
        assert_eq!(t.matching_loop_end(2).unwrap(), 4);
    }

    #[test]
    fn explicit_loop_end_must_be_a_later_loop_end() {
        let t = FormTemplate::new(
            1,
            "Bad",
            vec![
                FieldDefinition::loop_start(1, 10, 2, Some(2)),
                FieldDefinition::new(2, 20, FieldKind::Text),
                FieldDefinition::new(3, 30, FieldKind::LoopEnd),
            ],
        );
        assert_eq!(
            t.matching_loop_end(1),
            Err(FormError::LoopEndMismatch { start: 1, end: 2 })
        );
    }

    #[test]
    fn validate_accepts_well_formed_template() {
        assert_eq!(scenario_template().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_duplicates_and_dangling_targets() {
        let dup = FormTemplate::new(
            1,
            "Dup",
            vec![
                FieldDefinition::new(1, 10, FieldKind::Text),
                FieldDefinition::new(1, 11, FieldKind::Text),
            ],
        );
        assert_eq!(dup.validate(), Err(FormError::DuplicateSequenceNumber(1)));

        let dangling = FormTemplate::new(
            1,
            "Dangling",
            vec![FieldDefinition::multiple_choice(
                1,
                10,
                vec![Choice::branching("Go", 7)],
            )],
        );
        assert_eq!(
            dangling.validate(),
            Err(FormError::ChoiceBranchNotFound {
                sequence_number: 1,
                choice_index: 0,
                target: 7,
            })
        );

        let open_loop = FormTemplate::new(
            1,
            "Open",
            vec![FieldDefinition::loop_start(1, 10, 2, None)],
        );
        assert_eq!(open_loop.validate(), Err(FormError::UnterminatedLoop(1)));
    }

    #[test]
    fn setters_keep_identity() {
        let mut t = scenario_template();
        t.set_ui_data(4, "pallets").unwrap();
        t.set_view_id(4, Some(3)).unwrap();
        let field = t.field_at(4).unwrap();
        assert_eq!(field.ui_data, "pallets");
        assert_eq!(field.view_id, Some(3));
        assert_eq!(field.field_id, 40);
        assert_eq!(t.set_ui_data(77, "x"), Err(FormError::NotFound(77)));
    }

    #[test]
    fn deserialized_template_is_indexed() {
        let json = r#"{
            "formId": 12,
            "name": "Pickup",
            "fields": [
                {"sequenceNumber": 10, "fieldId": 1, "kind": "text"},
                {"sequenceNumber": 20, "fieldId": 2, "kind": "numeric"}
            ]
        }"#;
        let t: FormTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(t.form_id(), 12);
        assert_eq!(t.index_of(20).unwrap(), 1);
    }
}
