use serde::Serialize;

use crate::answers::AnswerSet;
use crate::definition::ElementId;
use crate::form::Form;
use crate::visibility::resolve_hidden;

/// Outcome of checking a response against its form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Visible required elements without an answer, in position order.
    pub missing_required: Vec<ElementId>,
    /// Answer keys that name no element of the form.
    pub unknown_fields: Vec<ElementId>,
}

/// Visible required elements whose answer is blank, in position order.
///
/// Required elements hidden by logic never block: they are not applicable to
/// this respondent.
pub fn unsatisfied_required(form: &Form, answers: &AnswerSet) -> Vec<ElementId> {
    let hidden = resolve_hidden(form, answers);
    form.elements()
        .iter()
        .filter(|element| element.is_required && !hidden.contains(&element.id))
        .filter(|element| answers.is_blank(element.id))
        .map(|element| element.id)
        .collect()
}

pub fn is_complete(form: &Form, answers: &AnswerSet) -> bool {
    unsatisfied_required(form, answers).is_empty()
}

pub fn validate(form: &Form, answers: &AnswerSet) -> ValidationResult {
    let missing_required = unsatisfied_required(form, answers);
    let unknown_fields: Vec<ElementId> = answers.ids().filter(|id| !form.contains(*id)).collect();

    ValidationResult {
        valid: missing_required.is_empty() && unknown_fields.is_empty(),
        missing_required,
        unknown_fields,
    }
}
