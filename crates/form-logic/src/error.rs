use thiserror::Error;

use crate::definition::ElementId;

/// The form definition itself is invalid.
///
/// None of these occur in a correctly authored form; they are reported when
/// the form is loaded so that a broken form is never presented.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("element id {0} is used more than once")]
    DuplicateElementId(ElementId),

    #[error("elements {first} and {second} share position {position}")]
    DuplicatePosition {
        position: i32,
        first: ElementId,
        second: ElementId,
    },

    #[error("export id '{export_id}' is used by elements {first} and {second}")]
    DuplicateExportId {
        export_id: String,
        first: ElementId,
        second: ElementId,
    },

    #[error("export column '{column}' of element {second} is already taken{}", taken_by(.first))]
    DuplicateExportColumn {
        column: String,
        /// `None` when the column is a response metadata column.
        first: Option<ElementId>,
        second: ElementId,
    },

    #[error("rule {rule_id} has an unknown boolean operator '{name}'")]
    UnknownBooleanOperator { rule_id: i64, name: String },

    #[error("rule {rule_id} has an unknown command '{name}'")]
    UnknownCommand { rule_id: i64, name: String },

    #[error("condition {condition_id} of rule {rule_id} has an unknown operator '{name}'")]
    UnknownOperator {
        rule_id: i64,
        condition_id: i64,
        name: String,
    },

    #[error("{owner} refers through '{field}' to element {target}, which is not in the form")]
    DanglingReference {
        owner: String,
        field: &'static str,
        target: ElementId,
    },

    #[error("element {0} is part of a subordinate cycle")]
    SubordinateCycle(ElementId),
}

fn taken_by(first: &Option<ElementId>) -> String {
    match first {
        Some(id) => format!(" by element {id}"),
        None => " by response metadata".to_string(),
    }
}

/// Failure to turn a serialized definition into a loaded form.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to parse form definition: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("invalid form definition: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Failure while computing a navigation step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("element {0} is not part of this form")]
    UnknownElement(ElementId),

    #[error("gave up after {0} steps while walking the form")]
    StepLimitExceeded(usize),

    #[error("element {0} is not reachable with the current answers")]
    Unreachable(ElementId),
}
