//! Adaptive form logic.
//!
//! Load a [`FormDefinition`] once with [`Form::load`], then evaluate it
//! against a respondent's [`AnswerSet`] as often as needed. Every evaluation
//! is a pure function of the loaded form and the answers passed in; callers
//! re-run them whenever an answer changes.

pub mod answers;
pub mod condition;
pub mod definition;
pub mod error;
pub mod export;
pub mod form;
pub mod progress;
pub mod rule;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerSet, is_blank};
pub use condition::Condition;
pub use definition::{
    BooleanOperator, ComponentSettings, ElementId, ElementType, FieldOperator, FormDefinition,
    FormElement, LogicCondition, LogicRule, MatrixRow, NavigationPolicy, RuleCommand,
    definition_schema,
};
pub use error::{ConfigurationError, LoadError, NavigationError};
pub use export::{
    ExportCell, ExportOptions, ExportRow, ExportTable, METADATA_COLUMNS, Response, export_columns,
    project, project_response,
};
pub use form::Form;
pub use progress::{
    PagingState, Progress, first_element, next_element, paging_state, path_to, previous_element,
    progress,
};
pub use rule::Rule;
pub use validate::{ValidationResult, is_complete, unsatisfied_required, validate};
pub use visibility::{
    HiddenSet, VisibilityMap, is_visible, resolve_hidden, resolve_visibility, visible_answers,
};
