pub mod element;
pub mod form;
pub mod logic;

pub use element::{ComponentSettings, ElementId, ElementType, FormElement, MatrixRow};
pub use form::{FormDefinition, NavigationPolicy};
pub use logic::{BooleanOperator, FieldOperator, LogicCondition, LogicRule, RuleCommand};

/// JSON Schema describing [`FormDefinition`] documents.
pub fn definition_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(FormDefinition);
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
}
