use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::element::ElementId;

/// A logic rule as stored with the form definition.
///
/// Operator and command names are kept as authored; they are checked against
/// the closed sets below when the form is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LogicRule {
    pub id: i64,
    /// The element this rule reveals, hides or navigates away from.
    pub form_element_id: ElementId,
    pub boolean_operator: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump_to_id: Option<ElementId>,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub conditions: Vec<LogicCondition>,
}

/// One comparison inside a [`LogicRule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LogicCondition {
    pub id: i64,
    /// Element whose answer is inspected.
    pub subject_id: ElementId,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

/// How a rule folds its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOperator {
    And,
    Or,
}

impl BooleanOperator {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "AND" => Some(BooleanOperator::And),
            "OR" => Some(BooleanOperator::Or),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BooleanOperator::And => "AND",
            BooleanOperator::Or => "OR",
        }
    }
}

/// What a matching rule does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleCommand {
    /// Target is hidden unless one of its SHOW rules matches.
    Show,
    /// Target is hidden whenever this rule matches.
    Hide,
    /// Navigation only; never affects visibility.
    Jump,
}

impl RuleCommand {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SHOW" => Some(RuleCommand::Show),
            "HIDE" => Some(RuleCommand::Hide),
            "JUMP" => Some(RuleCommand::Jump),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCommand::Show => "SHOW",
            RuleCommand::Hide => "HIDE",
            RuleCommand::Jump => "JUMP",
        }
    }
}

/// Comparison applied by a condition to its subject's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOperator {
    Equal,
    NotEqual,
    Contains,
    IsBlank,
    GreaterThan,
    LessThan,
}

impl FieldOperator {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "EQUAL" => Some(FieldOperator::Equal),
            "NOT_EQUAL" => Some(FieldOperator::NotEqual),
            "CONTAINS" => Some(FieldOperator::Contains),
            "IS_BLANK" => Some(FieldOperator::IsBlank),
            "GREATER_THAN" => Some(FieldOperator::GreaterThan),
            "LESS_THAN" => Some(FieldOperator::LessThan),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldOperator::Equal => "EQUAL",
            FieldOperator::NotEqual => "NOT_EQUAL",
            FieldOperator::Contains => "CONTAINS",
            FieldOperator::IsBlank => "IS_BLANK",
            FieldOperator::GreaterThan => "GREATER_THAN",
            FieldOperator::LessThan => "LESS_THAN",
        }
    }

    /// Unary operators ignore the condition's literal value.
    pub fn is_unary(&self) -> bool {
        matches!(self, FieldOperator::IsBlank)
    }
}
