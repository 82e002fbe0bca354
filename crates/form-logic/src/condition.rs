use serde_json::Value;

use crate::answers::{AnswerSet, is_blank};
use crate::definition::{ElementId, FieldOperator, LogicCondition};
use crate::error::ConfigurationError;

/// A condition whose operator has been checked against the known set.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub id: i64,
    pub subject: ElementId,
    pub operator: FieldOperator,
    pub value: Value,
}

impl Condition {
    pub fn compile(rule_id: i64, condition: &LogicCondition) -> Result<Self, ConfigurationError> {
        let operator = FieldOperator::from_name(&condition.operator).ok_or_else(|| {
            ConfigurationError::UnknownOperator {
                rule_id,
                condition_id: condition.id,
                name: condition.operator.clone(),
            }
        })?;
        Ok(Self {
            id: condition.id,
            subject: condition.subject_id,
            operator,
            value: condition.value.clone(),
        })
    }

    /// Evaluates the condition against the subject's current answer.
    pub fn evaluate(&self, answers: &AnswerSet) -> bool {
        compare(self.operator, answers.get(self.subject), &self.value)
    }
}

/// Evaluates a stored condition directly, checking its operator first.
pub fn evaluate(
    rule_id: i64,
    condition: &LogicCondition,
    answers: &AnswerSet,
) -> Result<bool, ConfigurationError> {
    Ok(Condition::compile(rule_id, condition)?.evaluate(answers))
}

/// Applies `operator` to an answer (missing answers count as blank) and a literal.
pub fn compare(operator: FieldOperator, answer: Option<&Value>, value: &Value) -> bool {
    match operator {
        FieldOperator::IsBlank => is_blank(answer),
        FieldOperator::Equal => equals(answer, value),
        FieldOperator::NotEqual => !equals(answer, value),
        FieldOperator::Contains => contains(answer, value),
        FieldOperator::GreaterThan => {
            ordered(answer, value).is_some_and(|(left, right)| left > right)
        }
        FieldOperator::LessThan => ordered(answer, value).is_some_and(|(left, right)| left < right),
    }
}

fn equals(answer: Option<&Value>, value: &Value) -> bool {
    match answer {
        None => value.is_null(),
        // Multi-select answers match when the literal is one of the selections.
        Some(Value::Array(items)) if !value.is_array() => {
            items.iter().any(|item| loosely_equal(item, value))
        }
        Some(answer) => loosely_equal(answer, value),
    }
}

fn contains(answer: Option<&Value>, value: &Value) -> bool {
    match answer {
        Some(Value::Array(items)) => items.iter().any(|item| loosely_equal(item, value)),
        Some(Value::String(text)) => match value {
            Value::String(needle) => text.contains(needle.as_str()),
            Value::Number(number) => text.contains(&number.to_string()),
            _ => false,
        },
        _ => false,
    }
}

fn ordered(answer: Option<&Value>, value: &Value) -> Option<(f64, f64)> {
    let answer = match answer? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    Some((as_number(answer)?, as_number(value)?))
}

/// Scalar equality where a number and a numeric string compare by value.
pub(crate) fn loosely_equal(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (left, right) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            match (as_number(left), as_number(right)) {
                (Some(left), Some(right)) => left == right,
                _ => false,
            }
        }
        (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
