use crate::answers::AnswerSet;
use crate::condition::Condition;
use crate::definition::{BooleanOperator, ElementId, LogicRule, RuleCommand};
use crate::error::ConfigurationError;

/// A rule whose operator, command and conditions have been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: i64,
    pub target: ElementId,
    pub operator: BooleanOperator,
    pub command: RuleCommand,
    pub jump_to: Option<ElementId>,
    pub position: i32,
    pub conditions: Vec<Condition>,
}

impl Rule {
    pub fn compile(rule: &LogicRule) -> Result<Self, ConfigurationError> {
        let operator = BooleanOperator::from_name(&rule.boolean_operator).ok_or_else(|| {
            ConfigurationError::UnknownBooleanOperator {
                rule_id: rule.id,
                name: rule.boolean_operator.clone(),
            }
        })?;
        let command = RuleCommand::from_name(&rule.command).ok_or_else(|| {
            ConfigurationError::UnknownCommand {
                rule_id: rule.id,
                name: rule.command.clone(),
            }
        })?;
        let conditions = rule
            .conditions
            .iter()
            .map(|condition| Condition::compile(rule.id, condition))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: rule.id,
            target: rule.form_element_id,
            operator,
            command,
            jump_to: rule.jump_to_id,
            position: rule.position,
            conditions,
        })
    }

    /// Folds the conditions with the rule's operator.
    ///
    /// A rule without conditions matches under AND and never matches under OR.
    pub fn evaluate(&self, answers: &AnswerSet) -> bool {
        match self.operator {
            BooleanOperator::And => self
                .conditions
                .iter()
                .all(|condition| condition.evaluate(answers)),
            BooleanOperator::Or => self
                .conditions
                .iter()
                .any(|condition| condition.evaluate(answers)),
        }
    }
}

/// Evaluates a stored rule directly, checking its names first.
pub fn evaluate(rule: &LogicRule, answers: &AnswerSet) -> Result<bool, ConfigurationError> {
    Ok(Rule::compile(rule)?.evaluate(answers))
}
