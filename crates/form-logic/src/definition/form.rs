use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::definition::element::FormElement;
use crate::definition::logic::LogicRule;

/// Navigation policies shared by every respondent of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NavigationPolicy {
    #[serde(default)]
    pub allow_backward_jumps: bool,
    /// Upper bound on elements visited while walking a respondent's path.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

fn default_max_steps() -> usize {
    20_000
}

impl Default for NavigationPolicy {
    fn default() -> Self {
        Self {
            allow_backward_jumps: false,
            max_steps: default_max_steps(),
        }
    }
}

/// Top-level form definition as stored by the form designer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormDefinition {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub navigation: NavigationPolicy,
    pub elements: Vec<FormElement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<LogicRule>,
}
