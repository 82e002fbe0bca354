use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::ElementId;

/// Answers collected so far, keyed by form element id.
///
/// Serialized as a JSON object whose keys are the element ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet(BTreeMap<ElementId, Value>);

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ElementId) -> Option<&Value> {
        self.0.get(&id)
    }

    pub fn insert(&mut self, id: ElementId, value: Value) -> Option<Value> {
        self.0.insert(id, value)
    }

    pub fn remove(&mut self, id: ElementId) -> Option<Value> {
        self.0.remove(&id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &Value)> {
        self.0.iter().map(|(id, value)| (*id, value))
    }

    /// Whether the answer for `id` is missing or blank.
    pub fn is_blank(&self, id: ElementId) -> bool {
        is_blank(self.get(id))
    }
}

impl FromIterator<(ElementId, Value)> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = (ElementId, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<ElementId, Value>> for AnswerSet {
    fn from(map: BTreeMap<ElementId, Value>) -> Self {
        Self(map)
    }
}

/// Blank means missing, null, an empty or whitespace-only string, or an empty array.
pub fn is_blank(answer: Option<&Value>) -> bool {
    match answer {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}
