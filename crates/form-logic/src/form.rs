use std::collections::HashMap;

use tracing::debug;

use crate::definition::{ElementId, FormDefinition, FormElement, NavigationPolicy};
use crate::error::{ConfigurationError, LoadError};
use crate::export::check_export_columns;
use crate::rule::Rule;

/// A form definition checked and indexed for evaluation.
///
/// Loading sorts elements by position, resolves every id reference, compiles
/// rule operators and commands, and orders the subordinate forest so that
/// parents come before their children. Every evaluation function works on a
/// loaded form and never re-sorts or re-checks it.
#[derive(Debug, Clone)]
pub struct Form {
    definition: FormDefinition,
    elements: Vec<FormElement>,
    index: HashMap<ElementId, usize>,
    parents: Vec<Option<usize>>,
    forest_order: Vec<usize>,
    rules: Vec<Rule>,
    rules_by_target: HashMap<ElementId, Vec<usize>>,
}

impl Form {
    pub fn load(definition: FormDefinition) -> Result<Self, ConfigurationError> {
        let mut elements = definition.elements.clone();
        elements.sort_by_key(|element| element.position);

        let mut index = HashMap::with_capacity(elements.len());
        for (position, element) in elements.iter().enumerate() {
            if index.insert(element.id, position).is_some() {
                return Err(ConfigurationError::DuplicateElementId(element.id));
            }
        }
        check_unique_positions(&elements)?;
        check_unique_export_ids(&elements)?;
        check_export_columns(&elements)?;

        let mut parents = Vec::with_capacity(elements.len());
        for element in &elements {
            if let Some(target) = element.jump_to_id {
                ensure_known(&index, target, || format!("element {}", element.id), "jump_to_id")?;
            }
            let parent = match element.subordinate_to {
                Some(parent) => Some(ensure_known(
                    &index,
                    parent,
                    || format!("element {}", element.id),
                    "subordinate_to",
                )?),
                None => None,
            };
            parents.push(parent);
        }
        let forest_order = forest_order(&elements, &parents)?;

        let mut rules = definition
            .rules
            .iter()
            .map(Rule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        rules.sort_by_key(|rule| (rule.target, rule.position, rule.id));

        let mut rules_by_target: HashMap<ElementId, Vec<usize>> = HashMap::new();
        for (position, rule) in rules.iter().enumerate() {
            let owner = || format!("rule {}", rule.id);
            ensure_known(&index, rule.target, owner, "form_element_id")?;
            if let Some(target) = rule.jump_to {
                ensure_known(&index, target, owner, "jump_to_id")?;
            }
            for condition in &rule.conditions {
                ensure_known(
                    &index,
                    condition.subject,
                    || format!("condition {} of rule {}", condition.id, rule.id),
                    "subject_id",
                )?;
            }
            rules_by_target.entry(rule.target).or_default().push(position);
        }

        debug!(
            form_id = definition.id,
            elements = elements.len(),
            rules = rules.len(),
            "loaded form definition"
        );

        Ok(Self {
            definition,
            elements,
            index,
            parents,
            forest_order,
            rules,
            rules_by_target,
        })
    }

    /// Parses and loads a JSON form definition.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let definition: FormDefinition = serde_json::from_str(json).map_err(LoadError::Parse)?;
        Ok(Self::load(definition)?)
    }

    pub fn id(&self) -> i64 {
        self.definition.id
    }

    pub fn title(&self) -> Option<&str> {
        self.definition.title.as_deref()
    }

    pub fn navigation(&self) -> &NavigationPolicy {
        &self.definition.navigation
    }

    /// The definition exactly as it was loaded.
    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    /// Elements in ascending position order.
    pub fn elements(&self) -> &[FormElement] {
        &self.elements
    }

    pub fn element(&self, id: ElementId) -> Option<&FormElement> {
        self.index_of(id).map(|index| &self.elements[index])
    }

    /// Offset of `id` within [`Form::elements`].
    pub fn index_of(&self, id: ElementId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.index.contains_key(&id)
    }

    /// Offset of the parent of the element at `index`, if it is subordinate.
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    /// Element offsets ordered so that every parent precedes its subordinates.
    pub fn forest_order(&self) -> &[usize] {
        &self.forest_order
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules targeting `id`, in ascending rule position.
    pub fn rules_for(&self, id: ElementId) -> impl Iterator<Item = &Rule> + '_ {
        self.rules_by_target
            .get(&id)
            .into_iter()
            .flatten()
            .map(|position| &self.rules[*position])
    }
}

impl TryFrom<FormDefinition> for Form {
    type Error = ConfigurationError;

    fn try_from(definition: FormDefinition) -> Result<Self, Self::Error> {
        Self::load(definition)
    }
}

fn ensure_known(
    index: &HashMap<ElementId, usize>,
    target: ElementId,
    owner: impl FnOnce() -> String,
    field: &'static str,
) -> Result<usize, ConfigurationError> {
    index
        .get(&target)
        .copied()
        .ok_or_else(|| ConfigurationError::DanglingReference {
            owner: owner(),
            field,
            target,
        })
}

fn check_unique_positions(sorted: &[FormElement]) -> Result<(), ConfigurationError> {
    for pair in sorted.windows(2) {
        if pair[0].position == pair[1].position {
            return Err(ConfigurationError::DuplicatePosition {
                position: pair[0].position,
                first: pair[0].id,
                second: pair[1].id,
            });
        }
    }
    Ok(())
}

fn check_unique_export_ids(elements: &[FormElement]) -> Result<(), ConfigurationError> {
    let mut seen: HashMap<&str, ElementId> = HashMap::with_capacity(elements.len());
    for element in elements {
        if let Some(first) = seen.insert(element.export_id.as_str(), element.id) {
            return Err(ConfigurationError::DuplicateExportId {
                export_id: element.export_id.clone(),
                first,
                second: element.id,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnChain,
    Placed,
}

/// Orders the subordinate forest parents-first, failing on any cycle.
fn forest_order(
    elements: &[FormElement],
    parents: &[Option<usize>],
) -> Result<Vec<usize>, ConfigurationError> {
    let mut marks = vec![Mark::Unvisited; elements.len()];
    let mut order = Vec::with_capacity(elements.len());
    let mut chain = Vec::new();

    for start in 0..elements.len() {
        let mut cursor = Some(start);
        while let Some(index) = cursor {
            match marks[index] {
                Mark::Placed => break,
                Mark::OnChain => return Err(ConfigurationError::SubordinateCycle(elements[index].id)),
                Mark::Unvisited => {
                    marks[index] = Mark::OnChain;
                    chain.push(index);
                    cursor = parents[index];
                }
            }
        }
        // The chain runs child to ancestor; place ancestors first.
        while let Some(index) = chain.pop() {
            marks[index] = Mark::Placed;
            order.push(index);
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn load(value: Value) -> Result<Form, ConfigurationError> {
        Form::load(serde_json::from_value(value).expect("definition"))
    }

    #[test]
    fn sorts_elements_and_rules() {
        let form = load(json!({
            "id": 1,
            "elements": [
                { "id": 3, "position": 30, "export_id": "c" },
                { "id": 1, "position": 2, "export_id": "a" },
                { "id": 2, "position": 7, "export_id": "b" }
            ],
            "rules": [
                { "id": 11, "form_element_id": 2, "boolean_operator": "AND", "command": "SHOW", "position": 2 },
                { "id": 10, "form_element_id": 2, "boolean_operator": "OR", "command": "SHOW", "position": 1 }
            ]
        }))
        .expect("form");
        let ids: Vec<_> = form.elements().iter().map(|element| element.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let rule_ids: Vec<_> = form.rules_for(2).map(|rule| rule.id).collect();
        assert_eq!(rule_ids, vec![10, 11]);
        assert_eq!(form.rules_for(1).count(), 0);
    }

    #[test]
    fn forest_order_places_parents_first() {
        let form = load(json!({
            "id": 1,
            "elements": [
                { "id": 1, "position": 1, "export_id": "grandchild", "subordinate_to": 2 },
                { "id": 2, "position": 2, "export_id": "child", "subordinate_to": 3 },
                { "id": 3, "position": 3, "export_id": "root" }
            ]
        }))
        .expect("form");
        let order: Vec<_> = form
            .forest_order()
            .iter()
            .map(|index| form.elements()[*index].id)
            .collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(form.parent_of(0), Some(1));
    }

    #[test]
    fn detects_subordinate_cycles() {
        let error = load(json!({
            "id": 1,
            "elements": [
                { "id": 1, "position": 1, "export_id": "a", "subordinate_to": 2 },
                { "id": 2, "position": 2, "export_id": "b", "subordinate_to": 1 }
            ]
        }))
        .unwrap_err();
        assert!(matches!(error, ConfigurationError::SubordinateCycle(_)));

        let self_loop = load(json!({
            "id": 1,
            "elements": [{ "id": 5, "position": 1, "export_id": "a", "subordinate_to": 5 }]
        }))
        .unwrap_err();
        assert_eq!(self_loop, ConfigurationError::SubordinateCycle(5));
    }

    #[test]
    fn rejects_dangling_references() {
        let error = load(json!({
            "id": 1,
            "elements": [{ "id": 1, "position": 1, "export_id": "a", "jump_to_id": 9 }]
        }))
        .unwrap_err();
        assert_eq!(
            error,
            ConfigurationError::DanglingReference {
                owner: "element 1".into(),
                field: "jump_to_id",
                target: 9,
            }
        );

        let error = load(json!({
            "id": 1,
            "elements": [{ "id": 1, "position": 1, "export_id": "a" }],
            "rules": [{
                "id": 4,
                "form_element_id": 1,
                "boolean_operator": "AND",
                "command": "JUMP",
                "jump_to_id": 77
            }]
        }))
        .unwrap_err();
        assert!(matches!(
            error,
            ConfigurationError::DanglingReference { target: 77, field: "jump_to_id", .. }
        ));

        let error = load(json!({
            "id": 1,
            "elements": [{ "id": 1, "position": 1, "export_id": "a", "subordinate_to": 8 }]
        }))
        .unwrap_err();
        assert_eq!(
            error,
            ConfigurationError::DanglingReference {
                owner: "element 1".into(),
                field: "subordinate_to",
                target: 8,
            }
        );

        let error = load(json!({
            "id": 1,
            "elements": [{ "id": 1, "position": 1, "export_id": "a" }],
            "rules": [{
                "id": 4,
                "form_element_id": 1,
                "boolean_operator": "AND",
                "command": "SHOW",
                "conditions": [{ "id": 6, "subject_id": 55, "operator": "IS_BLANK" }]
            }]
        }))
        .unwrap_err();
        assert_eq!(
            error,
            ConfigurationError::DanglingReference {
                owner: "condition 6 of rule 4".into(),
                field: "subject_id",
                target: 55,
            }
        );
    }

    #[test]
    fn rejects_duplicates() {
        let duplicate_id = load(json!({
            "id": 1,
            "elements": [
                { "id": 1, "position": 1, "export_id": "a" },
                { "id": 1, "position": 2, "export_id": "b" }
            ]
        }))
        .unwrap_err();
        assert_eq!(duplicate_id, ConfigurationError::DuplicateElementId(1));

        let duplicate_position = load(json!({
            "id": 1,
            "elements": [
                { "id": 1, "position": 4, "export_id": "a" },
                { "id": 2, "position": 4, "export_id": "b" }
            ]
        }))
        .unwrap_err();
        assert!(matches!(
            duplicate_position,
            ConfigurationError::DuplicatePosition { position: 4, .. }
        ));

        let duplicate_export = load(json!({
            "id": 1,
            "elements": [
                { "id": 1, "position": 1, "export_id": "same" },
                { "id": 2, "position": 2, "export_id": "same" }
            ]
        }))
        .unwrap_err();
        assert!(matches!(
            duplicate_export,
            ConfigurationError::DuplicateExportId { first: 1, second: 2, .. }
        ));
    }

    #[test]
    fn rejects_colliding_export_columns() {
        let metadata = load(json!({
            "id": 1,
            "elements": [{ "id": 3, "position": 1, "export_id": "id" }]
        }))
        .unwrap_err();
        assert_eq!(
            metadata,
            ConfigurationError::DuplicateExportColumn {
                column: "id".into(),
                first: None,
                second: 3,
            }
        );

        let names = load(json!({
            "id": 1,
            "elements": [
                { "id": 1, "position": 1, "type": "name", "export_id": "respondent" },
                { "id": 2, "position": 2, "type": "name", "export_id": "interviewer" }
            ]
        }))
        .unwrap_err();
        assert_eq!(
            names,
            ConfigurationError::DuplicateExportColumn {
                column: "is_facilitated".into(),
                first: Some(1),
                second: 2,
            }
        );

        let expanded = load(json!({
            "id": 1,
            "elements": [
                { "id": 1, "position": 1, "type": "consent", "export_id": "consent" },
                { "id": 2, "position": 2, "export_id": "consent_doc_version" }
            ]
        }))
        .unwrap_err();
        assert!(matches!(
            expanded,
            ConfigurationError::DuplicateExportColumn { first: Some(1), second: 2, .. }
        ));

        let layout = load(json!({
            "id": 1,
            "elements": [
                { "id": 1, "position": 1, "type": "welcome_message", "export_id": "id" },
                { "id": 2, "position": 2, "type": "name", "export_id": "respondent" }
            ]
        }));
        assert!(layout.is_ok());
    }

    #[test]
    fn from_json_reports_parse_failures() {
        assert!(matches!(Form::from_json("{"), Err(LoadError::Parse(_))));
    }
}
