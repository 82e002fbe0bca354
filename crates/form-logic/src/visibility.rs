use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::answers::AnswerSet;
use crate::definition::{ElementId, RuleCommand};
use crate::form::Form;

/// Ids of the elements that must not be presented for a set of answers.
pub type HiddenSet = BTreeSet<ElementId>;

/// Visibility of every element, keyed by id.
pub type VisibilityMap = BTreeMap<ElementId, bool>;

/// Computes the hidden set for `answers`.
///
/// An element's own visibility comes from the rules targeting it: with SHOW
/// rules it is visible only while one of them matches, and any matching HIDE
/// rule hides it. JUMP rules never affect visibility. A subordinate element is
/// additionally hidden whenever its parent is hidden.
pub fn resolve_hidden(form: &Form, answers: &AnswerSet) -> HiddenSet {
    let visible = resolve_flags(form, answers);
    form.elements()
        .iter()
        .zip(visible)
        .filter(|(_, visible)| !visible)
        .map(|(element, _)| element.id)
        .collect()
}

/// Same outcome as [`resolve_hidden`], expressed per element.
pub fn resolve_visibility(form: &Form, answers: &AnswerSet) -> VisibilityMap {
    form.elements()
        .iter()
        .zip(resolve_flags(form, answers))
        .map(|(element, visible)| (element.id, visible))
        .collect()
}

/// Whether `id` is visible; unknown ids are reported as hidden.
pub fn is_visible(form: &Form, id: ElementId, answers: &AnswerSet) -> bool {
    match form.index_of(id) {
        Some(index) => resolve_flags(form, answers)[index],
        None => false,
    }
}

/// Visibility flags aligned with `form.elements()`.
fn resolve_flags(form: &Form, answers: &AnswerSet) -> Vec<bool> {
    let elements = form.elements();
    let mut visible = vec![true; elements.len()];

    // Parents are always resolved before their subordinates.
    for &index in form.forest_order() {
        let own = own_visibility(form, elements[index].id, answers);
        let parent_visible = form.parent_of(index).is_none_or(|parent| visible[parent]);
        visible[index] = own && parent_visible;
        if !visible[index] {
            trace!(element_id = elements[index].id, own, parent_visible, "element hidden");
        }
    }

    visible
}

fn own_visibility(form: &Form, id: ElementId, answers: &AnswerSet) -> bool {
    let mut has_show_rule = false;
    let mut shown = false;
    for rule in form.rules_for(id) {
        match rule.command {
            RuleCommand::Show => {
                has_show_rule = true;
                if !shown && rule.evaluate(answers) {
                    shown = true;
                }
            }
            RuleCommand::Hide => {
                if rule.evaluate(answers) {
                    return false;
                }
            }
            RuleCommand::Jump => {}
        }
    }
    !has_show_rule || shown
}

/// Answers limited to visible input elements.
///
/// Hidden questions keep their stale answers in the response session; this
/// drops them, leaving what a finalized response should keep.
pub fn visible_answers(form: &Form, answers: &AnswerSet) -> AnswerSet {
    let visible = resolve_flags(form, answers);
    form.elements()
        .iter()
        .zip(visible)
        .filter(|(element, visible)| *visible && element.is_input())
        .filter_map(|(element, _)| {
            answers
                .get(element.id)
                .map(|value| (element.id, value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn form(value: Value) -> Form {
        Form::load(serde_json::from_value(value).expect("definition")).expect("form")
    }

    fn answers(value: Value) -> AnswerSet {
        serde_json::from_value(value).expect("answers")
    }

    fn gated_form() -> Form {
        form(json!({
            "id": 1,
            "elements": [
                { "id": 1, "position": 1, "export_id": "gate" },
                { "id": 2, "position": 2, "export_id": "detail" },
                { "id": 3, "position": 3, "export_id": "detail_child", "subordinate_to": 2 },
                { "id": 4, "position": 4, "export_id": "grandchild", "subordinate_to": 3 }
            ],
            "rules": [
                {
                    "id": 1,
                    "form_element_id": 2,
                    "boolean_operator": "AND",
                    "command": "SHOW",
                    "conditions": [{ "id": 1, "subject_id": 1, "operator": "EQUAL", "value": "yes" }]
                }
            ]
        }))
    }

    #[test]
    fn hiding_a_parent_hides_all_descendants() {
        let form = gated_form();
        let hidden = resolve_hidden(&form, &answers(json!({ "1": "no" })));
        assert_eq!(hidden, HiddenSet::from([2, 3, 4]));

        let hidden = resolve_hidden(&form, &answers(json!({ "1": "yes" })));
        assert!(hidden.is_empty());
    }

    #[test]
    fn hide_rule_overrides_matching_show_rule() {
        let form = form(json!({
            "id": 1,
            "elements": [
                { "id": 1, "position": 1, "export_id": "a" },
                { "id": 2, "position": 2, "export_id": "b" }
            ],
            "rules": [
                {
                    "id": 1, "form_element_id": 2, "boolean_operator": "AND", "command": "SHOW",
                    "conditions": [{ "id": 1, "subject_id": 1, "operator": "IS_BLANK" }]
                },
                {
                    "id": 2, "form_element_id": 2, "boolean_operator": "AND", "command": "HIDE",
                    "position": 1,
                    "conditions": [{ "id": 2, "subject_id": 1, "operator": "IS_BLANK" }]
                }
            ]
        }));
        assert!(resolve_hidden(&form, &AnswerSet::new()).contains(&2));
    }

    #[test]
    fn jump_rules_do_not_hide_their_target() {
        let form = form(json!({
            "id": 1,
            "elements": [
                { "id": 1, "position": 1, "export_id": "a" },
                { "id": 2, "position": 2, "export_id": "b" },
                { "id": 3, "position": 3, "export_id": "c" }
            ],
            "rules": [{
                "id": 1, "form_element_id": 1, "boolean_operator": "AND", "command": "JUMP",
                "jump_to_id": 3,
                "conditions": [{ "id": 1, "subject_id": 1, "operator": "EQUAL", "value": "skip" }]
            }]
        }));
        assert!(resolve_hidden(&form, &AnswerSet::new()).is_empty());
    }

    #[test]
    fn visibility_map_and_lookup_agree() {
        let form = gated_form();
        let answers = answers(json!({ "1": "no" }));
        let map = resolve_visibility(&form, &answers);
        assert_eq!(map.get(&1), Some(&true));
        assert_eq!(map.get(&4), Some(&false));
        assert!(is_visible(&form, 1, &answers));
        assert!(!is_visible(&form, 3, &answers));
        assert!(!is_visible(&form, 99, &answers));
    }

    #[test]
    fn visible_answers_drop_hidden_questions() {
        let form = gated_form();
        let answers = answers(json!({ "1": "no", "2": "stale", "3": "stale" }));
        let kept = visible_answers(&form, &answers);
        assert_eq!(kept.ids().collect::<Vec<_>>(), vec![1]);
    }
}
