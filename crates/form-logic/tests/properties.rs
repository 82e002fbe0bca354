use proptest::prelude::*;
use serde_json::{Value, json};

use form_logic::{AnswerSet, Form, next_element, resolve_hidden, unsatisfied_required};

const CHOICES: [&str; 2] = ["a", "b"];

#[derive(Debug, Clone)]
struct RuleSeed {
    target: usize,
    subject: usize,
    choice: usize,
    jump: Option<usize>,
}

fn build_form(parents: &[Option<usize>], required: &[bool], rules: &[RuleSeed]) -> Form {
    let count = parents.len();
    let elements: Vec<Value> = (0..count)
        .map(|index| {
            // Only earlier elements may be parents, which keeps the forest acyclic.
            let parent = parents[index].filter(|parent| *parent < index);
            json!({
                "id": index as i64 + 1,
                "position": (count - index) as i32 * 10,
                "export_id": format!("q{index}"),
                "is_required": required[index],
                "subordinate_to": parent.map(|parent| parent as i64 + 1),
            })
        })
        .collect();
    let rules: Vec<Value> = rules
        .iter()
        .enumerate()
        .map(|(index, seed)| {
            json!({
                "id": index as i64 + 1,
                "form_element_id": seed.target as i64 + 1,
                "boolean_operator": "AND",
                "command": if seed.jump.is_some() { "JUMP" } else { "SHOW" },
                "jump_to_id": seed.jump.map(|jump| jump as i64 + 1),
                "position": index as i32,
                "conditions": [{
                    "id": index as i64 + 1,
                    "subject_id": seed.subject as i64 + 1,
                    "operator": "EQUAL",
                    "value": CHOICES[seed.choice],
                }]
            })
        })
        .collect();
    let definition = json!({ "id": 1, "elements": elements, "rules": rules });
    Form::load(serde_json::from_value(definition).expect("definition")).expect("form")
}

fn scenario() -> impl Strategy<Value = (Form, AnswerSet)> {
    (2usize..10)
        .prop_flat_map(|count| {
            let rule = (
                0..count,
                0..count,
                0..CHOICES.len(),
                proptest::option::of(0..count),
            )
                .prop_map(|(target, subject, choice, jump)| RuleSeed {
                    target,
                    subject,
                    choice,
                    jump,
                });
            (
                proptest::collection::vec(proptest::option::of(0..count), count),
                proptest::collection::vec(any::<bool>(), count),
                proptest::collection::vec(rule, 0..count * 2),
                proptest::collection::vec(proptest::option::of(0..CHOICES.len()), count),
            )
        })
        .prop_map(|(parents, required, rules, answers)| {
            let form = build_form(&parents, &required, &rules);
            let answers: AnswerSet = answers
                .iter()
                .enumerate()
                .filter_map(|(index, choice)| {
                    choice.map(|choice| (index as i64 + 1, json!(CHOICES[choice])))
                })
                .collect();
            (form, answers)
        })
}

proptest! {
    #[test]
    fn visible_subordinates_have_visible_parents((form, answers) in scenario()) {
        let hidden = resolve_hidden(&form, &answers);
        for element in form.elements() {
            if let Some(parent) = element.subordinate_to {
                if !hidden.contains(&element.id) {
                    prop_assert!(!hidden.contains(&parent));
                }
            }
        }
    }

    #[test]
    fn evaluation_is_idempotent((form, answers) in scenario()) {
        prop_assert_eq!(resolve_hidden(&form, &answers), resolve_hidden(&form, &answers));
        prop_assert_eq!(
            unsatisfied_required(&form, &answers),
            unsatisfied_required(&form, &answers)
        );
        for element in form.elements() {
            prop_assert_eq!(
                next_element(&form, element.id, &answers),
                next_element(&form, element.id, &answers)
            );
        }
    }

    #[test]
    fn navigation_never_lands_on_hidden((form, answers) in scenario()) {
        let hidden = resolve_hidden(&form, &answers);
        for element in form.elements() {
            if let Some(next) = next_element(&form, element.id, &answers).expect("known element") {
                prop_assert!(!hidden.contains(&next));
            }
        }
    }

    #[test]
    fn hidden_required_never_blocks((form, answers) in scenario()) {
        let hidden = resolve_hidden(&form, &answers);
        for id in unsatisfied_required(&form, &answers) {
            prop_assert!(!hidden.contains(&id));
        }
    }
}
