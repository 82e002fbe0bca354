use serde::Serialize;
use tracing::{debug, warn};

use crate::answers::AnswerSet;
use crate::definition::{ElementId, ElementType};
use crate::error::NavigationError;
use crate::form::Form;
use crate::visibility::{HiddenSet, resolve_hidden};

/// Navigation context around the element currently presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagingState {
    pub current: ElementId,
    pub previous: Option<ElementId>,
    pub next: Option<ElementId>,
    /// The current element is the first question: it directly follows the
    /// welcome page, or opens a form that has none. Never set on the welcome
    /// page itself.
    pub is_first: bool,
    /// Advancing ends the form, or lands on its closing page.
    pub is_last: bool,
}

/// Counters over the visible input elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

/// First element presented to a respondent with `answers`.
pub fn first_element(form: &Form, answers: &AnswerSet) -> Option<ElementId> {
    let hidden = resolve_hidden(form, answers);
    first_visible_from(form, 0, &hidden).map(|index| form.elements()[index].id)
}

/// Element presented after `current`, or `None` at the end of the form.
///
/// The first matching rule on `current` that carries a jump target wins, in
/// ascending rule position. Without one, the element's own `jump_to_id` is
/// followed, and otherwise the next element by position. Hidden elements are
/// never returned: a jump landing on one continues to the next visible element
/// after it. Visibility is recomputed from `answers` on every call.
pub fn next_element(
    form: &Form,
    current: ElementId,
    answers: &AnswerSet,
) -> Result<Option<ElementId>, NavigationError> {
    let current_index = form
        .index_of(current)
        .ok_or(NavigationError::UnknownElement(current))?;
    let hidden = resolve_hidden(form, answers);
    Ok(next_index(form, current_index, answers, &hidden).map(|index| form.elements()[index].id))
}

/// Elements visited from the first element up to and including `target`.
pub fn path_to(
    form: &Form,
    target: ElementId,
    answers: &AnswerSet,
) -> Result<Vec<ElementId>, NavigationError> {
    let target_index = form
        .index_of(target)
        .ok_or(NavigationError::UnknownElement(target))?;
    let hidden = resolve_hidden(form, answers);
    let policy = form.navigation();
    let elements = form.elements();

    let mut cursor =
        first_visible_from(form, 0, &hidden).ok_or(NavigationError::Unreachable(target))?;
    let mut path = vec![elements[cursor].id];
    for _ in 0..policy.max_steps {
        if cursor == target_index {
            return Ok(path);
        }
        if cursor > target_index && !policy.allow_backward_jumps {
            return Err(NavigationError::Unreachable(target));
        }
        cursor = next_index(form, cursor, answers, &hidden)
            .ok_or(NavigationError::Unreachable(target))?;
        path.push(elements[cursor].id);
    }
    Err(NavigationError::StepLimitExceeded(policy.max_steps))
}

/// Element presented before `current` on the respondent's path.
pub fn previous_element(
    form: &Form,
    current: ElementId,
    answers: &AnswerSet,
) -> Result<Option<ElementId>, NavigationError> {
    let path = path_to(form, current, answers)?;
    Ok(path.len().checked_sub(2).map(|index| path[index]))
}

pub fn paging_state(
    form: &Form,
    current: ElementId,
    answers: &AnswerSet,
) -> Result<PagingState, NavigationError> {
    let previous = previous_element(form, current, answers)?;
    let next = next_element(form, current, answers)?;
    let is_last = next.is_none_or(|id| {
        form.element(id)
            .is_some_and(|element| element.kind == ElementType::ThankYou)
    });
    let is_first = match previous {
        Some(id) => form
            .element(id)
            .is_some_and(|element| element.kind == ElementType::WelcomeMessage),
        None => form.element(current).is_some_and(|element| element.is_input()),
    };
    Ok(PagingState {
        current,
        previous,
        next,
        is_first,
        is_last,
    })
}

/// Answered and total counts over visible input elements.
pub fn progress(form: &Form, answers: &AnswerSet) -> Progress {
    let hidden = resolve_hidden(form, answers);
    let visible_inputs = form
        .elements()
        .iter()
        .filter(|element| element.is_input() && !hidden.contains(&element.id));
    let mut counts = Progress {
        answered: 0,
        total: 0,
    };
    for element in visible_inputs {
        counts.total += 1;
        if !answers.is_blank(element.id) {
            counts.answered += 1;
        }
    }
    counts
}

fn next_index(
    form: &Form,
    current_index: usize,
    answers: &AnswerSet,
    hidden: &HiddenSet,
) -> Option<usize> {
    let current = &form.elements()[current_index];

    for rule in form.rules_for(current.id) {
        let Some(target) = rule.jump_to else {
            continue;
        };
        if !rule.evaluate(answers) {
            continue;
        }
        if let Some(landing) = follow_jump(form, current_index, target, hidden) {
            debug!(from = current.id, to = target, rule_id = rule.id, "rule jump taken");
            return landing;
        }
    }

    if let Some(target) = current.jump_to_id
        && let Some(landing) = follow_jump(form, current_index, target, hidden)
    {
        debug!(from = current.id, to = target, "element jump taken");
        return landing;
    }

    first_visible_from(form, current_index + 1, hidden)
}

/// Resolves a jump from `from_index` to `target`.
///
/// Returns `None` when the jump is ignored, `Some(None)` when it lands past
/// the last visible element.
fn follow_jump(
    form: &Form,
    from_index: usize,
    target: ElementId,
    hidden: &HiddenSet,
) -> Option<Option<usize>> {
    let target_index = form.index_of(target)?;
    if target_index <= from_index && !form.navigation().allow_backward_jumps {
        warn!(
            from = form.elements()[from_index].id,
            to = target,
            "ignoring jump that would move backward in the form"
        );
        return None;
    }
    Some(first_visible_from(form, target_index, hidden))
}

fn first_visible_from(form: &Form, start: usize, hidden: &HiddenSet) -> Option<usize> {
    form.elements()
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, element)| !hidden.contains(&element.id))
        .map(|(index, _)| index)
}
