use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

use form_logic::{
    AnswerSet, ElementId, Form, FormDefinition, LoadError, NavigationError, Response,
    ValidationResult, first_element, next_element, paging_state, progress, project,
    resolve_hidden, resolve_visibility, validate, visible_answers,
};

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("config does not contain a form definition")]
    MissingForm,
    #[error("form '{0}' is not available")]
    FormUnavailable(i64),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error("failed to parse {what}: {source}")]
    InputParse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
}

/// Host configuration: the form either inline or as an embedded JSON string.
#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    form: Option<FormDefinition>,
    #[serde(default)]
    form_json: Option<String>,
}

fn load_form(config_json: &str) -> Result<Form, ComponentError> {
    let config: ComponentConfig =
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?;
    match (config.form, config.form_json) {
        (Some(definition), _) => Ok(Form::load(definition).map_err(LoadError::from)?),
        (None, Some(form_json)) => Ok(Form::from_json(&form_json)?),
        (None, None) => Err(ComponentError::MissingForm),
    }
}

fn ensure_form(form_id: i64, config_json: &str) -> Result<Form, ComponentError> {
    let form = load_form(config_json)?;
    if form.id() != form_id {
        Err(ComponentError::FormUnavailable(form_id))
    } else {
        Ok(form)
    }
}

/// An empty payload is an empty answer set; anything else must parse.
fn parse_answers(answers_json: &str) -> Result<AnswerSet, ComponentError> {
    if answers_json.trim().is_empty() {
        return Ok(AnswerSet::new());
    }
    serde_json::from_str(answers_json).map_err(|source| {
        warn!(error = %source, "rejecting unparseable answers");
        ComponentError::InputParse {
            what: "answers",
            source,
        }
    })
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn to_value(value: &impl Serialize) -> Result<Value, ComponentError> {
    serde_json::to_value(value).map_err(ComponentError::JsonEncode)
}

/// Returns the form definition as loaded.
pub fn describe(form_id: i64, config_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|form| to_value(form.definition())))
}

/// Hidden element ids plus a per-element visibility map.
pub fn hidden_elements(form_id: i64, config_json: &str, answers_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|form| {
        let answers = parse_answers(answers_json)?;
        let visibility = resolve_visibility(&form, &answers)
            .into_iter()
            .map(|(id, visible)| (id.to_string(), Value::Bool(visible)))
            .collect::<serde_json::Map<_, _>>();
        Ok(json!({
            "hidden": resolve_hidden(&form, &answers),
            "visibility": visibility,
        }))
    }))
}

/// Next element after `current_id`, or the first element when none is given.
pub fn next(
    form_id: i64,
    config_json: &str,
    current_id: Option<ElementId>,
    answers_json: &str,
) -> String {
    respond(ensure_form(form_id, config_json).and_then(|form| {
        let answers = parse_answers(answers_json)?;
        let next = match current_id {
            Some(current) => next_element(&form, current, &answers)?,
            None => first_element(&form, &answers),
        };
        Ok(json!({
            "status": if next.is_some() { "need_input" } else { "complete" },
            "next_element_id": next,
            "progress": progress(&form, &answers),
        }))
    }))
}

/// Previous/next neighbours of `current_id` on the respondent's path.
pub fn paging(form_id: i64, config_json: &str, current_id: ElementId, answers_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|form| {
        let answers = parse_answers(answers_json)?;
        to_value(&paging_state(&form, current_id, &answers)?)
    }))
}

pub fn validate_answers(form_id: i64, config_json: &str, answers_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|form| {
        let answers = parse_answers(answers_json)?;
        to_value(&validate(&form, &answers))
    }))
}

fn build_error_response(
    form: &Form,
    answers: &AnswerSet,
    next: Option<ElementId>,
    validation: &ValidationResult,
) -> Result<Value, ComponentError> {
    Ok(json!({
        "status": "error",
        "next_element_id": next,
        "progress": progress(form, answers),
        "answers": to_value(answers)?,
        "validation": to_value(validation)?,
    }))
}

/// Records one answer and reports where the respondent goes next.
///
/// The patch is rejected when it leaves the patched element required, visible
/// and blank.
pub fn submit_patch(
    form_id: i64,
    config_json: &str,
    answers_json: &str,
    element_id: ElementId,
    value_json: &str,
) -> String {
    respond(ensure_form(form_id, config_json).and_then(|form| {
        let value: Value =
            serde_json::from_str(value_json).map_err(|source| ComponentError::InputParse {
                what: "answer value",
                source,
            })?;
        let mut answers = parse_answers(answers_json)?;
        answers.insert(element_id, value);

        let next = next_element(&form, element_id, &answers)?;
        let validation = validate(&form, &answers);
        if validation.missing_required.contains(&element_id) {
            return build_error_response(&form, &answers, Some(element_id), &validation);
        }

        if next.is_none() && !validation.missing_required.is_empty() {
            return build_error_response(&form, &answers, None, &validation);
        }
        Ok(json!({
            "status": if next.is_some() { "need_input" } else { "complete" },
            "next_element_id": next,
            "progress": progress(&form, &answers),
            "answers": to_value(&answers)?,
        }))
    }))
}

/// Final submission: succeeds only when every visible required element is answered.
///
/// On success the answers are returned without those of hidden elements.
pub fn submit_all(form_id: i64, config_json: &str, answers_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|form| {
        let answers = parse_answers(answers_json)?;
        let validation = validate(&form, &answers);
        if !validation.missing_required.is_empty() {
            let next = validation.missing_required.first().copied();
            return build_error_response(&form, &answers, next, &validation);
        }
        Ok(json!({
            "status": "complete",
            "next_element_id": Value::Null,
            "progress": progress(&form, &answers),
            "answers": to_value(&visible_answers(&form, &answers))?,
        }))
    }))
}

/// Export table for a batch of responses.
pub fn export(form_id: i64, config_json: &str, responses_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|form| {
        let responses: Vec<Response> =
            serde_json::from_str(responses_json).map_err(|source| ComponentError::InputParse {
                what: "responses",
                source,
            })?;
        to_value(&project(&form, &responses))
    }))
}
