//! Flattening of responses into a tabular export.
//!
//! Columns depend on the form alone, so every row of an export has the same
//! shape no matter which branch each respondent took. Questions hidden from a
//! respondent are exported as [`ExportCell::Skipped`], which stays distinct
//! from a visible question left blank ([`ExportCell::Unanswered`]).

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::answers::{AnswerSet, is_blank};
use crate::definition::{ElementId, ElementType, FormElement};
use crate::error::ConfigurationError;
use crate::form::Form;
use crate::visibility::resolve_hidden;

/// Response metadata columns, always leading the export.
pub const METADATA_COLUMNS: [&str; 8] = [
    "id",
    "survey_id",
    "created_at_utc",
    "updated_at_utc",
    "is_practice",
    "is_duplicate_ip",
    "is_logged_in",
    "account_email",
];

/// A submitted or in-progress response as handed over by response storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: i64,
    pub survey_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_practice: bool,
    #[serde(default)]
    pub is_duplicate_ip: bool,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub account_email: Option<String>,
    #[serde(default)]
    pub data: AnswerSet,
}

/// One exported value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ExportCell {
    Answered(Value),
    /// The question was shown but left blank.
    Unanswered,
    /// The question was never shown to this respondent.
    Skipped,
}

/// Text rendering options for export cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub skipped_marker: String,
    pub list_separator: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            skipped_marker: "<skipped>".into(),
            list_separator: ", ".into(),
        }
    }
}

impl ExportCell {
    fn from_answer(answer: Option<&Value>) -> Self {
        match answer {
            Some(value) if !is_blank(Some(value)) => ExportCell::Answered(value.clone()),
            _ => ExportCell::Unanswered,
        }
    }

    /// Flat text for delimited formats.
    pub fn render(&self, options: &ExportOptions) -> String {
        match self {
            ExportCell::Skipped => options.skipped_marker.clone(),
            ExportCell::Unanswered => String::new(),
            ExportCell::Answered(Value::Array(items)) => items
                .iter()
                .map(render_scalar)
                .collect::<Vec<_>>()
                .join(&options.list_separator),
            ExportCell::Answered(value) => render_scalar(value),
        }
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Cells of one response, aligned with [`ExportTable::columns`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub response_id: i64,
    pub cells: Vec<ExportCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTable {
    pub columns: Vec<String>,
    pub rows: Vec<ExportRow>,
}

impl ExportTable {
    /// Rows rendered to text, ready for a delimited writer.
    pub fn rendered_rows<'a>(
        &'a self,
        options: &'a ExportOptions,
    ) -> impl Iterator<Item = Vec<String>> + 'a {
        self.rows
            .iter()
            .map(move |row| row.cells.iter().map(|cell| cell.render(options)).collect())
    }
}

/// Export column names: metadata first, then input elements by position.
pub fn export_columns(form: &Form) -> Vec<String> {
    let mut columns: Vec<String> = METADATA_COLUMNS.iter().map(|name| name.to_string()).collect();
    for element in form.elements().iter().filter(|element| element.is_input()) {
        columns.extend(element_columns(element));
    }
    columns
}

/// Projects every response into a row, evaluating visibility per response.
pub fn project(form: &Form, responses: &[Response]) -> ExportTable {
    let columns = export_columns(form);

    #[cfg(feature = "parallel")]
    let rows: Vec<ExportRow> = {
        use rayon::prelude::*;
        responses
            .par_iter()
            .map(|response| project_response(form, response))
            .collect()
    };
    #[cfg(not(feature = "parallel"))]
    let rows: Vec<ExportRow> = responses
        .iter()
        .map(|response| project_response(form, response))
        .collect();

    debug!(
        form_id = form.id(),
        columns = columns.len(),
        rows = rows.len(),
        "projected responses"
    );
    ExportTable { columns, rows }
}

/// Projects a single response using its own answers to decide what was hidden.
pub fn project_response(form: &Form, response: &Response) -> ExportRow {
    let hidden = resolve_hidden(form, &response.data);
    let mut cells = metadata_cells(response);
    for element in form.elements().iter().filter(|element| element.is_input()) {
        if hidden.contains(&element.id) {
            let width = element_columns(element).len();
            cells.extend(std::iter::repeat_n(ExportCell::Skipped, width));
        } else {
            cells.extend(element_cells(element, response.data.get(element.id)));
        }
    }
    ExportRow {
        response_id: response.id,
        cells,
    }
}

fn metadata_cells(response: &Response) -> Vec<ExportCell> {
    let timestamp =
        |at: &DateTime<Utc>| Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true));
    vec![
        ExportCell::Answered(Value::from(response.id)),
        ExportCell::Answered(Value::from(response.survey_id)),
        ExportCell::Answered(timestamp(&response.created_at)),
        response
            .updated_at
            .as_ref()
            .map_or(ExportCell::Unanswered, |at| ExportCell::Answered(timestamp(at))),
        ExportCell::Answered(Value::Bool(response.is_practice)),
        ExportCell::Answered(Value::Bool(response.is_duplicate_ip)),
        ExportCell::Answered(Value::Bool(response.user_id.is_some())),
        response
            .account_email
            .as_ref()
            .map_or(ExportCell::Unanswered, |email| {
                ExportCell::Answered(Value::String(email.clone()))
            }),
    ]
}

/// Fails when two export columns of the form would carry the same name.
///
/// Metadata columns are reserved, and the fixed columns added by `name`
/// elements count as well.
pub(crate) fn check_export_columns(elements: &[FormElement]) -> Result<(), ConfigurationError> {
    let mut owners: HashMap<String, Option<ElementId>> = METADATA_COLUMNS
        .iter()
        .map(|name| (name.to_string(), None))
        .collect();
    for element in elements.iter().filter(|element| element.is_input()) {
        for column in element_columns(element) {
            if let Some(first) = owners.get(&column) {
                return Err(ConfigurationError::DuplicateExportColumn {
                    column,
                    first: *first,
                    second: element.id,
                });
            }
            owners.insert(column, Some(element.id));
        }
    }
    Ok(())
}

fn element_columns(element: &FormElement) -> Vec<String> {
    let export_id = &element.export_id;
    match element.kind {
        ElementType::Name => vec![
            export_id.clone(),
            "is_facilitated".into(),
            "facilitator_name".into(),
        ],
        ElementType::Consent => vec![
            export_id.clone(),
            format!("{export_id}_doc_version"),
            format!("{export_id}_doc_clicked"),
        ],
        ElementType::Matrix => element
            .settings
            .rows
            .iter()
            .map(|row| format!("{export_id}_{}", row.key()))
            .collect(),
        _ => vec![export_id.clone()],
    }
}

/// Cells for a visible element; the count always matches [`element_columns`].
fn element_cells(element: &FormElement, answer: Option<&Value>) -> Vec<ExportCell> {
    let field = |name: &str| answer.and_then(|value| value.get(name));
    match element.kind {
        ElementType::Name => {
            let facilitated = field("facilitator").is_some_and(|value| !is_blank(Some(value)));
            if answer.is_none() {
                return vec![ExportCell::Unanswered; 3];
            }
            vec![
                ExportCell::from_answer(field("name")),
                ExportCell::Answered(Value::Bool(facilitated)),
                ExportCell::from_answer(field("facilitator")),
            ]
        }
        ElementType::Consent => {
            if answer.is_none() {
                return vec![ExportCell::Unanswered; 3];
            }
            vec![
                ExportCell::Answered(Value::Bool(truthy(field("consented")))),
                ExportCell::from_answer(field("docVersion")),
                ExportCell::Answered(Value::Bool(truthy(field("clickedDoc")))),
            ]
        }
        ElementType::Matrix => element
            .settings
            .rows
            .iter()
            .map(|row| ExportCell::from_answer(field(row.key())))
            .collect(),
        ElementType::MultipleChoice if element.settings.multiple_select => {
            vec![ExportCell::from_answer(answer)]
        }
        ElementType::MultipleChoice | ElementType::ComboBox => {
            let single = match answer {
                Some(Value::Array(items)) => items.first(),
                other => other,
            };
            vec![ExportCell::from_answer(single)]
        }
        _ => vec![ExportCell::from_answer(answer)],
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_cells_for_delimited_output() {
        let options = ExportOptions::default();
        assert_eq!(ExportCell::Skipped.render(&options), "<skipped>");
        assert_eq!(ExportCell::Unanswered.render(&options), "");
        assert_eq!(ExportCell::Answered(json!(true)).render(&options), "True");
        assert_eq!(ExportCell::Answered(json!(false)).render(&options), "False");
        assert_eq!(ExportCell::Answered(json!(["a", 2])).render(&options), "a, 2");
        assert_eq!(ExportCell::Answered(json!({ "k": 1 })).render(&options), r#"{"k":1}"#);
    }

    #[test]
    fn expands_component_columns() {
        let name: FormElement = serde_json::from_value(json!({
            "id": 1, "position": 1, "type": "name", "export_id": "respondent"
        }))
        .unwrap();
        assert_eq!(
            element_columns(&name),
            vec!["respondent", "is_facilitated", "facilitator_name"]
        );
        assert_eq!(
            element_cells(&name, Some(&json!({ "name": "Ada", "facilitator": "Bo" }))),
            vec![
                ExportCell::Answered(json!("Ada")),
                ExportCell::Answered(json!(true)),
                ExportCell::Answered(json!("Bo")),
            ]
        );

        let matrix: FormElement = serde_json::from_value(json!({
            "id": 2, "position": 2, "type": "matrix", "export_id": "rate",
            "settings": { "rows": [{ "label": "Food", "value": "food" }, { "label": "Service" }] }
        }))
        .unwrap();
        assert_eq!(element_columns(&matrix), vec!["rate_food", "rate_Service"]);
        assert_eq!(
            element_cells(&matrix, Some(&json!({ "food": 4 }))),
            vec![ExportCell::Answered(json!(4)), ExportCell::Unanswered]
        );
    }

    #[test]
    fn single_choice_exports_first_selection() {
        let choice: FormElement = serde_json::from_value(json!({
            "id": 1, "position": 1, "type": "multiple_choice", "export_id": "animal"
        }))
        .unwrap();
        assert_eq!(
            element_cells(&choice, Some(&json!(["fish", "bird"]))),
            vec![ExportCell::Answered(json!("fish"))]
        );

        let mut multi = choice.clone();
        multi.settings.multiple_select = true;
        assert_eq!(
            element_cells(&multi, Some(&json!(["fish", "bird"]))),
            vec![ExportCell::Answered(json!(["fish", "bird"]))]
        );
    }

    #[test]
    fn consent_normalizes_flags() {
        let consent: FormElement = serde_json::from_value(json!({
            "id": 1, "position": 1, "type": "consent", "export_id": "consent"
        }))
        .unwrap();
        assert_eq!(
            element_cells(&consent, Some(&json!({ "consented": true, "docVersion": 2 }))),
            vec![
                ExportCell::Answered(json!(true)),
                ExportCell::Answered(json!(2)),
                ExportCell::Answered(json!(false)),
            ]
        );
        assert_eq!(element_cells(&consent, None), vec![ExportCell::Unanswered; 3]);
    }
}
