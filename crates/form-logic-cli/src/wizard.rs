use form_logic::{ElementId, ElementType, Form, FormElement};
use serde_json::{Number, Value};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Question prompts only.
    Clean,
    /// Also progress counters and choice lists.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Progress counters as reported by the component.
#[derive(Debug, Clone, Copy, Default)]
pub struct WizardProgress {
    pub answered: usize,
    pub total: usize,
}

impl WizardProgress {
    pub fn from_json(value: &Value) -> Self {
        let counter = |name: &str| value.get(name).and_then(Value::as_u64).unwrap_or(0) as usize;
        Self {
            answered: counter("answered"),
            total: counter("total"),
        }
    }
}

pub struct WizardPresenter {
    verbosity: Verbosity,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            show_answers_json,
        }
    }

    pub fn show_header(&self, form: &Form) {
        match form.title() {
            Some(title) => println!("Form: {}", title),
            None => println!("Form {}", form.id()),
        }
    }

    /// Layout elements are printed and passed without input.
    pub fn show_statement(&self, element: &FormElement) {
        println!("{}", element.label());
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = if prompt.total > 0 {
            format!("{}/{} {}", prompt.index, prompt.total, prompt.title)
        } else {
            format!("{} {}", prompt.index, prompt.title)
        };
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if self.verbosity.is_verbose() && !prompt.choices.is_empty() {
            println!("Choices: {}", prompt.choices.join(", "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_missing(&self, form: &Form, missing: &[ElementId]) {
        let labels = missing
            .iter()
            .map(|id| match form.element(*id) {
                Some(element) => element.label().to_string(),
                None => id.to_string(),
            })
            .collect::<Vec<_>>();
        eprintln!("Missing required answers: {}", labels.join(", "));
    }

    pub fn show_completion(&self, answers: &Value, progress: WizardProgress) {
        println!("Done.");
        if self.verbosity.is_verbose() {
            println!("Answered {} of {}", progress.answered, progress.total);
        }
        if self.show_answers_json {
            match serde_json::to_string_pretty(answers) {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize answers to JSON: {}", err),
            }
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub required: bool,
    pub hint: Option<String>,
    pub choices: Vec<String>,
}

impl PromptContext {
    pub fn new(element: &FormElement, progress: WizardProgress) -> Self {
        Self {
            index: (progress.answered + 1).max(1),
            total: progress.total,
            title: element.label().to_string(),
            required: element.is_required,
            hint: hint_for(element),
            choices: element.settings.choices.clone(),
        }
    }
}

fn hint_for(element: &FormElement) -> Option<String> {
    let choices = &element.settings.choices;
    match element.kind {
        ElementType::YesNo => Some("(yes/no)".to_string()),
        ElementType::Number | ElementType::Rating => Some("(number)".to_string()),
        ElementType::Email => Some("(email)".to_string()),
        ElementType::MultipleChoice | ElementType::ComboBox if !choices.is_empty() => {
            if element.settings.multiple_select {
                Some(format!("({}; comma separated)", choices.join("/")))
            } else {
                Some(format!("({})", choices.join("/")))
            }
        }
        ElementType::Name | ElementType::Consent | ElementType::Matrix => {
            Some("(JSON object)".to_string())
        }
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Turns a typed line into the answer value stored for `element`.
pub fn parse_answer(element: &FormElement, raw: &str) -> Result<Value, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        if element.is_required {
            return Err(AnswerParseError::new(
                "This question requires an answer.",
                None,
            ));
        }
        return Ok(Value::Null);
    }

    match element.kind {
        ElementType::YesNo => parse_boolean(raw),
        ElementType::Number | ElementType::Rating => parse_number(raw),
        ElementType::Email => parse_email(raw),
        ElementType::MultipleChoice | ElementType::ComboBox => parse_choices(element, raw),
        ElementType::Name | ElementType::Consent | ElementType::Matrix => parse_object(raw),
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn parse_boolean(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
        "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_number(raw: &str) -> Result<Value, AnswerParseError> {
    if let Ok(integer) = raw.parse::<i64>() {
        return Ok(Value::Number(Number::from(integer)));
    }
    raw.parse::<f64>()
        .map_err(|_| {
            AnswerParseError::new(
                "Please enter a number.",
                Some("expected number".to_string()),
            )
        })
        .and_then(|value| {
            Number::from_f64(value).map(Value::Number).ok_or_else(|| {
                AnswerParseError::new(
                    "Please enter a finite number.",
                    Some("number must be finite".to_string()),
                )
            })
        })
}

fn parse_email(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(Value::String(raw.to_string()))
        }
        _ => Err(AnswerParseError::new(
            "Please enter an email address.",
            Some("expected name@domain".to_string()),
        )),
    }
}

/// Choice answers are stored as arrays, one item unless multiple selection is on.
fn parse_choices(element: &FormElement, raw: &str) -> Result<Value, AnswerParseError> {
    let allowed = &element.settings.choices;
    let picks: Vec<&str> = if element.settings.multiple_select {
        raw.split(',')
            .map(str::trim)
            .filter(|pick| !pick.is_empty())
            .collect()
    } else {
        vec![raw]
    };

    let mut selected = Vec::with_capacity(picks.len());
    for pick in picks {
        if allowed.is_empty() {
            selected.push(Value::String(pick.to_string()));
            continue;
        }
        match allowed.iter().find(|choice| choice.eq_ignore_ascii_case(pick)) {
            Some(choice) => selected.push(Value::String(choice.clone())),
            None => {
                return Err(AnswerParseError::new(
                    format!("Choose from: {}.", allowed.join(", ")),
                    Some(format!("'{}' is not a listed choice", pick)),
                ));
            }
        }
    }
    Ok(Value::Array(selected))
}

fn parse_object(raw: &str) -> Result<Value, AnswerParseError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err(AnswerParseError::new(
            "This answer must be a JSON object.",
            None,
        )),
        Err(err) => Err(AnswerParseError::new(
            "Invalid answer; provide a JSON object (e.g. {\"name\": \"Ada\"}).",
            Some(err.to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use form_logic::ComponentSettings;
    use serde_json::json;

    fn element(kind: ElementType, required: bool) -> FormElement {
        FormElement {
            id: 1,
            position: 1,
            kind,
            is_required: required,
            export_id: "q".into(),
            title: None,
            jump_to_id: None,
            subordinate_to: None,
            settings: ComponentSettings::default(),
        }
    }

    fn choice_element(multiple_select: bool) -> FormElement {
        let mut element = element(ElementType::MultipleChoice, true);
        element.settings.choices = vec!["fish".into(), "mammal".into()];
        element.settings.multiple_select = multiple_select;
        element
    }

    #[test]
    fn yes_no_accepts_common_spellings() {
        let question = element(ElementType::YesNo, true);
        assert_eq!(parse_answer(&question, "Y").unwrap(), Value::Bool(true));
        assert_eq!(parse_answer(&question, "no").unwrap(), Value::Bool(false));
        assert!(parse_answer(&question, "maybe").is_err());
    }

    #[test]
    fn numbers_keep_integers_exact() {
        let question = element(ElementType::Number, false);
        assert_eq!(parse_answer(&question, "42").unwrap(), json!(42));
        assert_eq!(parse_answer(&question, "2.5").unwrap(), json!(2.5));
        assert!(parse_answer(&question, "lots").is_err());
    }

    #[test]
    fn choices_match_case_insensitively() {
        let question = choice_element(false);
        assert_eq!(parse_answer(&question, "Fish").unwrap(), json!(["fish"]));
        assert!(parse_answer(&question, "bird").is_err());
    }

    #[test]
    fn multiple_select_splits_on_commas() {
        let question = choice_element(true);
        assert_eq!(
            parse_answer(&question, "mammal, fish").unwrap(),
            json!(["mammal", "fish"])
        );
    }

    #[test]
    fn blank_answers_depend_on_required() {
        assert!(parse_answer(&element(ElementType::ShortText, true), "  ").is_err());
        assert_eq!(
            parse_answer(&element(ElementType::ShortText, false), "").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn structured_answers_need_objects() {
        let question = element(ElementType::Name, true);
        assert!(parse_answer(&question, r#"{"name": "Ada"}"#).is_ok());
        assert!(parse_answer(&question, r#"["Ada"]"#).is_err());
        assert!(parse_answer(&question, "Ada").is_err());
    }

    #[test]
    fn email_requires_domain() {
        let question = element(ElementType::Email, true);
        assert!(parse_answer(&question, "ada@example.com").is_ok());
        assert!(parse_answer(&question, "ada").is_err());
    }
}
