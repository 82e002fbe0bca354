mod logging;
mod wizard;

use clap::{Parser, Subcommand, ValueEnum};
use form_logic::{
    AnswerSet, ElementId, ExportOptions, ExportTable, Form, Response, ValidationResult,
    definition_schema, first_element, next_element, path_to, project, resolve_hidden, validate,
};
use form_logic_component::{next as component_next, submit_all, submit_patch};
use logging::{LogConfig, LogFormat, init_logging};
use serde_json::{Value, json};
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use wizard::{PromptContext, Verbosity, WizardPresenter, WizardProgress, parse_answer};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Adaptive form logic tools",
    long_about = "Checks form definitions, evaluates visibility and branching for a set of answers, \
                  walks a form interactively and exports responses"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum ExportFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Load a form definition and report configuration errors.
    Check {
        /// Path to the form definition JSON.
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
    },
    /// Print the ids of elements hidden for a set of answers.
    Hidden {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        /// JSON object of answers keyed by element id.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// Print the element presented after `--current`, or the first element.
    Next {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        #[arg(long, value_name = "ELEMENT_ID")]
        current: Option<ElementId>,
    },
    /// Print the elements a respondent visits on the way to `--to`.
    Path {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        #[arg(long, value_name = "ELEMENT_ID")]
        to: ElementId,
    },
    /// Check that every visible required element is answered.
    Validate {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Flatten a JSON array of responses into a table.
    Export {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        /// JSON array of responses.
        #[arg(long, value_name = "RESPONSES")]
        responses: PathBuf,
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Write to this file instead of stdout.
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
        /// Text written for questions hidden from a respondent.
        #[arg(long, default_value = "<skipped>")]
        skipped_marker: String,
        /// Separator between items of multi-valued answers.
        #[arg(long, default_value = ", ")]
        list_separator: String,
    },
    /// Print the JSON Schema of form definitions.
    Schema,
    /// Walk a form in the terminal, one element at a time.
    Wizard {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        /// Optional JSON file containing initial answers.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Show progress counters and choice lists.
        #[arg(long, alias = "debug")]
        verbose_prompts: bool,
        /// Print the collected answers as JSON at the end.
        #[arg(long)]
        answers_json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_config = LogConfig::from_verbosity(cli.verbose)
        .with_format(cli.log_format)
        .with_ansi(io::stderr().is_terminal());
    init_logging(&log_config);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> CliResult<()> {
    match command {
        Command::Check { form } => run_check(&form),
        Command::Hidden { form, answers } => run_hidden(&form, answers.as_deref()),
        Command::Next {
            form,
            answers,
            current,
        } => run_next(&form, answers.as_deref(), current),
        Command::Path { form, answers, to } => run_path(&form, answers.as_deref(), to),
        Command::Validate { form, answers } => run_validate(&form, &answers),
        Command::Export {
            form,
            responses,
            format,
            out,
            skipped_marker,
            list_separator,
        } => {
            let options = ExportOptions {
                skipped_marker,
                list_separator,
            };
            run_export(&form, &responses, format, out.as_deref(), &options)
        }
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&definition_schema())?);
            Ok(())
        }
        Command::Wizard {
            form,
            answers,
            verbose_prompts,
            answers_json,
        } => run_wizard(&form, answers.as_deref(), verbose_prompts, answers_json),
    }
}

fn load_form(path: &Path) -> CliResult<Form> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("cannot read form '{}': {}", path.display(), err))?;
    let form = Form::from_json(&contents)?;
    debug!(path = %path.display(), form_id = form.id(), "loaded form");
    Ok(form)
}

fn load_answers(path: Option<&Path>) -> CliResult<AnswerSet> {
    match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .map_err(|err| format!("cannot read answers '{}': {}", path.display(), err))?;
            Ok(serde_json::from_str(&contents)?)
        }
        None => Ok(AnswerSet::new()),
    }
}

fn run_check(form_path: &Path) -> CliResult<()> {
    let form = load_form(form_path)?;
    println!(
        "Form {} is valid: {} elements, {} rules",
        form.id(),
        form.elements().len(),
        form.rules().len()
    );
    Ok(())
}

fn run_hidden(form_path: &Path, answers_path: Option<&Path>) -> CliResult<()> {
    let form = load_form(form_path)?;
    let answers = load_answers(answers_path)?;
    let hidden = resolve_hidden(&form, &answers);
    println!("{}", serde_json::to_string(&hidden)?);
    Ok(())
}

fn run_next(
    form_path: &Path,
    answers_path: Option<&Path>,
    current: Option<ElementId>,
) -> CliResult<()> {
    let form = load_form(form_path)?;
    let answers = load_answers(answers_path)?;
    let next = match current {
        Some(current) => next_element(&form, current, &answers)?,
        None => first_element(&form, &answers),
    };
    match next {
        Some(id) => println!("{}", id),
        None => println!("end"),
    }
    Ok(())
}

fn run_path(form_path: &Path, answers_path: Option<&Path>, target: ElementId) -> CliResult<()> {
    let form = load_form(form_path)?;
    let answers = load_answers(answers_path)?;
    let path = path_to(&form, target, &answers)?;
    let rendered = path.iter().map(ToString::to_string).collect::<Vec<_>>();
    println!("{}", rendered.join(" -> "));
    Ok(())
}

fn run_validate(form_path: &Path, answers_path: &Path) -> CliResult<()> {
    let form = load_form(form_path)?;
    let answers = load_answers(Some(answers_path))?;

    let result = validate(&form, &answers);
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&form, &result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(form: &Form, result: &ValidationResult) {
    if !result.missing_required.is_empty() {
        let missing = result
            .missing_required
            .iter()
            .map(|id| match form.element(*id) {
                Some(element) => format!("{} ({})", element.export_id, id),
                None => id.to_string(),
            })
            .collect::<Vec<_>>();
        println!("Missing required answers: {}", missing.join(", "));
    }
    if !result.unknown_fields.is_empty() {
        let unknown = result
            .unknown_fields
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        println!("Unknown answer fields: {}", unknown.join(", "));
    }
}

fn run_export(
    form_path: &Path,
    responses_path: &Path,
    format: ExportFormat,
    out: Option<&Path>,
    options: &ExportOptions,
) -> CliResult<()> {
    let form = load_form(form_path)?;
    let contents = fs::read_to_string(responses_path).map_err(|err| {
        format!(
            "cannot read responses '{}': {}",
            responses_path.display(),
            err
        )
    })?;
    let responses: Vec<Response> = serde_json::from_str(&contents)?;
    let table = project(&form, &responses);

    let writer: Box<dyn Write> = match out {
        Some(path) => Box::new(fs::File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    match format {
        ExportFormat::Csv => write_csv(&table, options, writer)?,
        ExportFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, &table)?;
            writeln!(writer)?;
        }
    }
    info!(
        rows = table.rows.len(),
        columns = table.columns.len(),
        "export written"
    );
    Ok(())
}

fn write_csv(table: &ExportTable, options: &ExportOptions, writer: impl Write) -> CliResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&table.columns)?;
    for row in table.rendered_rows(options) {
        csv.write_record(&row)?;
    }
    csv.flush()?;
    Ok(())
}

fn run_wizard(
    form_path: &Path,
    answers_path: Option<&Path>,
    verbose: bool,
    answers_json: bool,
) -> CliResult<()> {
    let form_json = fs::read_to_string(form_path)
        .map_err(|err| format!("cannot read form '{}': {}", form_path.display(), err))?;
    let form = Form::from_json(&form_json)?;
    let form_id = form.id();
    let config_json = json!({ "form_json": form_json }).to_string();

    let mut answers = match answers_path {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => json!({}),
    };

    let presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), answers_json);
    presenter.show_header(&form);

    let step = parse_component_result(&component_next(
        form_id,
        &config_json,
        None,
        &answers.to_string(),
    ))?;
    let mut progress = WizardProgress::from_json(&step["progress"]);
    let mut current = step["next_element_id"].as_i64();

    while let Some(element_id) = current {
        let element = form
            .element(element_id)
            .ok_or_else(|| format!("wizard returned unknown element {}", element_id))?;
        let answers_str = answers.to_string();

        if !element.is_input() {
            presenter.show_statement(element);
            let step = parse_component_result(&component_next(
                form_id,
                &config_json,
                Some(element_id),
                &answers_str,
            ))?;
            current = step["next_element_id"].as_i64();
            continue;
        }

        let prompt = PromptContext::new(element, progress);
        let answer = prompt_element(&prompt, element, &presenter)?;
        let value_json = serde_json::to_string(&answer)?;
        let submitted = parse_component_result(&submit_patch(
            form_id,
            &config_json,
            &answers_str,
            element_id,
            &value_json,
        ))?;

        if submitted["status"] == "error" {
            presenter.show_missing(&form, &missing_required(&submitted));
            if submitted["next_element_id"].as_i64() == Some(element_id) {
                continue;
            }
            return Err("form ended with required questions unanswered".into());
        }

        answers = submitted["answers"].clone();
        progress = WizardProgress::from_json(&submitted["progress"]);
        current = submitted["next_element_id"].as_i64();
    }

    let finished = parse_component_result(&submit_all(form_id, &config_json, &answers.to_string()))?;
    if finished["status"] == "error" {
        presenter.show_missing(&form, &missing_required(&finished));
        return Err("form ended with required questions unanswered".into());
    }
    presenter.show_completion(
        &finished["answers"],
        WizardProgress::from_json(&finished["progress"]),
    );
    Ok(())
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn missing_required(response: &Value) -> Vec<ElementId> {
    response["validation"]["missing_required"]
        .as_array()
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

fn prompt_element(
    prompt: &PromptContext,
    element: &form_logic::FormElement,
    presenter: &WizardPresenter,
) -> CliResult<Value> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("input ended before the form was complete".into());
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("wizard aborted by user".into());
        }

        match parse_answer(element, trimmed) {
            Ok(value) => return Ok(value),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}
