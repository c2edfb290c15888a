use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, info};
use wizard_lib::{
    Navigation, ResourceId, SubmissionPipeline, SubmitOutcome, ValidationResult,
    WizardController,
};
use wizard_spec::{ReviewSummary, render_review_text};

use crate::config::ConsoleConfig;
use crate::presets;
use crate::simulate::SimulatedCreate;

pub const ANSWERS_SCHEMA: &str = "console-wizard-run/v1";

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Wizard id, e.g. `launch-instance`
    #[arg(value_name = "WIZARD")]
    pub wizard: String,
    /// Answers document (`console-wizard-run/v1`)
    #[arg(long = "answers", value_name = "answers.json")]
    pub answers: PathBuf,
    /// Print the result as JSON
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
    /// Write the configuration snapshot handed to the create call
    #[arg(long = "snapshot-out", value_name = "snapshot.json")]
    pub snapshot_out: Option<PathBuf>,
    /// Make the simulated create call fail
    #[arg(long = "fail", default_value_t = false)]
    pub fail: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAnswers {
    pub schema: String,
    pub wizard: String,
    #[serde(default)]
    pub fields: JsonMap<String, JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub wizard: String,
    pub status: &'static str,
    pub resource_id: ResourceId,
    pub review: ReviewSummary,
}

pub fn run(args: RunArgs, config: &ConsoleConfig) -> Result<()> {
    let answers = load_answers(&args.answers)?;
    if answers.wizard != args.wizard {
        bail!(
            "answers in {} are for wizard '{}', not '{}'",
            args.answers.display(),
            answers.wizard,
            args.wizard
        );
    }

    let definition = presets::definition(&args.wizard)?;
    let mut controller = WizardController::new(definition);
    let review = walk(&mut controller, &answers)?;

    if let Some(path) = &args.snapshot_out {
        write_snapshot(&controller, path)?;
    }

    let create = SimulatedCreate::from_config(&config.simulation).failing(args.fail);
    let pipeline = SubmissionPipeline::new(create);
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let outcome = runtime.block_on(controller.submit(&pipeline));

    let resource_id = match outcome {
        SubmitOutcome::Created { resource_id } => resource_id,
        SubmitOutcome::Failed { error } => bail!("{} was not created: {error}", args.wizard),
        SubmitOutcome::Invalid {
            step, validation, ..
        } => bail!(invalid_step(&step, &validation)),
        SubmitOutcome::Rejected { phase } => {
            bail!("submission rejected while the wizard was {phase}")
        }
    };
    info!(wizard = %args.wizard, resource = %resource_id, "wizard finished");

    if args.json {
        let output = RunOutput {
            wizard: args.wizard,
            status: "created",
            resource_id,
            review,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", render_review_text(&review));
        println!();
        println!("Created {resource_id}");
    }
    Ok(())
}

pub fn load_answers(path: &Path) -> Result<RunAnswers> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read answers {}", path.display()))?;
    let answers: RunAnswers = serde_json::from_str(&raw)
        .with_context(|| format!("answers {} must be valid JSON", path.display()))?;
    if answers.schema != ANSWERS_SCHEMA {
        bail!(
            "answers {} use schema '{}', expected '{ANSWERS_SCHEMA}'",
            path.display(),
            answers.schema
        );
    }
    Ok(answers)
}

/// Fills each step from the answers in declaration order and moves forward
/// until the last step, returning the review shown before submitting.
pub fn walk(controller: &mut WizardController, answers: &RunAnswers) -> Result<ReviewSummary> {
    let definition = controller.definition().clone();
    if let Some(unknown) = answers
        .fields
        .keys()
        .find(|id| definition.field(id).is_none())
    {
        bail!("wizard '{}' has no field '{unknown}'", definition.id());
    }

    loop {
        let index = controller.active_step();
        let step = definition
            .step(index)
            .ok_or_else(|| anyhow!("step {index} is out of range"))?;
        for field in &step.fields {
            if let Some(value) = answers.fields.get(&field.id) {
                controller.set_field(&field.id, value.clone())?;
            }
        }
        match controller.request_next()? {
            Navigation::Moved { to, .. } => debug!(step = %step.id, next = to, "step completed"),
            Navigation::Unchanged => break,
            Navigation::Invalid(validation) => bail!(invalid_step(&step.id, &validation)),
            Navigation::Skipped { step } => bail!("step '{step}' was skipped"),
        }
    }
    Ok(controller.review())
}

fn write_snapshot(controller: &WizardController, path: &Path) -> Result<()> {
    let payload = controller.snapshot().to_json_pretty()?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create snapshot parent {}", parent.display()))?;
    }
    fs::write(path, payload)
        .with_context(|| format!("failed to write snapshot {}", path.display()))
}

fn invalid_step(step: &str, validation: &ValidationResult) -> String {
    let mut message = format!("step '{step}' is invalid:");
    for line in validation.messages() {
        message.push_str("\n  ");
        message.push_str(&line);
    }
    message
}
