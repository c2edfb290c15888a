use anyhow::Result;
use clap::Args;
use wizard_spec::{FieldSpec, WizardSpec};

use crate::presets;

#[derive(Args, Debug, Clone)]
pub struct DescribeArgs {
    /// Wizard id, e.g. `create-vpc`
    #[arg(value_name = "WIZARD")]
    pub wizard: String,
    /// Print the definition document instead of the outline
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
}

pub fn run(args: DescribeArgs) -> Result<()> {
    let preset = presets::find(&args.wizard)?;
    // Building checks the document against the catalogs before printing it.
    let definition = preset.definition()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(definition.spec())?);
    } else {
        print!("{}", outline(definition.spec()));
    }
    Ok(())
}

pub fn outline(spec: &WizardSpec) -> String {
    let mut out = format!("{} ({} v{})\n", spec.title, spec.id, spec.version);
    if let Some(description) = &spec.description {
        out.push_str(description);
        out.push('\n');
    }
    for (index, step) in spec.steps.iter().enumerate() {
        let optional = if step.optional { " [optional]" } else { "" };
        out.push_str(&format!("\n{}. {}{optional}\n", index + 1, step.title));
        for field in &step.fields {
            out.push_str(&format!("   - {}\n", field_line(field)));
        }
    }
    out
}

fn field_line(field: &FieldSpec) -> String {
    let mut line = format!("{} ({}): {}", field.id, field.kind.as_str(), field.label);
    if field.is_required() {
        line.push_str(" *");
    }
    if !field.depends_on.is_empty() {
        line.push_str(&format!(" <- {}", field.depends_on.join(", ")));
    }
    line
}
