use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::presets;

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Print the wizard list as JSON
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ListedWizard {
    id: &'static str,
    title: String,
    version: String,
    steps: usize,
}

pub fn run(args: ListArgs) -> Result<()> {
    let mut listed = Vec::new();
    for preset in presets::all() {
        let spec = preset.spec()?;
        listed.push(ListedWizard {
            id: preset.id,
            title: spec.title,
            version: spec.version,
            steps: spec.steps.len(),
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }
    let width = listed.iter().map(|entry| entry.id.len()).max().unwrap_or(0);
    for entry in &listed {
        println!(
            "{:width$}  {} (v{}, {} steps)",
            entry.id, entry.title, entry.version, entry.steps
        );
    }
    Ok(())
}
