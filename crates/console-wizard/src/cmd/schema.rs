use anyhow::{Context, Result};

pub fn run() -> Result<()> {
    let schema = wizard_spec::wizard_spec_schema().context("failed to generate wizard schema")?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
