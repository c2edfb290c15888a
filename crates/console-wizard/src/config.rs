use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.toml";

/// `config.toml` of the console driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Artificial delay of the simulated create call.
    pub latency_ms: u64,
    /// Wizards whose create call always fails.
    pub fail_wizards: Vec<String>,
    pub id_prefix: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latency_ms: 250,
            fail_wizards: Vec::new(),
            id_prefix: "res".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives, used when `RUST_LOG` is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl ConsoleConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid console configuration")
    }

    /// Loads an explicit file, or the platform config file when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        match default_path() {
            Some(path) if path.is_file() => Self::read(&path),
            _ => Ok(Self::default()),
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("in {}", path.display()))
    }
}

pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "console", env!("CARGO_PKG_NAME"))
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ConsoleConfig::from_toml_str("").unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.simulation.latency_ms, 250);
        assert_eq!(config.simulation.id_prefix, "res");
    }

    #[test]
    fn parses_partial_sections() {
        let config = ConsoleConfig::from_toml_str(
            r#"
            [simulation]
            latency_ms = 0
            fail_wizards = ["create-bucket"]

            [logging]
            filter = "wizard_lib=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.simulation.latency_ms, 0);
        assert_eq!(config.simulation.fail_wizards, vec!["create-bucket"]);
        assert_eq!(config.simulation.id_prefix, "res");
        assert_eq!(config.logging.filter.as_deref(), Some("wizard_lib=debug"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(ConsoleConfig::from_toml_str("[simulation]\nlatency = 5\n").is_err());
    }
}
