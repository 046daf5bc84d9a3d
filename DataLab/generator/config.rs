use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    error::GenerationError,
    params::{resolve, ParameterOverrides, ParameterSet, TEXTBOOK_CASE},
};

/// Generation request stored as TOML.
///
/// ```toml
/// scenario = "Failed Drug Trial"
///
/// [overrides]
/// seed = 7
/// genes = 500
///
/// [telemetry]
/// log_path = "logs/datalab.jsonl"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataLabConfig {
    /// Scenario name or `custom`.
    #[serde(default = "default_scenario")]
    pub scenario: String,
    /// Parameter overrides layered on the scenario.
    #[serde(default)]
    pub overrides: ParameterOverrides,
    /// Logging settings.
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

/// Logging section of the config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySettings {
    /// JSON-lines log file; relative paths are taken from the config's directory.
    pub log_path: Option<PathBuf>,
}

fn default_scenario() -> String {
    TEXTBOOK_CASE.to_string()
}

impl Default for DataLabConfig {
    fn default() -> Self {
        Self {
            scenario: default_scenario(),
            overrides: ParameterOverrides::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl DataLabConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading datalab config {}", path.display()))?;
        let mut config =
            Self::parse(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let source_dir = path.parent().unwrap_or_else(|| Path::new("."));
        if let Some(log_path) = config.telemetry.log_path.as_mut() {
            if log_path.is_relative() {
                *log_path = source_dir.join(&*log_path);
            }
        }
        Ok(config)
    }

    /// Parses a TOML document.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Resolves the scenario and overrides into a validated parameter set.
    pub fn resolve(&self) -> Result<ParameterSet, GenerationError> {
        resolve(&self.scenario, &self.overrides)
    }
}
