//! Simulator Configuration
//!
//! Executable paths, the artifact directory, the scenario catalogue and the
//! parameter limits. Loadable from TOML or JSON; every field has a default.

use crate::error::{ConfigError, LimitError};
use crate::model::{MIB, SimulationParameters};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Scenario code used for identifiers missing from the catalogue.
pub const BASIC_SCENARIO_CODE: u32 = 1;

/// Hard wait for a single collector process.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A scenario the collectors know how to build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioProfile {
    /// Numeric code passed as the collector's first argument
    pub code: u32,
    /// Display name
    pub label: String,
}

impl ScenarioProfile {
    pub fn new(code: u32, label: impl Into<String>) -> Self {
        Self {
            code,
            label: label.into(),
        }
    }
}

/// Default request parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDefaults {
    pub heap_size: u64,
    pub num_objects: u64,
    pub object_size: u64,
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self {
            heap_size: 32 * MIB,
            num_objects: 20,
            object_size: 64,
        }
    }
}

/// Accepted parameter ranges, checked by whoever accepts requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationLimits {
    pub min_heap_size: u64,
    pub max_heap_size: u64,
    pub min_num_objects: u64,
    pub max_num_objects: u64,
    pub min_object_size: u64,
    pub max_object_size: u64,
}

impl Default for SimulationLimits {
    fn default() -> Self {
        Self {
            min_heap_size: MIB,
            max_heap_size: 1024 * MIB,
            min_num_objects: 1,
            max_num_objects: 10_000,
            min_object_size: 1,
            max_object_size: 10_000,
        }
    }
}

impl SimulationLimits {
    /// Check numeric parameters against the configured ranges.
    pub fn check(&self, params: &SimulationParameters) -> Result<(), LimitError> {
        check_range("heap_size", params.heap_size, self.min_heap_size, self.max_heap_size)?;
        check_range("num_objects", params.num_objects, self.min_num_objects, self.max_num_objects)?;
        check_range("object_size", params.object_size, self.min_object_size, self.max_object_size)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), LimitError> {
    if value < min || value > max {
        return Err(LimitError::OutOfRange { field, value, min, max });
    }
    Ok(())
}

/// Complete simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Reference-counting collector executable
    #[serde(default = "default_rc_executable")]
    pub rc_executable: PathBuf,
    /// Mark-and-sweep collector executable
    #[serde(default = "default_ms_executable")]
    pub ms_executable: PathBuf,
    /// Where result artifacts are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Per-process wait limit in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Recognized scenarios keyed by identifier
    #[serde(default = "default_scenarios")]
    pub scenarios: BTreeMap<String, ScenarioProfile>,
    #[serde(default)]
    pub defaults: ParameterDefaults,
    #[serde(default)]
    pub limits: SimulationLimits,
}

fn default_rc_executable() -> PathBuf {
    PathBuf::from("build/bin/gc_unified")
}

fn default_ms_executable() -> PathBuf {
    PathBuf::from("build/bin/gc_unified")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_scenarios() -> BTreeMap<String, ScenarioProfile> {
    BTreeMap::from([
        ("basic".to_string(), ScenarioProfile::new(1, "Basic Allocation")),
        ("cycle_leak".to_string(), ScenarioProfile::new(2, "Circular References")),
        ("cascade_delete".to_string(), ScenarioProfile::new(3, "Cascade Deletion")),
    ])
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            rc_executable: default_rc_executable(),
            ms_executable: default_ms_executable(),
            output_dir: default_output_dir(),
            timeout_secs: default_timeout_secs(),
            scenarios: default_scenarios(),
            defaults: ParameterDefaults::default(),
            limits: SimulationLimits::default(),
        }
    }
}

impl SimulatorConfig {
    /// Load from a `.toml` or `.json` file, chosen by extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let config = match ext.as_str() {
            "toml" => Self::from_toml_file(path)?,
            "json" => Self::from_json_file(path)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&read_config(path)?)
    }

    /// Load from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&read_config(path)?)
    }

    /// Load from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject configurations no run could succeed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }
        if self.scenarios.is_empty() {
            return Err(ConfigError::Invalid("at least one scenario is required".to_string()));
        }
        let l = &self.limits;
        if l.min_heap_size > l.max_heap_size
            || l.min_num_objects > l.max_num_objects
            || l.min_object_size > l.max_object_size
        {
            return Err(ConfigError::Invalid("limit minimum exceeds maximum".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Collector argument code for a scenario identifier.
    pub fn scenario_code(&self, scenario: &str) -> u32 {
        self.scenarios
            .get(scenario)
            .map(|p| p.code)
            .unwrap_or(BASIC_SCENARIO_CODE)
    }

    /// Check a request the way the serving layer does: known scenario and
    /// every number inside its limits.
    pub fn check_request(&self, params: &SimulationParameters) -> Result<(), LimitError> {
        if !self.scenarios.contains_key(&params.scenario_type) {
            return Err(LimitError::UnknownScenario {
                given: params.scenario_type.clone(),
                known: self.scenarios.keys().cloned().collect(),
            });
        }
        self.limits.check(params)
    }

    /// A request built from the configured defaults.
    pub fn default_request(&self, scenario: impl Into<String>) -> SimulationParameters {
        SimulationParameters::new(
            self.defaults.heap_size,
            self.defaults.num_objects,
            self.defaults.object_size,
            scenario,
        )
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))
}
