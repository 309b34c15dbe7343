//! Engine Configuration
//!
//! Defaults applied when a workflow definition or start call leaves a value
//! unset, loaded from YAML:
//!
//! ```yaml
//! default_max_retries: 5
//! default_timeout: 30m
//! state_dir: /var/lib/steprunner
//! step_defaults:
//!   retries: 2
//!   retry_delay: 500
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};
use crate::execution::StepOptions;
use crate::workflow::DurationSpec;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "STEPRUNNER_CONFIG";

/// Lazily-resolved path of the engine config file.
pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        info!("Using config from {}: {}", CONFIG_ENV_VAR, path);
        return PathBuf::from(path);
    }

    PathBuf::from("steprunner.yaml")
});

/// Engine-wide defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Retry budget recorded on executions whose definition sets none
    pub default_max_retries: u32,

    /// Workflow timeout used when neither start options nor definition set one
    pub default_timeout: Option<DurationSpec>,

    /// Retry policy for steps run without explicit options
    pub step_defaults: StepOptions,

    /// Directory used by the file snapshot store
    pub state_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 3,
            default_timeout: Some(DurationSpec::from("1h")),
            step_defaults: StepOptions::default(),
            state_dir: PathBuf::from(".steprunner"),
        }
    }
}

impl EngineConfig {
    /// Checks that the configured durations parse.
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = &self.default_timeout {
            timeout.as_millis()?;
        }
        Ok(())
    }
}

/// Loads engine configuration from a YAML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        WorkflowError::Config(format!("Failed to read '{}': {}", path.display(), e))
    })?;

    let config: EngineConfig = serde_yaml::from_str(&content).map_err(|e| {
        WorkflowError::Config(format!("Failed to parse '{}': {}", path.display(), e))
    })?;

    config.validate()?;
    debug!("Loaded engine config from {}", path.display());
    Ok(config)
}

/// Loads the config at `path` if it exists, otherwise returns the defaults.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    if path.exists() {
        load_config(path)
    } else {
        debug!("No config at {}, using defaults", path.display());
        Ok(EngineConfig::default())
    }
}
