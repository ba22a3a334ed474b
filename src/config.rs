//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Diagnostic detail level; 0 is silent.
///
/// 1. incoming events and state changes
/// 2. candidate transitions
/// 3. per-condition outcomes
/// 4. channel changes
/// 5. history contents
/// 6. states and transitions as they are loaded
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Verbosity(pub u8);

impl Verbosity {
    pub const SILENT: Verbosity = Verbosity(0);

    pub fn at(self, level: u8) -> bool {
        self.0 >= level
    }
}

/// Settings for loading and running a machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub verbosity: Verbosity,
    /// File name of the states table inside a definition directory.
    pub states_file: String,
    /// File name of the transitions table inside a definition directory.
    pub transitions_file: String,
    pub delimiter: char,
    /// Most recent state switches kept in the transition log; 0 keeps all.
    pub transition_log_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::SILENT,
            states_file: "states.csv".to_string(),
            transitions_file: "transitions.csv".to_string(),
            delimiter: ',',
            transition_log_limit: 1024,
        }
    }
}

impl EngineConfig {
    pub fn with_verbosity(mut self, level: u8) -> Self {
        self.verbosity = Verbosity(level);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}
