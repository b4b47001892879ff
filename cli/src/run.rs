//! Run file: which federates take part in a loopback co-simulation
//!
//! ```json
//! {
//!   "stop_time": 5.0,
//!   "participants": [
//!     {
//!       "federate": "generator.json",
//!       "ports": [{ "direction": "publication", "selector": "wave", "width": 3 }]
//!     },
//!     {
//!       "federate": { "name": "monitor", "period": 1.0, "subscriptions": [{ "key": "generator/wave" }] },
//!       "ports": [{ "direction": "input", "selector": 0, "width": 3 }]
//!     }
//!   ]
//! }
//! ```
//!
//! A `federate` string is a path relative to the run file's directory (or
//! inline JSON text); an object is an inline federate configuration.

use federate_bridge_core_rs::{ConfigSource, PortConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunFileError {
    #[error("cannot read run file {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("invalid run file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("run file {}: {message}", path.display())]
    Validation { path: PathBuf, message: String },
}

/// Where a participant's federate configuration lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FederateEntry {
    /// File path or inline JSON text
    Source(String),
    /// Inline configuration object
    Inline(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub federate: FederateEntry,

    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    /// Simulated seconds to run for
    pub stop_time: f64,

    pub participants: Vec<Participant>,

    /// Directory relative federate paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl RunFile {
    pub fn load(path: &Path) -> Result<Self, RunFileError> {
        let text = fs::read_to_string(path).map_err(|e| RunFileError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut run: RunFile = serde_json::from_str(&text).map_err(|e| RunFileError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        run.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let invalid = |message: String| RunFileError::Validation {
            path: path.to_path_buf(),
            message,
        };
        if !run.stop_time.is_finite() || run.stop_time < 0.0 {
            return Err(invalid(format!("stop_time must be a non-negative number, got {}", run.stop_time)));
        }
        if run.participants.is_empty() {
            return Err(invalid("at least one participant is required".to_string()));
        }
        Ok(run)
    }

    /// Configuration source of participant `index`
    pub fn source(&self, index: usize) -> Option<ConfigSource> {
        self.participants.get(index).map(|p| match &p.federate {
            FederateEntry::Source(text) => ConfigSource::from_arg(text).relative_to(&self.base_dir),
            FederateEntry::Inline(value) => ConfigSource::Json(value.to_string()),
        })
    }
}
