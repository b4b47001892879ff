//! Federate and port configuration
//!
//! The federate is described by one external artifact, supplied either as a
//! path to a JSON file or as inline JSON text:
//!
//! ```json
//! {
//!   "name": "controller",
//!   "period": 0.5,
//!   "publications": [
//!     { "key": "command", "type": "double", "global": false, "units": "V" }
//!   ],
//!   "subscriptions": [
//!     { "key": "plant/state", "type": "vector" }
//!   ],
//!   "inputs": [
//!     { "key": "setpoint", "type": "double", "targets": ["operator/setpoint"], "default": 0.0 }
//!   ]
//! }
//! ```
//!
//! Host ports are described separately by `PortConfig` entries supplied by
//! the host's own configuration mechanism.

use crate::bus::BusError;
use crate::models::buffer::PortDescriptor;
use crate::binding::PortSelector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading or applying configuration
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("IO error reading {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("JSON parsing error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration rejected by bus: {0}")]
    Rejected(BusError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where the federate configuration comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path to a JSON configuration file
    File(PathBuf),
    /// Inline JSON configuration text
    Json(String),
}

impl ConfigSource {
    /// Interpret a host-supplied string as a source
    ///
    /// Text whose first non-blank character is `{` is inline JSON; anything
    /// else is a file path.
    ///
    /// # Example
    /// ```
    /// use federate_bridge_core_rs::ConfigSource;
    ///
    /// assert!(matches!(ConfigSource::from_arg(r#"{"name": "a"}"#), ConfigSource::Json(_)));
    /// assert!(matches!(ConfigSource::from_arg("fed.json"), ConfigSource::File(_)));
    /// ```
    pub fn from_arg(arg: &str) -> Self {
        if arg.trim_start().starts_with('{') {
            ConfigSource::Json(arg.to_string())
        } else {
            ConfigSource::File(PathBuf::from(arg))
        }
    }

    /// Resolve a relative file path against a base directory
    pub fn relative_to(self, base: &Path) -> Self {
        match self {
            ConfigSource::File(path) if path.is_relative() => ConfigSource::File(base.join(path)),
            other => other,
        }
    }

    /// Human-readable description for log output
    pub fn describe(&self) -> String {
        match self {
            ConfigSource::File(path) => path.display().to_string(),
            ConfigSource::Json(_) => "<inline json>".to_string(),
        }
    }
}

/// Publication declared by the federate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationConfig {
    /// Publication key
    pub key: String,

    /// Declared bus type name (empty = untyped)
    #[serde(rename = "type", default)]
    pub value_type: String,

    /// Global keys are used as-is; local keys are prefixed with `<federate>/`
    #[serde(default)]
    pub global: bool,

    #[serde(default)]
    pub units: Option<String>,
}

/// Subscription declared by the federate configuration
///
/// Creates an unnamed input targeting the publication `key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Key of the targeted publication
    pub key: String,

    #[serde(rename = "type", default)]
    pub value_type: String,

    #[serde(default)]
    pub default: Option<f64>,
}

/// Named input declared by the federate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Input name
    pub key: String,

    #[serde(rename = "type", default)]
    pub value_type: String,

    /// Keys of the publications feeding this input
    #[serde(default)]
    pub targets: Vec<String>,

    #[serde(default)]
    pub default: Option<f64>,

    #[serde(default)]
    pub global: bool,
}

/// Complete federate configuration artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederateConfig {
    /// Federate name, unique within the federation
    pub name: String,

    /// Time-step period in seconds
    #[serde(default)]
    pub period: Option<f64>,

    #[serde(default)]
    pub publications: Vec<PublicationConfig>,

    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,

    #[serde(default)]
    pub inputs: Vec<InputConfig>,
}

impl FederateConfig {
    /// Load and validate the artifact named by `source`
    pub fn load(source: &ConfigSource) -> ConfigResult<Self> {
        let config = match source {
            ConfigSource::File(path) => Self::from_json_file(path)?,
            ConfigSource::Json(text) => Self::from_json_str(text)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string (unvalidated)
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse configuration from a JSON file (unvalidated)
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation("federate name must not be empty".to_string()));
        }

        if let Some(period) = self.period {
            if !period.is_finite() || period <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "period must be a positive number of seconds, got {}",
                    period
                )));
            }
        }

        let mut keys = std::collections::HashSet::new();
        for publication in &self.publications {
            if publication.key.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "federate '{}' declares a publication with an empty key",
                    self.name
                )));
            }
            if !keys.insert(publication.key.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate publication key '{}'",
                    publication.key
                )));
            }
        }

        for input in &self.inputs {
            if input.key.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "federate '{}' declares an input with an empty key",
                    self.name
                )));
            }
        }

        Ok(())
    }
}

/// Direction of a host port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    /// Bus to host
    Input,
    /// Host to bus
    Publication,
}

/// One host port: which endpoint it binds to and its buffer shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    pub direction: PortDirection,

    /// Endpoint name or 0-based index
    pub selector: PortSelector,

    #[serde(flatten)]
    pub descriptor: PortDescriptor,
}

impl PortConfig {
    pub fn input(selector: impl Into<PortSelector>, descriptor: PortDescriptor) -> Self {
        Self {
            direction: PortDirection::Input,
            selector: selector.into(),
            descriptor,
        }
    }

    pub fn publication(selector: impl Into<PortSelector>, descriptor: PortDescriptor) -> Self {
        Self {
            direction: PortDirection::Publication,
            selector: selector.into(),
            descriptor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::value::ValueType;

    #[test]
    fn test_minimal_config() {
        let config = FederateConfig::load(&ConfigSource::Json(r#"{"name": "fed"}"#.to_string())).unwrap();
        assert_eq!(config.name, "fed");
        assert_eq!(config.period, None);
        assert!(config.publications.is_empty());
    }

    #[test]
    fn test_parse_error() {
        let err = FederateConfig::load(&ConfigSource::Json("{ not json".to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = FederateConfig::load(&ConfigSource::File(PathBuf::from("/nonexistent/fed.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_rejects_bad_period() {
        let err = FederateConfig::load(&ConfigSource::Json(r#"{"name": "fed", "period": -1.0}"#.to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_duplicate_publication() {
        let json = r#"{"name": "fed", "publications": [{"key": "a"}, {"key": "a"}]}"#;
        let err = FederateConfig::load(&ConfigSource::Json(json.to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_port_config_from_json() {
        let port: PortConfig =
            serde_json::from_str(r#"{"direction": "input", "selector": 2, "width": 3, "type": "vector"}"#).unwrap();
        assert_eq!(port.direction, PortDirection::Input);
        assert_eq!(port.selector, PortSelector::Index(2));
        assert_eq!(port.descriptor.width, 3);
        assert_eq!(port.descriptor.value_type, ValueType::Vector);

        let port: PortConfig = serde_json::from_str(r#"{"direction": "publication", "selector": "out"}"#).unwrap();
        assert_eq!(port.selector, PortSelector::Name("out".to_string()));
        assert_eq!(port.descriptor, PortDescriptor::default());
    }

    #[test]
    fn test_relative_source() {
        let source = ConfigSource::from_arg("fed.json").relative_to(Path::new("/runs"));
        assert_eq!(source, ConfigSource::File(PathBuf::from("/runs/fed.json")));
        let inline = ConfigSource::from_arg("{}").relative_to(Path::new("/runs"));
        assert_eq!(inline, ConfigSource::Json("{}".to_string()));
    }
}
