//! Configuration management
//!
//! `modelwatch.toml` layout, every section optional:
//!
//! ```toml
//! [logging]
//! level = "info"          # off | error | warn | info | debug | trace
//! format = "pretty"       # pretty | json
//! # file = "/tmp/modelwatch.log"
//!
//! [faults]
//! history = 256           # fault records kept by the default reporter
//!
//! [script]
//! handler_prefix = "slot" # Lua observers implement slotCreatedDocument, ...
//! api_global = "observers"
//! ```

use crate::error::ConfigError;
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON lines
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected one of: pretty, json")),
        }
    }
}

/// Fault reporting settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Number of fault records retained in memory
    pub history: usize,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self { history: 256 }
    }
}

/// Scripted observer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Prefix of handler method names (`slot` + `CreatedDocument`)
    pub handler_prefix: String,
    /// Name of the global table exposing `add`/`remove`/`count`
    pub api_global: String,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            handler_prefix: "slot".to_string(),
            api_global: "observers".to_string(),
        }
    }
}

/// Top-level bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub logging: LogConfig,
    pub faults: FaultConfig,
    pub script: ScriptConfig,
}

impl BridgeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.faults.history == 0 {
            return Err(ConfigError::Invalid {
                field: "faults.history",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.script.handler_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "script.handler_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if !is_identifier(&self.script.api_global) {
            return Err(ConfigError::Invalid {
                field: "script.api_global",
                reason: format!("{:?} is not a valid identifier", self.script.api_global),
            });
        }
        if let Err(err) = self.logging.level_filter() {
            return Err(ConfigError::Invalid {
                field: "logging.level",
                reason: err.to_string(),
            });
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
