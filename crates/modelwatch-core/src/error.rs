//! Error types for modelwatch-core

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for modelwatch-core
///
/// Observer faults raised during dispatch are not part of this type: they
/// never leave the dispatcher and are reported through
/// [`FaultReporter`](crate::report::FaultReporter) instead.
#[derive(Error, Debug)]
pub enum Error {
    /// An observer was rejected by `add_observer`
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Event trace errors
    #[error("Trace error: {0}")]
    Trace(#[from] crate::trace::TraceError),

    /// Lua runtime errors (script loading, API installation)
    #[cfg(feature = "lua")]
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an observer could not be registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The observer reference is null/nil or otherwise absent
    #[error("observer reference is null")]
    Null,

    /// The observer is not an object that can carry handlers
    #[error("observer must be an object with handler methods, got {found}")]
    NotAnObject { found: String },

    /// The bridge has been shut down
    #[error("observer bridge is shut down")]
    ShutDown,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_error_wraps_into_error() {
        let err: Error = RegistrationError::NotAnObject {
            found: "nil".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Registration error: observer must be an object with handler methods, got nil"
        );
    }

    #[test]
    fn config_invalid_display() {
        let err = ConfigError::Invalid {
            field: "script.handler_prefix",
            reason: "must not be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for script.handler_prefix: must not be empty"
        );
    }
}
