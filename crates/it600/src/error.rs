use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a gateway client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway rejected the EUID.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The gateway could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The gateway refused a specific write.
    #[error("command rejected: {0}")]
    Command(String),
}

impl GatewayError {
    /// Key used for form errors and abort reasons in the config flow.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::Authentication(_) => "authentication_error",
            GatewayError::Connection(_) => "connection_error",
            GatewayError::Command(_) => "command_error",
        }
    }
}

/// Outcome of a failed config entry setup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Transient failure; the host should retry setup later.
    #[error("gateway not ready: {0}")]
    NotReady(#[source] GatewayError),

    /// The stored EUID is not accepted; retrying will not help.
    #[error("gateway rejected credentials: {0}")]
    Authentication(#[source] GatewayError),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl From<GatewayError> for SetupError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Connection(_) => SetupError::NotReady(e),
            GatewayError::Authentication(_) => SetupError::Authentication(e),
            GatewayError::Command(msg) => SetupError::Configuration(msg),
        }
    }
}

/// Errors returned to callers issuing climate commands.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClimateError {
    #[error("temperature must be a finite number, got {0}")]
    NonFiniteTemperature(f64),

    #[error("no climate entity named {0}")]
    UnknownEntity(String),
}

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("gateway '{entry}': {reason}")]
    Invalid { entry: String, reason: String },

    #[error("invalid logging directive '{directive}': {reason}")]
    Logging { directive: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failure_is_not_ready() {
        let err = SetupError::from(GatewayError::Connection("timed out".to_string()));
        assert!(matches!(err, SetupError::NotReady(_)));
    }

    #[test]
    fn test_authentication_failure_is_permanent() {
        let err = SetupError::from(GatewayError::Authentication("bad euid".to_string()));
        assert!(matches!(err, SetupError::Authentication(_)));
    }

    #[test]
    fn test_reason_keys() {
        assert_eq!(
            GatewayError::Connection(String::new()).reason(),
            "connection_error"
        );
        assert_eq!(
            GatewayError::Authentication(String::new()).reason(),
            "authentication_error"
        );
        assert_eq!(GatewayError::Command(String::new()).reason(), "command_error");
    }

    #[test]
    fn test_display() {
        let err = ConfigError::Invalid {
            entry: "hall".to_string(),
            reason: "host must not be empty".to_string(),
        };
        insta::assert_snapshot!(err.to_string(), @"gateway 'hall': host must not be empty");
    }
}
