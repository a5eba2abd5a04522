/// Errors raised while validating a run configuration.
///
/// These are always reported before any worker thread starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Input could not be parsed as a number
    NotANumber { field: &'static str, value: String },
    /// Input parsed but is outside the accepted range
    OutOfRange { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotANumber { field, value } => {
                write!(f, "{} must be a number, got '{}'", field, value)
            }
            ConfigError::OutOfRange { field, reason } => {
                write!(f, "{} is out of range: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top level error for the simulation engine
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Invalid configuration, the run never began
    Config(ConfigError),
    /// Broken engine invariant (unknown section, stock arithmetic, poisoned lock)
    Internal(String),
    /// A worker thread could not be started
    Spawn(String),
}

impl SimError {
    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        SimError::Internal(msg.into())
    }
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::Config(err) => write!(f, "Configuration error: {}", err),
            SimError::Internal(msg) => write!(f, "Internal error: {}", msg),
            SimError::Spawn(msg) => write!(f, "Failed to spawn worker: {}", msg),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for SimError {
    fn from(err: ConfigError) -> Self {
        SimError::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_are_labelled() {
        let err = SimError::internal("stock underflow in 'books'");
        assert_eq!(err.to_string(), "Internal error: stock underflow in 'books'");
    }

    #[test]
    fn test_config_error_converts() {
        let err: SimError = ConfigError::NotANumber {
            field: "assistant count",
            value: "abc".to_string(),
        }
        .into();
        assert!(matches!(err, SimError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: assistant count must be a number, got 'abc'"
        );
    }
}
