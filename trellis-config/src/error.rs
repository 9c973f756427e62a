// Error types for configuration loading

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration key not found: {0}")]
    KeyNotFound(String),

    #[error("Failed to load configuration from {source_name}: {message}")]
    LoadError {
        source_name: String,
        message: String,
    },

    #[error("Failed to parse {format} configuration: {message}")]
    ParseError {
        format: &'static str,
        message: String,
    },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvError(#[from] std::env::VarError),
}

impl ConfigError {
    pub fn load(source_name: impl Into<String>, message: impl ToString) -> Self {
        ConfigError::LoadError {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid(key: impl Into<String>, message: impl ToString) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

/// Configuration problems surface as internal errors of the engine.
impl From<ConfigError> for trellis_core::Error {
    fn from(err: ConfigError) -> Self {
        trellis_core::Error::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
