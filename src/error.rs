//! Error types for configuration loading and card operations

use thiserror::Error;

/// Errors that can occur while loading a card configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither `invertor` nor `invertors` is set
    #[error("You need to define at least one invertor entity")]
    MissingInverter,

    /// Neither `battery` nor `batteries` is set
    #[error("You need to define at least one battery entity")]
    MissingBattery,

    /// The configuration text could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while driving a card
#[derive(Error, Debug)]
pub enum CardError {
    /// The configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Sensor states could not be decoded
    #[error("invalid sensor states: {0}")]
    States(#[from] serde_json::Error),

    /// An operation needed a configuration that has not been set
    #[error("card has no configuration")]
    NotConfigured,

    /// A card type was registered twice
    #[error("card type already registered: {0}")]
    DuplicateCard(String),
}

/// Result type for card operations
pub type CardResult<T> = Result<T, CardError>;
