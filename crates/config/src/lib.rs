//! Configuration management for the voice session engine
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (VOICE_SESSION_ prefix, `__` separator)
//!
//! The only hard requirements for placing a call are the transport public
//! key and the assistant identity. Without them the control surface is
//! disabled rather than failing at call time.

pub mod settings;

pub use settings::{
    load_settings, load_settings_from, AssistantConfig, Credentials, ObservabilityConfig,
    RuntimeEnvironment, Settings, TransportConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
