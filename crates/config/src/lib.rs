//! Configuration management for the voice dialog server
//!
//! Supports loading configuration from:
//! - YAML/TOML files
//! - Environment variables (VOICE_DIALOG__ prefix)
//!
//! Per-connection provider overrides are built as immutable
//! [`ProviderSnapshot`]s at accept time; the shared [`Settings`] are never
//! mutated after startup.

pub mod settings;
pub mod snapshot;

pub use settings::{
    ensure_directories, load_settings, EndPromptConfig, LlmProviderConfig, LlmSection, LogConfig,
    SelectedModules, ServerConfig, Settings, TtsProviderConfig, TtsSection,
};
pub use snapshot::{ProviderSnapshot, FALLBACK_TTS_MODULE};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

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

impl From<ConfigError> for voice_dialog_core::Error {
    fn from(err: ConfigError) -> Self {
        voice_dialog_core::Error::Config(err.to_string())
    }
}
