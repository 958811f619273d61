//! Process-wide settings
//!
//! Loaded once at startup from a YAML/TOML file layered with
//! `VOICE_DIALOG__` environment variables. Per-connection overrides never
//! touch these values; they land in a [`crate::ProviderSnapshot`] instead.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use voice_dialog_core::{AudioFormat, EmotionStyle};

use crate::ConfigError;

/// Server bind configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds without inbound traffic (or a keepalive reset) before the
    /// connection is closed
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_idle_timeout() -> u64 {
    120
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("tmp")
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

/// Module selected for each provider role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedModules {
    #[serde(default)]
    pub asr: Option<String>,
    #[serde(default)]
    pub llm: Option<String>,
    #[serde(default)]
    pub tts: Option<String>,
    #[serde(default)]
    pub vad: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
}

impl Default for SelectedModules {
    fn default() -> Self {
        Self {
            asr: None,
            llm: None,
            tts: None,
            vad: None,
            memory: None,
            intent: None,
        }
    }
}

/// One TTS provider table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsProviderConfig {
    /// Vendor endpoint (HTTP adapter)
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request body template; `{prompt_text}` is replaced with the segment.
    /// Accepts an object, or a JSON-encoded string of one.
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    /// Container format the provider produces (`wav`, `mp3`, ...)
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Voice code; overridden per connection when the agent has a binding
    #[serde(default)]
    pub voice: Option<String>,
}

fn default_method() -> String {
    "POST".to_string()
}
fn default_format() -> String {
    "wav".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("tmp/")
}

impl TtsProviderConfig {
    /// Resolve `params` into an object, parsing a JSON-encoded string form
    ///
    /// An unparseable string or a non-object value is a fatal configuration
    /// error at connection setup.
    pub fn params_object(&self) -> Result<serde_json::Map<String, serde_json::Value>, ConfigError> {
        match &self.params {
            None => Ok(serde_json::Map::new()),
            Some(serde_json::Value::Object(map)) => Ok(map.clone()),
            Some(serde_json::Value::String(raw)) => {
                let parsed: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
                    ConfigError::InvalidValue {
                        field: "tts.params".to_string(),
                        message: format!("not parseable as an object: {e}"),
                    }
                })?;
                match parsed {
                    serde_json::Value::Object(map) => Ok(map),
                    _ => Err(ConfigError::InvalidValue {
                        field: "tts.params".to_string(),
                        message: "JSON string must encode an object".to_string(),
                    }),
                }
            }
            Some(_) => Err(ConfigError::InvalidValue {
                field: "tts.params".to_string(),
                message: "expected an object or a JSON-encoded string".to_string(),
            }),
        }
    }
}

/// One LLM provider table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Replaced with the connection's `agent_id` at accept time
    #[serde(default)]
    pub api_key: Option<String>,
}

/// TTS section: named provider tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsSection {
    #[serde(default)]
    pub providers: HashMap<String, TtsProviderConfig>,
}

/// LLM section: named provider tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default)]
    pub providers: HashMap<String, LlmProviderConfig>,
}

/// Prompt that ends the conversation without an STT surface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndPromptConfig {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,

    /// Provider HTTP call timeout in seconds
    #[serde(default = "default_tts_timeout")]
    pub tts_timeout: u64,
    /// Wire format for outbound audio
    #[serde(default)]
    pub audio_format: AudioFormat,
    /// Remove synthesized files after decoding
    #[serde(default = "default_true")]
    pub delete_audio: bool,
    /// Play a notification sound after the terminal `stop`
    #[serde(default)]
    pub enable_stop_tts_notify: bool,
    #[serde(default = "default_notify_voice")]
    pub stop_tts_notify_voice: PathBuf,
    #[serde(default)]
    pub end_prompt: EndPromptConfig,
    /// Enables per-device output metering when greater than zero
    #[serde(default)]
    pub max_output_size: u64,
    /// Emotion hint representation on the wire
    #[serde(default)]
    pub emotion_style: EmotionStyle,

    #[serde(default)]
    pub selected_module: SelectedModules,
    #[serde(default)]
    pub tts: TtsSection,
    #[serde(default)]
    pub llm: LlmSection,

    /// Static agent → voice-code bindings for the config-backed directory
    #[serde(default)]
    pub voice_bindings: HashMap<String, String>,
}

fn default_tts_timeout() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_notify_voice() -> PathBuf {
    PathBuf::from("config/assets/tts_notify.mp3")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            log: LogConfig::default(),
            tts_timeout: default_tts_timeout(),
            audio_format: AudioFormat::default(),
            delete_audio: true,
            enable_stop_tts_notify: false,
            stop_tts_notify_voice: default_notify_voice(),
            end_prompt: EndPromptConfig::default(),
            max_output_size: 0,
            emotion_style: EmotionStyle::default(),
            selected_module: SelectedModules::default(),
            tts: TtsSection::default(),
            llm: LlmSection::default(),
            voice_bindings: HashMap::new(),
        }
    }
}

impl Settings {
    /// Selected TTS module name and table, fatal when unset or unknown
    pub fn selected_tts(&self) -> Result<(&str, &TtsProviderConfig), ConfigError> {
        let name = self
            .selected_module
            .tts
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("selected_module.tts".to_string()))?;
        let table = self
            .tts
            .providers
            .get(name)
            .ok_or_else(|| ConfigError::MissingField(format!("tts.providers.{name}")))?;
        Ok((name, table))
    }

    /// TTS provider table by name, fatal when absent
    pub fn tts_provider(&self, name: &str) -> Result<&TtsProviderConfig, ConfigError> {
        self.tts
            .providers
            .get(name)
            .ok_or_else(|| ConfigError::MissingField(format!("tts.providers.{name}")))
    }

    /// Selected LLM module name and table, fatal when unset or unknown
    pub fn selected_llm(&self) -> Result<(&str, &LlmProviderConfig), ConfigError> {
        let name = self
            .selected_module
            .llm
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("selected_module.llm".to_string()))?;
        let table = self
            .llm
            .providers
            .get(name)
            .ok_or_else(|| ConfigError::MissingField(format!("llm.providers.{name}")))?;
        Ok((name, table))
    }
}

/// Load settings from an optional file layered with environment overrides
///
/// Environment variables use the `VOICE_DIALOG__` prefix with `__` as the
/// nesting separator, e.g. `VOICE_DIALOG__SERVER__PORT=9000`.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(config::File::from(path));
    }

    let loaded = builder
        .add_source(
            config::Environment::with_prefix("VOICE_DIALOG")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    Ok(loaded.try_deserialize()?)
}

/// Create every directory the configuration points at
///
/// Called once at startup; output and log directories must exist before the
/// first connection writes a synthesized file.
pub fn ensure_directories(settings: &Settings) -> std::io::Result<()> {
    let mut dirs: Vec<&Path> = vec![settings.log.dir.as_path()];
    for provider in settings.tts.providers.values() {
        dirs.push(provider.output_dir.as_path());
    }
    dirs.sort();
    dirs.dedup();
    for dir in dirs {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
