//! Shared application state
//!
//! Provider instances are created once per process and shared read-only
//! across connections; they must be internally thread-safe or stateless per
//! call.

use std::sync::Arc;

use voice_dialog_config::Settings;
use voice_dialog_core::{
    IntentRecognizer, LanguageModel, MemoryStore, OutputMeter, SpeechRecognizer,
    VoiceActivityDetector, VoiceDirectory,
};

use crate::directory::StaticVoiceDirectory;

/// Process-wide shared state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub directory: Arc<dyn VoiceDirectory>,
    pub vad: Option<Arc<dyn VoiceActivityDetector>>,
    pub asr: Option<Arc<dyn SpeechRecognizer>>,
    pub llm: Option<Arc<dyn LanguageModel>>,
    pub memory: Option<Arc<dyn MemoryStore>>,
    pub intent: Option<Arc<dyn IntentRecognizer>>,
    pub meter: Option<Arc<dyn OutputMeter>>,
}

impl AppState {
    /// State with the config-backed voice directory and no receiver-side
    /// providers
    pub fn new(settings: Settings) -> Self {
        let directory = Arc::new(StaticVoiceDirectory::new(settings.voice_bindings.clone()));
        Self {
            settings: Arc::new(settings),
            directory,
            vad: None,
            asr: None,
            llm: None,
            memory: None,
            intent: None,
            meter: None,
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn VoiceDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_vad(mut self, vad: Arc<dyn VoiceActivityDetector>) -> Self {
        self.vad = Some(vad);
        self
    }

    pub fn with_asr(mut self, asr: Arc<dyn SpeechRecognizer>) -> Self {
        self.asr = Some(asr);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_intent(mut self, intent: Arc<dyn IntentRecognizer>) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_meter(mut self, meter: Arc<dyn OutputMeter>) -> Self {
        self.meter = Some(meter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory_from_settings() {
        let mut settings = Settings::default();
        settings
            .voice_bindings
            .insert("agent-1".to_string(), "voice-x".to_string());

        let state = AppState::new(settings);
        let binding = state.directory.voice_for("agent-1").await.unwrap();
        assert_eq!(binding.map(|b| b.voice_code), Some("voice-x".to_string()));
    }
}
