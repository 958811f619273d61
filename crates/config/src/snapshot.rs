//! Per-connection provider snapshot
//!
//! The original service injected per-connection `api_key` and `voice` values
//! by mutating a process-wide config map. Here every connection gets an
//! immutable snapshot built once at accept time; providers never see the
//! shared [`crate::Settings`].

use voice_dialog_core::{AudioFormat, EmotionStyle, VoiceBinding};

use crate::{ConfigError, LlmProviderConfig, Settings, TtsProviderConfig};

/// Module name of the free fallback synthesizer used when the agent has no
/// bound voice
pub const FALLBACK_TTS_MODULE: &str = "edge";

/// Immutable provider configuration for one connection
#[derive(Debug, Clone)]
pub struct ProviderSnapshot {
    pub agent_id: String,
    /// TTS module selected for this connection
    pub tts_module: String,
    /// TTS table with the bound voice applied
    pub tts: TtsProviderConfig,
    /// LLM module selected for this connection
    pub llm_module: String,
    /// LLM table with `api_key` set to the agent id
    pub llm: LlmProviderConfig,
    pub audio_format: AudioFormat,
    pub tts_timeout: u64,
    pub delete_audio: bool,
    pub emotion_style: EmotionStyle,
}

impl ProviderSnapshot {
    /// Build the snapshot for one accepted connection
    ///
    /// A bound voice selects the configured TTS module and overrides its
    /// `voice` field with the binding's code; otherwise the free fallback
    /// module is used as-is. The LLM table receives `agent_id` as its API
    /// key. Configuration gaps are fatal here, before any worker spawns.
    pub fn build(
        settings: &Settings,
        agent_id: &str,
        voice: Option<VoiceBinding>,
    ) -> Result<Self, ConfigError> {
        let (tts_module, tts) = match voice {
            Some(binding) => {
                let (name, table) = settings.selected_tts()?;
                let mut table = table.clone();
                table.voice = Some(binding.voice_code);
                (name.to_string(), table)
            }
            None => {
                let table = settings.tts_provider(FALLBACK_TTS_MODULE)?;
                (FALLBACK_TTS_MODULE.to_string(), table.clone())
            }
        };

        // Surface unparseable params now rather than at first synthesis.
        tts.params_object()?;

        let (llm_module, llm) = settings.selected_llm()?;
        let mut llm = llm.clone();
        llm.api_key = Some(agent_id.to_string());

        Ok(Self {
            agent_id: agent_id.to_string(),
            tts_module,
            tts,
            llm_module: llm_module.to_string(),
            llm,
            audio_format: settings.audio_format,
            tts_timeout: settings.tts_timeout,
            delete_audio: settings.delete_audio,
            emotion_style: settings.emotion_style,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LlmSection, SelectedModules, TtsSection};
    use std::collections::HashMap;

    fn settings() -> Settings {
        let mut tts_providers = HashMap::new();
        tts_providers.insert(
            "vendor".to_string(),
            TtsProviderConfig {
                url: Some("http://localhost:9880/speech".to_string()),
                voice: Some("default-voice".to_string()),
                ..Default::default()
            },
        );
        tts_providers.insert(
            FALLBACK_TTS_MODULE.to_string(),
            TtsProviderConfig {
                voice: Some("zh-CN-XiaoxiaoNeural".to_string()),
                format: "mp3".to_string(),
                ..Default::default()
            },
        );

        let mut llm_providers = HashMap::new();
        llm_providers.insert("openai".to_string(), LlmProviderConfig::default());

        Settings {
            selected_module: SelectedModules {
                tts: Some("vendor".to_string()),
                llm: Some("openai".to_string()),
                ..Default::default()
            },
            tts: TtsSection {
                providers: tts_providers,
            },
            llm: LlmSection {
                providers: llm_providers,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_bound_voice_overrides_selected_module() {
        let snapshot = ProviderSnapshot::build(
            &settings(),
            "agent-7",
            Some(VoiceBinding::new("custom-voice")),
        )
        .unwrap();

        assert_eq!(snapshot.tts_module, "vendor");
        assert_eq!(snapshot.tts.voice.as_deref(), Some("custom-voice"));
    }

    #[test]
    fn test_unbound_agent_falls_back_to_edge() {
        let snapshot = ProviderSnapshot::build(&settings(), "agent-7", None).unwrap();
        assert_eq!(snapshot.tts_module, FALLBACK_TTS_MODULE);
        assert_eq!(snapshot.tts.voice.as_deref(), Some("zh-CN-XiaoxiaoNeural"));
    }

    #[test]
    fn test_agent_id_becomes_llm_api_key() {
        let snapshot = ProviderSnapshot::build(&settings(), "agent-7", None).unwrap();
        assert_eq!(snapshot.llm.api_key.as_deref(), Some("agent-7"));
    }

    #[test]
    fn test_snapshot_does_not_touch_settings() {
        let settings = settings();
        let _ = ProviderSnapshot::build(
            &settings,
            "agent-7",
            Some(VoiceBinding::new("custom-voice")),
        )
        .unwrap();

        assert_eq!(
            settings.tts.providers["vendor"].voice.as_deref(),
            Some("default-voice")
        );
    }

    #[test]
    fn test_missing_fallback_is_fatal() {
        let mut settings = settings();
        settings.tts.providers.remove(FALLBACK_TTS_MODULE);
        assert!(ProviderSnapshot::build(&settings, "agent-7", None).is_err());
    }
}
