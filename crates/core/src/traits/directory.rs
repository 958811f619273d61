//! Agent-to-voice lookup trait

use async_trait::async_trait;

use crate::Result;

/// A voice bound to an agent in the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceBinding {
    /// Provider-specific voice code, overrides the snapshot's `voice` field
    pub voice_code: String,
}

impl VoiceBinding {
    pub fn new(voice_code: impl Into<String>) -> Self {
        Self {
            voice_code: voice_code.into(),
        }
    }
}

/// Directory resolving an agent id to its bound voice
///
/// Backends: a config-backed static map ships in the server crate; the
/// relational backend (`agents` joined with `tts_voice`) lives outside this
/// workspace and plugs in through this trait. Implementations must scope any
/// storage session to the single lookup and release it on all exit paths.
#[async_trait]
pub trait VoiceDirectory: Send + Sync + 'static {
    /// Resolve the voice bound to `agent_id`; `None` selects the free
    /// fallback provider
    async fn voice_for(&self, agent_id: &str) -> Result<Option<VoiceBinding>>;
}
