//! Voice directory backends
//!
//! The server ships a config-backed static directory. The relational
//! backend (the `agents` table joined with `tts_voice`) lives outside this
//! workspace and plugs in through the same trait; whatever the backend, one
//! lookup happens per accepted connection and no storage session outlives
//! it.

use std::collections::HashMap;

use async_trait::async_trait;
use voice_dialog_core::{Result, VoiceBinding, VoiceDirectory};

/// Directory backed by the `voice_bindings` map in settings
#[derive(Debug, Default)]
pub struct StaticVoiceDirectory {
    bindings: HashMap<String, String>,
}

impl StaticVoiceDirectory {
    pub fn new(bindings: HashMap<String, String>) -> Self {
        Self { bindings }
    }
}

#[async_trait]
impl VoiceDirectory for StaticVoiceDirectory {
    async fn voice_for(&self, agent_id: &str) -> Result<Option<VoiceBinding>> {
        Ok(self
            .bindings
            .get(agent_id)
            .map(|code| VoiceBinding::new(code.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bound_and_unbound_agents() {
        let mut bindings = HashMap::new();
        bindings.insert("agent-1".to_string(), "zh-CN-XiaoxiaoNeural".to_string());
        let directory = StaticVoiceDirectory::new(bindings);

        assert_eq!(
            directory.voice_for("agent-1").await.unwrap(),
            Some(VoiceBinding::new("zh-CN-XiaoxiaoNeural"))
        );
        assert_eq!(directory.voice_for("agent-2").await.unwrap(), None);
    }
}
