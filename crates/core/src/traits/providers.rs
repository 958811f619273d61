//! Provider trait seams for the receiver-side stages
//!
//! The dialog core consumes these capabilities but does not implement them;
//! concrete VAD/ASR/LLM/memory/intent backends are created once per process
//! and shared read-only across connections, so every implementation must be
//! internally thread-safe or stateless per call.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::Result;

/// Voice activity detection over inbound microphone frames
#[async_trait]
pub trait VoiceActivityDetector: Send + Sync + 'static {
    /// Whether this frame contains speech
    async fn detect(&self, frame: &[u8]) -> Result<bool>;

    fn name(&self) -> &str;
}

/// Speech-to-text over a completed utterance
#[async_trait]
pub trait SpeechRecognizer: Send + Sync + 'static {
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;

    fn name(&self) -> &str;
}

/// Streaming language model
///
/// Chunks arrive as they are generated and feed the segmenter directly.
pub trait LanguageModel: Send + Sync + 'static {
    /// Stream response chunks for one user utterance
    fn chat_stream<'a>(
        &'a self,
        session_id: &'a str,
        user_text: &'a str,
    ) -> Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

    fn name(&self) -> &str;
}

/// Conversation memory
#[async_trait]
pub trait MemoryStore: Send + Sync + 'static {
    async fn save(&self, session_id: &str, role: &str, content: &str) -> Result<()>;

    async fn recall(&self, session_id: &str) -> Result<Vec<String>>;
}

/// Intent extraction over recognized utterances
#[async_trait]
pub trait IntentRecognizer: Send + Sync + 'static {
    /// Returns a handler name when the utterance matches a known intent
    async fn recognize(&self, text: &str) -> Result<Option<String>>;
}

/// Per-device output metering hook, active when `max_output_size > 0`
///
/// The reporting backend is an external collaborator; the pacer only counts.
pub trait OutputMeter: Send + Sync + 'static {
    fn add_output(&self, device_id: &str, chars: usize);
}
