//! Session controller: user-utterance side of the status protocol
//!
//! Emits the `stt` and `start` frames when ASR finalizes an utterance; the
//! `sentence_start`/`sentence_end`/`stop` side lives in the pacer.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use voice_dialog_core::{
    strip_punctuation_and_emoji, ClientSink, Result, ServerMessage, TtsState,
};
use voice_dialog_pipeline::TurnState;

#[derive(Clone)]
pub struct SessionController {
    session_id: String,
    sink: Arc<dyn ClientSink>,
    turn: Arc<TurnState>,
    /// Matching utterances short-circuit to a bare `start`
    end_prompt: Option<String>,
}

impl SessionController {
    pub fn new(
        session_id: impl Into<String>,
        sink: Arc<dyn ClientSink>,
        turn: Arc<TurnState>,
        end_prompt: Option<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            sink,
            turn,
            end_prompt,
        }
    }

    /// ASR finalized a user utterance: surface it and open the turn
    pub async fn utterance_recognized(&self, text: &str) -> Result<()> {
        if self.end_prompt.as_deref() == Some(text) {
            return self.send_start().await;
        }

        let surface = strip_punctuation_and_emoji(text);
        self.sink
            .send_message(&ServerMessage::stt(surface, &self.session_id))
            .await?;
        self.turn.speaking.store(true, Ordering::Release);
        self.send_start().await
    }

    async fn send_start(&self) -> Result<()> {
        self.sink
            .send_message(&ServerMessage::tts(TtsState::Start, None, &self.session_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl ClientSink for RecordingSink {
        async fn send_text(&self, payload: String) -> Result<()> {
            self.frames.lock().push(serde_json::from_str(&payload).unwrap());
            Ok(())
        }

        async fn send_audio(&self, _frame: bytes::Bytes) -> Result<()> {
            Ok(())
        }

        async fn reset_timeout(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn controller(sink: &Arc<RecordingSink>, end_prompt: Option<&str>) -> SessionController {
        SessionController::new(
            "s-1",
            Arc::clone(sink) as Arc<dyn ClientSink>,
            Arc::new(TurnState::new()),
            end_prompt.map(String::from),
        )
    }

    #[tokio::test]
    async fn test_utterance_emits_stt_then_start() {
        let sink = Arc::new(RecordingSink::default());
        controller(&sink, None)
            .utterance_recognized("今天天气怎么样？")
            .await
            .unwrap();

        let frames = sink.frames.lock();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["type"], "stt");
        // Punctuation stripped from the STT surface.
        assert_eq!(frames[0]["text"], "今天天气怎么样");
        assert_eq!(frames[1]["type"], "tts");
        assert_eq!(frames[1]["state"], "start");
    }

    #[tokio::test]
    async fn test_end_prompt_short_circuits_to_bare_start() {
        let sink = Arc::new(RecordingSink::default());
        controller(&sink, Some("再见"))
            .utterance_recognized("再见")
            .await
            .unwrap();

        let frames = sink.frames.lock();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["state"], "start");
    }

    #[tokio::test]
    async fn test_speaking_flag_set() {
        let sink = Arc::new(RecordingSink::default());
        let turn = Arc::new(TurnState::new());
        let controller = SessionController::new(
            "s-1",
            Arc::clone(&sink) as Arc<dyn ClientSink>,
            Arc::clone(&turn),
            None,
        );

        controller.utterance_recognized("你好").await.unwrap();
        assert!(turn.speaking.load(Ordering::Acquire));
    }
}
