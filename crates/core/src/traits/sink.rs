//! Client send-half trait
//!
//! The pacer and session controller run outside the task that owns the
//! socket write half; they submit work through this seam instead of holding
//! the socket directly.

use async_trait::async_trait;
use bytes::Bytes;

use crate::wire::ServerMessage;
use crate::Result;

/// Per-connection send half
///
/// All methods are cancel-safe from the caller's perspective: a failed send
/// is reported as `Error::PeerSend` and treated as fatal by the pipeline.
#[async_trait]
pub trait ClientSink: Send + Sync + 'static {
    /// Send one JSON text frame
    async fn send_text(&self, payload: String) -> Result<()>;

    /// Send one binary audio frame
    async fn send_audio(&self, frame: Bytes) -> Result<()>;

    /// Refresh the connection's idle timer during long playback
    async fn reset_timeout(&self) -> Result<()>;

    /// Close the peer connection
    async fn close(&self) -> Result<()>;

    /// Serialize and send a protocol message
    async fn send_message(&self, message: &ServerMessage) -> Result<()> {
        self.send_text(serde_json::to_string(message)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::TtsState;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        texts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ClientSink for RecordingSink {
        async fn send_text(&self, payload: String) -> Result<()> {
            self.texts.lock().unwrap().push(payload);
            Ok(())
        }

        async fn send_audio(&self, _frame: Bytes) -> Result<()> {
            Ok(())
        }

        async fn reset_timeout(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_message_serializes() {
        let sink = RecordingSink::default();
        sink.send_message(&ServerMessage::tts(TtsState::Stop, None, "s-1"))
            .await
            .unwrap();

        let texts = sink.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("\"stop\""));
    }
}
