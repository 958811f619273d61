//! Client wire protocol
//!
//! JSON text frames exchanged with the device, one object per frame. Binary
//! frames (audio) are raw payloads and never JSON.

use serde::{Deserialize, Serialize};

/// Playback lifecycle states surfaced to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsState {
    Start,
    SentenceStart,
    SentenceEnd,
    Stop,
}

/// Outbound JSON frames
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Recognized user utterance
    Stt { text: String, session_id: String },
    /// Emotion hint preceding a spoken segment
    Llm {
        text: String,
        emotion: String,
        session_id: String,
    },
    /// Playback state transition
    Tts {
        state: TtsState,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        session_id: String,
    },
}

impl ServerMessage {
    pub fn stt(text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::Stt {
            text: text.into(),
            session_id: session_id.into(),
        }
    }

    pub fn llm(
        symbol: impl Into<String>,
        emotion: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self::Llm {
            text: symbol.into(),
            emotion: emotion.into(),
            session_id: session_id.into(),
        }
    }

    pub fn tts(state: TtsState, text: Option<String>, session_id: impl Into<String>) -> Self {
        Self::Tts {
            state,
            text,
            session_id: session_id.into(),
        }
    }
}

/// Inbound JSON control frames
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Barge-in: discard queued audio until the next turn
    Abort,
    /// Orderly connection shutdown
    Close,
}
