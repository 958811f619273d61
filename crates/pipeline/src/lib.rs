//! Per-connection audio/TTS pipeline
//!
//! This crate provides the staged producer/consumer pipeline that turns
//! incremental LLM text into paced audio delivery:
//! - Text Filter (stage directions, orphan quotes, stray symbols)
//! - Segmenter (incremental sentence cutting with bracket absorption)
//! - TTS Worker (synthesis with retry, wire-format decoding)
//! - Audio Pacer (wall-clock frame schedule, pre-buffer, barge-in)
//!
//! The stages communicate over two bounded FIFO queues (text queue, audio
//! queue) and share a per-turn flag set ([`TurnState`]).

pub mod codec;
pub mod filter;
pub mod pacer;
pub mod segmenter;
pub mod worker;

pub use codec::{decode_audio, DecodedAudio};
pub use filter::{filter, remove_parentheses};
pub use pacer::{AudioPacer, PacerConfig};
pub use segmenter::{Cut, Segmenter};
pub use worker::{TtsWorker, WorkerConfig};

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

/// Capacity of the text and audio queues
pub const QUEUE_CAPACITY: usize = 64;

/// Synthesis attempts per segment before the segment is dropped
pub const MAX_SYNTH_ATTEMPTS: u32 = 5;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("peer send error: {0}")]
    Send(String),

    #[error("channel closed")]
    ChannelClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PipelineError> for voice_dialog_core::Error {
    fn from(err: PipelineError) -> Self {
        use voice_dialog_core::Error;
        match err {
            PipelineError::Synthesis(msg) => Error::Synthesis(msg),
            PipelineError::Decode(msg) => Error::Decode(msg),
            PipelineError::Send(msg) => Error::PeerSend(msg),
            PipelineError::ChannelClosed => Error::ChannelClosed,
            PipelineError::Io(e) => Error::Io(e),
        }
    }
}

/// Flags shared by the receiver, the TTS worker and the audio pacer
///
/// One instance per connection. All flags are independent; none is owned by
/// the task that reads it, so every access goes through atomics.
#[derive(Debug, Default)]
pub struct TurnState {
    /// Barge-in signal; set by the receiver, observed at every queue poll
    /// and before every frame send
    pub client_abort: AtomicBool,
    /// The LLM finished producing this turn; gates the terminal `stop`
    pub llm_finished: AtomicBool,
    /// Server is currently speaking
    pub speaking: AtomicBool,
    /// Close the peer after the current chat completes
    pub close_after_chat: AtomicBool,
    /// Armed on FIRST; the first spoken segment of the turn pre-buffers
    pub first_audio: AtomicBool,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort_requested(&self) -> bool {
        self.client_abort.load(Ordering::Acquire)
    }

    pub fn request_abort(&self) {
        self.client_abort.store(true, Ordering::Release);
    }

    pub fn clear_abort(&self) {
        self.client_abort.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let core: voice_dialog_core::Error = PipelineError::Synthesis("down".into()).into();
        assert!(matches!(core, voice_dialog_core::Error::Synthesis(_)));

        let core: voice_dialog_core::Error = PipelineError::ChannelClosed.into();
        assert!(matches!(core, voice_dialog_core::Error::ChannelClosed));
    }

    #[test]
    fn test_turn_state_abort() {
        let state = TurnState::new();
        assert!(!state.abort_requested());
        state.request_abort();
        assert!(state.abort_requested());
        state.clear_abort();
        assert!(!state.abort_requested());
    }
}
