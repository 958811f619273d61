//! Pipeline message DTOs
//!
//! Typed messages that flow through the per-connection pipeline: the text
//! queue carries [`PipelineMessage`]s from the receiver into the TTS worker,
//! the audio queue carries [`AudioBatch`]es from the worker into the pacer.

use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Position of a message within one sentence turn
///
/// Exactly one `First` and one `Last` bracket every sentence; between them
/// zero or more `Middle` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentenceType {
    First,
    Middle,
    Last,
}

/// Payload kind of a pipeline message
///
/// `First`/`Last` carry `Action` (no payload); `Middle` carries either
/// `Text` or `File`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    File,
    Action,
}

/// A message on the text queue
#[derive(Debug, Clone)]
pub struct PipelineMessage {
    /// Opaque sentence identifier, stable for the whole turn
    pub sentence_id: String,
    pub sentence_type: SentenceType,
    pub content_type: ContentType,
    /// Text payload for `Text` messages; transcript hint for `File` messages
    pub content_detail: Option<String>,
    /// Audio file payload for `File` messages
    pub content_file: Option<PathBuf>,
}

impl PipelineMessage {
    /// Turn-opening marker
    pub fn first(sentence_id: impl Into<String>) -> Self {
        Self {
            sentence_id: sentence_id.into(),
            sentence_type: SentenceType::First,
            content_type: ContentType::Action,
            content_detail: None,
            content_file: None,
        }
    }

    /// Turn-closing marker
    pub fn last(sentence_id: impl Into<String>) -> Self {
        Self {
            sentence_id: sentence_id.into(),
            sentence_type: SentenceType::Last,
            content_type: ContentType::Action,
            content_detail: None,
            content_file: None,
        }
    }

    /// Incremental text chunk
    pub fn text(sentence_id: impl Into<String>, chunk: impl Into<String>) -> Self {
        Self {
            sentence_id: sentence_id.into(),
            sentence_type: SentenceType::Middle,
            content_type: ContentType::Text,
            content_detail: Some(chunk.into()),
            content_file: None,
        }
    }

    /// Pre-rendered audio file, with an optional transcript for the client
    pub fn file(
        sentence_id: impl Into<String>,
        path: impl Into<PathBuf>,
        detail: Option<String>,
    ) -> Self {
        Self {
            sentence_id: sentence_id.into(),
            sentence_type: SentenceType::Middle,
            content_type: ContentType::File,
            content_detail: detail,
            content_file: Some(path.into()),
        }
    }

    /// Check the payload invariant for this message
    pub fn is_well_formed(&self) -> bool {
        match self.sentence_type {
            SentenceType::First | SentenceType::Last => {
                self.content_type == ContentType::Action
            }
            SentenceType::Middle => match self.content_type {
                ContentType::Text => self.content_detail.is_some(),
                ContentType::File => self.content_file.is_some(),
                ContentType::Action => false,
            },
        }
    }
}

/// A batch of encoded audio frames on the audio queue
///
/// Frames are Opus packets at 60 ms cadence or raw PCM chunks, depending on
/// the connection's wire format. A `Last` batch with no frames tells the
/// pacer to emit the terminal `stop` status.
#[derive(Debug, Clone)]
pub struct AudioBatch {
    pub sentence_type: SentenceType,
    pub frames: Vec<Bytes>,
    /// Originating text, shown to the client around playback
    pub text: Option<String>,
}

impl AudioBatch {
    pub fn new(sentence_type: SentenceType, frames: Vec<Bytes>, text: Option<String>) -> Self {
        Self {
            sentence_type,
            frames,
            text,
        }
    }

    /// Zero-frame marker batch that closes the turn
    pub fn terminal(text: Option<String>) -> Self {
        Self {
            sentence_type: SentenceType::Last,
            frames: Vec::new(),
            text,
        }
    }
}
