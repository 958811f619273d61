//! Core traits and types for the voice dialog server
//!
//! This crate provides foundational types used across all other crates:
//! - Pipeline message DTOs (FIRST/MIDDLE/LAST, TEXT/FILE/ACTION)
//! - Audio wire-format types and timing constants
//! - The client JSON wire protocol
//! - Emotion tagging and the deployment symbol table
//! - Text normalization (markdown cleanup, punctuation/emoji stripping)
//! - Error types
//! - Provider trait seams (synthesis, send half, directory, receiver stages)

pub mod audio;
pub mod emotion;
pub mod error;
pub mod message;
pub mod text;
pub mod traits;
pub mod wire;

pub use audio::{AudioFormat, FRAME_DURATION_MS, KEEPALIVE_INTERVAL_SECS, PRE_BUFFER_FRAMES};
pub use emotion::{analyze_emotion, emotion_symbol, EmotionStyle};
pub use error::{Error, Result};
pub use message::{AudioBatch, ContentType, PipelineMessage, SentenceType};
pub use text::{clean_markdown, strip_punctuation_and_emoji};
pub use wire::{ClientMessage, ServerMessage, TtsState};

pub use traits::{
    ClientSink, IntentRecognizer, LanguageModel, MemoryStore, OutputMeter, SpeechRecognizer,
    SpeechSynthesizer, VoiceActivityDetector, VoiceBinding, VoiceDirectory,
};
