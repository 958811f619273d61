//! Core traits for the voice dialog system
//!
//! All external collaborators plug in through these traits to enable:
//! - Pluggable backends (swap implementations without code changes)
//! - Testing with mocks
//! - Per-connection selection based on configuration
//!
//! # Trait Hierarchy
//!
//! ```text
//! Synthesis:
//!   - SpeechSynthesizer: Text → audio file
//!
//! Connection:
//!   - ClientSink: peer send half (JSON frames, audio frames, keepalive)
//!   - VoiceDirectory: agent id → bound voice
//!
//! Receiver-side providers:
//!   - VoiceActivityDetector, SpeechRecognizer, LanguageModel,
//!     MemoryStore, IntentRecognizer
//!
//! Metering:
//!   - OutputMeter: per-device spoken-character counting
//! ```

mod directory;
mod providers;
mod sink;
mod synth;

pub use directory::{VoiceBinding, VoiceDirectory};
pub use providers::{
    IntentRecognizer, LanguageModel, MemoryStore, OutputMeter, SpeechRecognizer,
    VoiceActivityDetector,
};
pub use sink::ClientSink;
pub use synth::SpeechSynthesizer;
