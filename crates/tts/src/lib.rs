//! Speech synthesizer providers
//!
//! Two providers ship in-repo: the HTTP vendor adapter and the free Edge
//! fallback. Connections get their provider from [`create_synthesizer`],
//! keyed by the module name resolved at accept time.

pub mod edge;
pub mod http;

pub use edge::EdgeSynthesizer;
pub use http::HttpSynthesizer;

use std::sync::Arc;

use thiserror::Error;
use voice_dialog_config::{TtsProviderConfig, FALLBACK_TTS_MODULE};
use voice_dialog_core::SpeechSynthesizer;

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("tts configuration error: {0}")]
    Config(String),

    #[error("tts transport error: {0}")]
    Transport(String),
}

impl From<TtsError> for voice_dialog_core::Error {
    fn from(err: TtsError) -> Self {
        voice_dialog_core::Error::Config(err.to_string())
    }
}

/// Instantiate the synthesizer for a resolved module name
///
/// `edge` selects the free fallback; any other module is an HTTP vendor
/// adapter and must carry a `url` in its table.
pub fn create_synthesizer(
    module: &str,
    config: &TtsProviderConfig,
    timeout_secs: u64,
) -> Result<Arc<dyn SpeechSynthesizer>, TtsError> {
    if module == FALLBACK_TTS_MODULE {
        return Ok(Arc::new(EdgeSynthesizer::new(config)));
    }
    if config.url.is_some() {
        return Ok(Arc::new(HttpSynthesizer::new(config, timeout_secs)?));
    }
    Err(TtsError::Config(format!(
        "tts module {module} has no transport configured"
    )))
}
