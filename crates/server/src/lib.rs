//! Voice Dialog Server
//!
//! WebSocket endpoint and per-connection wiring: connection context,
//! provider snapshot construction, the session controller, and the
//! receiver-side driving of VAD/ASR/LLM.

pub mod connection;
pub mod controller;
pub mod directory;
pub mod http;
pub mod metrics;
pub mod receiver;
pub mod state;
pub mod ws;

pub use connection::ConnectionContext;
pub use controller::SessionController;
pub use directory::StaticVoiceDirectory;
pub use http::create_router;
pub use metrics::init_metrics;
pub use receiver::{handle_utterance, AudioReceiver};
pub use state::AppState;
pub use ws::ws_handler;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Connection setup error: {0}")]
    Setup(String),
}

impl From<voice_dialog_config::ConfigError> for ServerError {
    fn from(err: voice_dialog_config::ConfigError) -> Self {
        ServerError::Setup(err.to_string())
    }
}
