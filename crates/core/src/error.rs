//! Error types shared across the voice dialog crates

use thiserror::Error;

/// Result alias used throughout the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
///
/// Recoverable errors (synthesis, decode) stay inside the component that
/// owns the resource; fatal errors (peer send, configuration) propagate and
/// flip the connection's stop signal.
#[derive(Error, Debug)]
pub enum Error {
    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("audio decode error: {0}")]
    Decode(String),

    #[error("peer send error: {0}")]
    PeerSend(String),

    #[error("channel closed")]
    ChannelClosed,

    #[error("timeout after {0}s")]
    Timeout(u64),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("voice directory error: {0}")]
    Directory(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the pipeline may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Synthesis(_) | Error::Decode(_) | Error::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable() {
        assert!(Error::Synthesis("provider down".into()).is_recoverable());
        assert!(Error::Decode("bad header".into()).is_recoverable());
        assert!(!Error::PeerSend("socket closed".into()).is_recoverable());
        assert!(!Error::ChannelClosed.is_recoverable());
    }
}
