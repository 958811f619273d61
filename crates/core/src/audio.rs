//! Audio wire-format types and timing constants

use serde::{Deserialize, Serialize};

/// Opus frame duration on the wire, in milliseconds
pub const FRAME_DURATION_MS: u64 = 60;

/// Frames sent as an unpaced burst at the start of the first spoken segment
pub const PRE_BUFFER_FRAMES: usize = 3;

/// Keepalive reset interval during long playback, in seconds
pub const KEEPALIVE_INTERVAL_SECS: u64 = 60;

/// Encoding of outbound audio frames, negotiated per connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Raw little-endian 16-bit mono PCM at provider-native rate
    Pcm,
    /// Opus packets at 60 ms frame duration
    #[default]
    Opus,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Pcm => "pcm",
            AudioFormat::Opus => "opus",
        }
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pcm" => Ok(AudioFormat::Pcm),
            "opus" => Ok(AudioFormat::Opus),
            other => Err(crate::Error::Config(format!(
                "unknown audio format: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("pcm".parse::<AudioFormat>().unwrap(), AudioFormat::Pcm);
        assert_eq!("opus".parse::<AudioFormat>().unwrap(), AudioFormat::Opus);
        assert!("flac".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn test_default_is_opus() {
        assert_eq!(AudioFormat::default(), AudioFormat::Opus);
    }
}
