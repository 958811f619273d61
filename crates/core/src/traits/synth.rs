//! Speech synthesis trait

use std::path::Path;

use async_trait::async_trait;

use crate::Result;

/// Text-to-speech capability
///
/// Implementations write one synthesized audio file per call (wav/mp3/opus
/// container). The pipeline owns retries and wire-format decoding; providers
/// only produce the file.
///
/// # Example
///
/// ```ignore
/// let tts: Arc<dyn SpeechSynthesizer> = registry.create("edge", &snapshot.tts)?;
/// tts.synthesize("你好", Path::new("tmp/tts-xyz.mp3")).await?;
/// ```
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + std::fmt::Debug + 'static {
    /// Synthesize `text` into an audio file at `out_path`
    ///
    /// A call that returns `Ok` without creating the file counts as a
    /// failed attempt; file existence is the success oracle.
    async fn synthesize(&self, text: &str, out_path: &Path) -> Result<()>;

    /// Container extension this provider produces (`wav`, `mp3`, ...)
    fn file_extension(&self) -> &str {
        "wav"
    }

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Release transport resources (open sockets) on connection shutdown
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct MockSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for MockSynthesizer {
        async fn synthesize(&self, _text: &str, out_path: &Path) -> Result<()> {
            std::fs::write(out_path, b"RIFF")?;
            Ok(())
        }

        fn name(&self) -> &str {
            "mock-tts"
        }
    }

    #[tokio::test]
    async fn test_mock_synthesizer_writes_file() {
        let synth = MockSynthesizer;
        let dir = std::env::temp_dir().join("voice-dialog-core-synth-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.wav");

        synth.synthesize("hello", &path).await.unwrap();
        assert!(path.exists());
        assert_eq!(synth.file_extension(), "wav");

        std::fs::remove_file(&path).unwrap();
    }
}
