//! Free fallback synthesizer over the Edge read-aloud WebSocket service
//!
//! Used when the agent has no bound voice. One short-lived WebSocket per
//! synthesis call: send the speech config and an SSML frame, then collect
//! binary audio messages until the turn ends and write the MP3 payload to
//! the output file.

use std::path::Path;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use voice_dialog_config::TtsProviderConfig;
use voice_dialog_core::{Result, SpeechSynthesizer};

const ENDPOINT: &str =
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";
// Public token used by every edge read-aloud client.
const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";
const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";
const DEFAULT_VOICE: &str = "zh-CN-XiaoxiaoNeural";

#[derive(Debug)]
pub struct EdgeSynthesizer {
    voice: String,
}

impl EdgeSynthesizer {
    pub fn new(config: &TtsProviderConfig) -> Self {
        Self {
            voice: config
                .voice
                .clone()
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
        }
    }

    fn timestamp() -> String {
        chrono::Utc::now()
            .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
            .to_string()
    }

    fn speech_config_frame() -> String {
        format!(
            "X-Timestamp:{}\r\nContent-Type:application/json; charset=utf-8\r\nPath:speech.config\r\n\r\n\
             {{\"context\":{{\"synthesis\":{{\"audio\":{{\"metadataoptions\":{{\
             \"sentenceBoundaryEnabled\":\"false\",\"wordBoundaryEnabled\":\"false\"}},\
             \"outputFormat\":\"{OUTPUT_FORMAT}\"}}}}}}}}",
            Self::timestamp()
        )
    }

    fn ssml_frame(&self, request_id: &str, text: &str) -> String {
        let ssml = format!(
            "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='en-US'>\
             <voice name='{}'><prosody pitch='+0Hz' rate='+0%' volume='+0%'>{}</prosody></voice>\
             </speak>",
            self.voice,
            escape_xml(text)
        );
        format!(
            "X-RequestId:{request_id}\r\nContent-Type:application/ssml+xml\r\n\
             X-Timestamp:{}\r\nPath:ssml\r\n\r\n{ssml}",
            Self::timestamp()
        )
    }
}

/// Extract the audio payload from one binary service message
///
/// Layout: 2-byte big-endian header length, header text, payload. Only
/// messages whose header carries `Path:audio` hold audio.
fn audio_payload(message: &[u8]) -> Option<&[u8]> {
    if message.len() < 2 {
        return None;
    }
    let header_len = u16::from_be_bytes([message[0], message[1]]) as usize;
    if message.len() < 2 + header_len {
        return None;
    }
    let header = std::str::from_utf8(&message[2..2 + header_len]).ok()?;
    header
        .contains("Path:audio")
        .then(|| &message[2 + header_len..])
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

#[async_trait]
impl SpeechSynthesizer for EdgeSynthesizer {
    async fn synthesize(&self, text: &str, out_path: &Path) -> Result<()> {
        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let url = format!(
            "{ENDPOINT}?TrustedClientToken={TRUSTED_CLIENT_TOKEN}&ConnectionId={request_id}"
        );

        let (mut socket, _) = connect_async(&url)
            .await
            .map_err(|e| voice_dialog_core::Error::Synthesis(format!("edge connect: {e}")))?;

        socket
            .send(Message::Text(Self::speech_config_frame()))
            .await
            .map_err(|e| voice_dialog_core::Error::Synthesis(e.to_string()))?;
        socket
            .send(Message::Text(self.ssml_frame(&request_id, text)))
            .await
            .map_err(|e| voice_dialog_core::Error::Synthesis(e.to_string()))?;

        let mut audio = Vec::new();
        while let Some(message) = socket.next().await {
            match message.map_err(|e| voice_dialog_core::Error::Synthesis(e.to_string()))? {
                Message::Binary(payload) => {
                    if let Some(chunk) = audio_payload(&payload) {
                        audio.extend_from_slice(chunk);
                    }
                }
                Message::Text(frame) => {
                    if frame.contains("Path:turn.end") {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        let _ = socket.close(None).await;

        if audio.is_empty() {
            return Err(voice_dialog_core::Error::Synthesis(
                "edge returned no audio".to_string(),
            ));
        }
        tokio::fs::write(out_path, &audio).await?;
        Ok(())
    }

    fn file_extension(&self) -> &str {
        "mp3"
    }

    fn name(&self) -> &str {
        "edge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_voice_when_unbound() {
        let synth = EdgeSynthesizer::new(&TtsProviderConfig::default());
        assert_eq!(synth.voice, DEFAULT_VOICE);
    }

    #[test]
    fn test_ssml_escapes_markup() {
        let synth = EdgeSynthesizer::new(&TtsProviderConfig {
            voice: Some("en-US-AriaNeural".to_string()),
            ..Default::default()
        });
        let frame = synth.ssml_frame("req-1", "a < b & c");
        assert!(frame.contains("a &lt; b &amp; c"));
        assert!(frame.contains("en-US-AriaNeural"));
        assert!(frame.contains("Path:ssml"));
    }

    #[test]
    fn test_audio_payload_extraction() {
        let header = b"X-RequestId:1\r\nPath:audio\r\n";
        let mut message = Vec::new();
        message.extend_from_slice(&(header.len() as u16).to_be_bytes());
        message.extend_from_slice(header);
        message.extend_from_slice(b"MP3DATA");

        assert_eq!(audio_payload(&message), Some(&b"MP3DATA"[..]));
    }

    #[test]
    fn test_non_audio_binary_ignored() {
        let header = b"Path:turn.start\r\n";
        let mut message = Vec::new();
        message.extend_from_slice(&(header.len() as u16).to_be_bytes());
        message.extend_from_slice(header);
        message.extend_from_slice(b"ignored");

        assert_eq!(audio_payload(&message), None);
        assert_eq!(audio_payload(&[0x01]), None);
    }
}
