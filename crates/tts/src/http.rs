//! HTTP vendor adapter
//!
//! Speaks to any vendor exposing a synthesize-to-file endpoint. The request
//! body comes from the provider table's `params` template: string values may
//! carry `{prompt_text}` and `{voice}` placeholders, replaced per call.
//! Vendors with a `voiceType` of `clone` receive a plain JSON post without
//! the configured headers.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};
use voice_dialog_config::TtsProviderConfig;
use voice_dialog_core::{Result, SpeechSynthesizer};

use crate::TtsError;

#[derive(Debug)]
pub struct HttpSynthesizer {
    client: reqwest::Client,
    url: String,
    method: String,
    headers: HeaderMap,
    params: Map<String, Value>,
    format: String,
    voice: Option<String>,
}

impl HttpSynthesizer {
    pub fn new(config: &TtsProviderConfig, timeout_secs: u64) -> std::result::Result<Self, TtsError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| TtsError::Config("http tts provider requires a url".to_string()))?;

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| TtsError::Config(format!("bad header name {key}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TtsError::Config(format!("bad header value for {key}: {e}")))?;
            headers.insert(name, value);
        }

        let params = config
            .params_object()
            .map_err(|e| TtsError::Config(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TtsError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url,
            method: config.method.to_uppercase(),
            headers,
            params,
            format: config.format.clone(),
            voice: config.voice.clone(),
        })
    }

    /// Instantiate the params template for one segment
    fn build_body(&self, text: &str) -> Map<String, Value> {
        let voice = self.voice.as_deref().unwrap_or_default();
        let mut body = Map::with_capacity(self.params.len());
        for (key, value) in &self.params {
            let value = match value {
                Value::String(s) => Value::String(
                    s.replace("{prompt_text}", text).replace("{voice}", voice),
                ),
                other => other.clone(),
            };
            body.insert(key.clone(), value);
        }
        body
    }

    fn voice_type(&self) -> &str {
        self.params
            .get("voiceType")
            .and_then(Value::as_str)
            .unwrap_or("fixed")
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, out_path: &Path) -> Result<()> {
        let body = self.build_body(text);

        let request = match (self.method.as_str(), self.voice_type()) {
            ("GET", _) => {
                let query: Vec<(String, String)> = body
                    .iter()
                    .map(|(k, v)| {
                        let value = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), value)
                    })
                    .collect();
                self.client
                    .get(&self.url)
                    .headers(self.headers.clone())
                    .query(&query)
            }
            (_, "clone") => self.client.post(&self.url).json(&body),
            _ => self
                .client
                .post(&self.url)
                .headers(self.headers.clone())
                .json(&body),
        };

        let response = request
            .send()
            .await
            .map_err(|e| voice_dialog_core::Error::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(voice_dialog_core::Error::Synthesis(format!(
                "tts request failed: {status} - {detail}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| voice_dialog_core::Error::Synthesis(e.to_string()))?;
        tokio::fs::write(out_path, &audio).await?;
        Ok(())
    }

    fn file_extension(&self) -> &str {
        &self.format
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(params: Value) -> TtsProviderConfig {
        TtsProviderConfig {
            url: Some("http://localhost:9880/speech".to_string()),
            params: Some(params),
            voice: Some("vivid-1".to_string()),
            format: "mp3".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_body_templating() {
        let synth = HttpSynthesizer::new(
            &config(serde_json::json!({
                "text": "{prompt_text}",
                "speaker": "{voice}",
                "speed": 1.0,
            })),
            10,
        )
        .unwrap();

        let body = synth.build_body("你好");
        assert_eq!(body["text"], "你好");
        assert_eq!(body["speaker"], "vivid-1");
        assert_eq!(body["speed"], 1.0);
    }

    #[test]
    fn test_voice_type_defaults_to_fixed() {
        let synth = HttpSynthesizer::new(&config(serde_json::json!({})), 10).unwrap();
        assert_eq!(synth.voice_type(), "fixed");

        let synth =
            HttpSynthesizer::new(&config(serde_json::json!({"voiceType": "clone"})), 10).unwrap();
        assert_eq!(synth.voice_type(), "clone");
    }

    #[test]
    fn test_missing_url_is_a_config_error() {
        let result = HttpSynthesizer::new(&TtsProviderConfig::default(), 10);
        assert!(matches!(result, Err(TtsError::Config(_))));
    }

    #[test]
    fn test_extension_follows_configured_format() {
        let synth = HttpSynthesizer::new(&config(serde_json::json!({})), 10).unwrap();
        assert_eq!(synth.file_extension(), "mp3");
    }
}
