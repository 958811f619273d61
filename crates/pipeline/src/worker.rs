//! TTS worker
//!
//! Consumes pipeline messages from the text queue, drives the segmenter,
//! synthesizes each spoken segment with bounded retry, decodes the result to
//! the connection wire format, and enqueues frame batches for the pacer.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use voice_dialog_core::{
    clean_markdown, AudioBatch, AudioFormat, ContentType, PipelineMessage, SentenceType,
    SpeechSynthesizer,
};

use crate::codec::{self, DecodedAudio};
use crate::segmenter::{Cut, Segmenter};
use crate::{PipelineError, TurnState, MAX_SYNTH_ATTEMPTS};

/// Worker configuration, fixed per connection
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory synthesized files are written to (UUID names, shared safely)
    pub output_dir: PathBuf,
    /// Remove synthesized files after decoding
    pub delete_audio: bool,
    /// Connection wire format
    pub audio_format: AudioFormat,
}

/// Per-connection synthesis worker
pub struct TtsWorker {
    config: WorkerConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    segmenter: Segmenter,
    turn: Arc<TurnState>,
    text_rx: mpsc::Receiver<PipelineMessage>,
    audio_tx: mpsc::Sender<AudioBatch>,
    stop_rx: watch::Receiver<bool>,
}

impl TtsWorker {
    pub fn new(
        config: WorkerConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        turn: Arc<TurnState>,
        text_rx: mpsc::Receiver<PipelineMessage>,
        audio_tx: mpsc::Sender<AudioBatch>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            synthesizer,
            segmenter: Segmenter::new(),
            turn,
            text_rx,
            audio_tx,
            stop_rx,
        }
    }

    /// Worker loop; exits on the stop signal or when the text queue closes
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                changed = self.stop_rx.changed() => {
                    if changed.is_err() || *self.stop_rx.borrow() {
                        break;
                    }
                }
                message = self.text_rx.recv() => {
                    let Some(message) = message else { break };
                    if self.turn.abort_requested()
                        && message.sentence_type != SentenceType::First
                    {
                        tracing::info!("barge-in active, dropping pipeline message");
                        continue;
                    }
                    self.handle(message).await;
                }
            }
        }

        if let Err(e) = self.synthesizer.close().await {
            tracing::warn!(error = %e, "synthesizer close failed");
        }
        tracing::debug!("tts worker exiting");
    }

    async fn handle(&mut self, message: PipelineMessage) {
        match (message.sentence_type, message.content_type) {
            (SentenceType::First, _) => {
                self.segmenter.reset();
                self.turn.first_audio.store(true, Ordering::Release);
            }
            (_, ContentType::Text) => {
                if let Some(chunk) = &message.content_detail {
                    self.segmenter.push(chunk);
                }
                loop {
                    match self.segmenter.try_emit() {
                        Cut::Pending => break,
                        Cut::Silent => continue,
                        Cut::Spoken(segment) => {
                            self.synthesize_segment(message.sentence_type, &segment).await;
                        }
                    }
                }
            }
            (_, ContentType::File) => {
                self.flush_residue().await;
                match &message.content_file {
                    Some(file) if file.exists() => {
                        match self.decode(file.clone()).await {
                            Ok(decoded) => {
                                self.enqueue(AudioBatch::new(
                                    message.sentence_type,
                                    decoded.frames,
                                    message.content_detail.clone(),
                                ))
                                .await;
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    file = %file.display(),
                                    "failed to decode audio file, dropping"
                                );
                            }
                        }
                    }
                    Some(file) => {
                        tracing::warn!(file = %file.display(), "audio file missing, dropping");
                    }
                    None => {}
                }
            }
            _ => {}
        }

        if message.sentence_type == SentenceType::Last {
            if self.segmenter.has_unpaired_brackets() {
                tracing::warn!("bracket imbalance at turn end, forcing drain");
            }
            self.flush_residue().await;
            self.enqueue(AudioBatch::terminal(message.content_detail)).await;
        }
    }

    /// Synthesize any residual text left in the segmenter
    async fn flush_residue(&mut self) {
        if let Some(residue) = self.segmenter.drain() {
            self.synthesize_segment(SentenceType::Middle, &residue).await;
        }
    }

    /// Synthesize one segment with bounded retry, then decode and enqueue
    ///
    /// File existence is the success oracle; a partial file is removed
    /// between attempts. On exhaustion the segment is dropped and the
    /// pipeline continues.
    async fn synthesize_segment(&mut self, sentence_type: SentenceType, segment: &str) {
        let text = clean_markdown(segment);
        if text.is_empty() {
            return;
        }

        let path = self.generate_filename();
        let mut attempts = 0u32;
        while attempts < MAX_SYNTH_ATTEMPTS && !path.exists() {
            attempts += 1;
            if let Err(e) = self.synthesizer.synthesize(&text, &path).await {
                tracing::warn!(
                    attempt = attempts,
                    error = %e,
                    "synthesis attempt failed: {text}"
                );
                let _ = std::fs::remove_file(&path);
            }
        }

        if !path.exists() {
            tracing::error!(
                "synthesis failed after {MAX_SYNTH_ATTEMPTS} attempts, dropping segment: {text}"
            );
            return;
        }
        tracing::debug!(attempts, file = %path.display(), "synthesized: {text}");

        match self.decode(path).await {
            Ok(decoded) => {
                self.enqueue(AudioBatch::new(
                    sentence_type,
                    decoded.frames,
                    Some(segment.to_string()),
                ))
                .await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to decode synthesized audio, dropping");
            }
        }
    }

    /// Decode a file off the async runtime, then apply the deletion policy
    async fn decode(&self, path: PathBuf) -> Result<DecodedAudio, PipelineError> {
        let format = self.config.audio_format;
        let decode_path = path.clone();
        let result = tokio::task::spawn_blocking(move || codec::decode_audio(&decode_path, format))
            .await
            .map_err(|e| PipelineError::Decode(e.to_string()))?;

        if result.is_ok() && self.config.delete_audio && path.starts_with(&self.config.output_dir)
        {
            let _ = std::fs::remove_file(&path);
        }
        result
    }

    async fn enqueue(&self, batch: AudioBatch) {
        if self.audio_tx.send(batch).await.is_err() {
            tracing::debug!("audio queue closed, dropping batch");
        }
    }

    /// Unique dated filename under the shared output directory
    fn generate_filename(&self) -> PathBuf {
        self.config.output_dir.join(format!(
            "tts-{}@{}.{}",
            chrono::Local::now().date_naive(),
            uuid::Uuid::new_v4().simple(),
            self.synthesizer.file_extension()
        ))
    }
}
