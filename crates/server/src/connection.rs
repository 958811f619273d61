//! Per-connection context
//!
//! Created on accept, destroyed on peer close or fatal pipeline error. Owns
//! the two pipeline queues, the worker tasks, the stop signal, and the
//! monotonic sentence identifier for the connection.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use voice_dialog_config::{ProviderSnapshot, Settings};
use voice_dialog_core::{ClientSink, OutputMeter, PipelineMessage, SpeechSynthesizer};
use voice_dialog_pipeline::{
    AudioPacer, PacerConfig, TtsWorker, TurnState, WorkerConfig, QUEUE_CAPACITY,
};

/// One accepted device connection
pub struct ConnectionContext {
    pub session_id: String,
    pub agent_id: String,
    pub device_id: Option<String>,
    pub turn: Arc<TurnState>,
    pub sink: Arc<dyn ClientSink>,
    sentence_id: Mutex<Option<String>>,
    text_tx: mpsc::Sender<PipelineMessage>,
    stop_tx: watch::Sender<bool>,
}

impl ConnectionContext {
    /// Wire up the pipeline for one connection and spawn its workers
    pub fn open(
        settings: &Settings,
        snapshot: ProviderSnapshot,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn ClientSink>,
        device_id: Option<String>,
        meter: Option<Arc<dyn OutputMeter>>,
    ) -> Arc<Self> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let turn = Arc::new(TurnState::new());

        let (text_tx, text_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (audio_tx, audio_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);

        let worker = TtsWorker::new(
            WorkerConfig {
                output_dir: snapshot.tts.output_dir.clone(),
                delete_audio: snapshot.delete_audio,
                audio_format: snapshot.audio_format,
            },
            synthesizer,
            Arc::clone(&turn),
            text_rx,
            audio_tx,
            stop_rx.clone(),
        );
        tokio::spawn(worker.run());

        let pacer = AudioPacer::new(
            PacerConfig {
                session_id: session_id.clone(),
                device_id: device_id.clone(),
                emotion_style: snapshot.emotion_style,
                enable_stop_notify: settings.enable_stop_tts_notify,
                stop_notify_voice: settings.stop_tts_notify_voice.clone(),
                max_output_size: settings.max_output_size,
            },
            Arc::clone(&sink),
            Arc::clone(&turn),
            audio_rx,
            stop_rx,
            meter,
        );
        tokio::spawn(pacer.run());

        Arc::new(Self {
            session_id,
            agent_id: snapshot.agent_id.clone(),
            device_id,
            turn,
            sink,
            sentence_id: Mutex::new(None),
            text_tx,
            stop_tx,
        })
    }

    /// Current sentence id, minting one if the connection has none yet
    fn current_sentence_id(&self) -> String {
        let mut guard = self.sentence_id.lock();
        guard
            .get_or_insert_with(|| uuid::Uuid::new_v4().simple().to_string())
            .clone()
    }

    /// Open a streaming turn: fresh sentence id, FIRST on the text queue
    pub async fn begin_turn(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        *self.sentence_id.lock() = Some(id.clone());
        self.turn.llm_finished.store(false, Ordering::Release);
        self.enqueue(PipelineMessage::first(&id)).await;
        id
    }

    /// Append one LLM chunk to the open turn
    pub async fn push_chunk(&self, chunk: &str) {
        let id = self.current_sentence_id();
        self.enqueue(PipelineMessage::text(id, chunk)).await;
    }

    /// Close the open turn; the pacer emits `stop` after the queued audio
    pub async fn end_turn(&self) {
        let id = self.current_sentence_id();
        self.turn.llm_finished.store(true, Ordering::Release);
        self.enqueue(PipelineMessage::last(id)).await;
    }

    /// Speak one standalone utterance as a complete FIRST/MIDDLE/LAST turn
    pub async fn say_text(&self, text: &str) {
        let id = self.current_sentence_id();
        self.turn.llm_finished.store(false, Ordering::Release);
        self.enqueue(PipelineMessage::first(&id)).await;
        self.enqueue(PipelineMessage::text(&id, text)).await;
        self.turn.llm_finished.store(true, Ordering::Release);
        self.enqueue(PipelineMessage::last(&id)).await;
    }

    /// Play a pre-rendered audio file as a complete turn
    pub async fn say_file(&self, path: impl Into<std::path::PathBuf>, detail: Option<String>) {
        let id = self.current_sentence_id();
        self.turn.llm_finished.store(false, Ordering::Release);
        self.enqueue(PipelineMessage::first(&id)).await;
        self.enqueue(PipelineMessage::file(&id, path, detail)).await;
        self.turn.llm_finished.store(true, Ordering::Release);
        self.enqueue(PipelineMessage::last(&id)).await;
    }

    async fn enqueue(&self, message: PipelineMessage) {
        if self.text_tx.send(message).await.is_err() {
            tracing::warn!(session_id = %self.session_id, "text queue closed");
        }
    }

    /// Signal the workers to exit and close the peer
    pub async fn shutdown(&self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.sink.close().await {
            tracing::debug!(error = %e, "peer already closed");
        }
        tracing::info!(session_id = %self.session_id, "connection closed");
    }
}
