//! Receiver-side driving of VAD, ASR and the LLM
//!
//! Inbound microphone frames accumulate while the detector reports speech;
//! when the utterance ends it is transcribed and handed to the LLM, whose
//! chunk stream feeds the open pipeline turn. Runs concurrently with the
//! control-frame read loop so barge-in stays responsive.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::StreamExt;

use crate::connection::ConnectionContext;
use crate::controller::SessionController;
use crate::metrics;
use crate::state::AppState;

/// Intent handler that ends the conversation after the reply finishes
const EXIT_INTENT: &str = "exit";

/// Per-connection utterance accumulator
#[derive(Default)]
pub struct AudioReceiver {
    buffer: Vec<u8>,
    in_speech: bool,
}

impl AudioReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one inbound microphone frame
    ///
    /// Utterance finalization spawns the chat task and returns immediately,
    /// so abort frames keep flowing through the read loop.
    pub async fn on_audio_frame(
        &mut self,
        frame: &[u8],
        state: &AppState,
        conn: &Arc<ConnectionContext>,
        controller: &SessionController,
    ) {
        let Some(vad) = &state.vad else {
            tracing::trace!("no vad configured, dropping audio frame");
            return;
        };

        match vad.detect(frame).await {
            Ok(true) => {
                self.in_speech = true;
                self.buffer.extend_from_slice(frame);
            }
            Ok(false) if self.in_speech => {
                self.in_speech = false;
                let audio = std::mem::take(&mut self.buffer);
                self.finalize_utterance(audio, state, conn, controller).await;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "vad failed on frame");
            }
        }
    }

    async fn finalize_utterance(
        &mut self,
        audio: Vec<u8>,
        state: &AppState,
        conn: &Arc<ConnectionContext>,
        controller: &SessionController,
    ) {
        let Some(asr) = &state.asr else {
            tracing::trace!("no asr configured, dropping utterance");
            return;
        };

        match asr.transcribe(&audio).await {
            Ok(text) if !text.trim().is_empty() => {
                let state = state.clone();
                let conn = Arc::clone(conn);
                let controller = controller.clone();
                tokio::spawn(async move {
                    handle_utterance(&state, &conn, &controller, &text).await;
                });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
            }
        }
    }
}

/// Drive one recognized utterance through memory, intent and the LLM
pub async fn handle_utterance(
    state: &AppState,
    conn: &Arc<ConnectionContext>,
    controller: &SessionController,
    text: &str,
) {
    // A new utterance lifts any standing barge-in.
    conn.turn.clear_abort();

    if let Err(e) = controller.utterance_recognized(text).await {
        tracing::error!(error = %e, "failed to surface utterance");
        return;
    }

    if let Some(memory) = &state.memory {
        if let Err(e) = memory.save(&conn.session_id, "user", text).await {
            tracing::warn!(error = %e, "memory save failed");
        }
    }

    if let Some(intent) = &state.intent {
        match intent.recognize(text).await {
            Ok(Some(handler)) if handler == EXIT_INTENT => {
                tracing::info!("exit intent recognized, closing after this chat");
                conn.turn.close_after_chat.store(true, Ordering::Release);
            }
            Ok(Some(handler)) => {
                tracing::debug!(handler, "intent recognized");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "intent recognition failed");
            }
        }
    }

    let Some(llm) = &state.llm else {
        tracing::warn!("no llm configured, utterance goes unanswered");
        return;
    };

    conn.begin_turn().await;
    let mut reply = String::new();
    {
        let mut stream = llm.chat_stream(&conn.session_id, text);
        while let Some(chunk) = stream.next().await {
            if conn.turn.abort_requested() {
                tracing::info!("barge-in during generation, truncating turn");
                break;
            }
            match chunk {
                Ok(chunk) => {
                    reply.push_str(&chunk);
                    conn.push_chunk(&chunk).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "llm stream failed mid-turn");
                    break;
                }
            }
        }
    }
    conn.end_turn().await;
    metrics::record_turn();

    if !reply.is_empty() {
        if let Some(memory) = &state.memory {
            if let Err(e) = memory.save(&conn.session_id, "assistant", &reply).await {
                tracing::warn!(error = %e, "memory save failed");
            }
        }
    }
}
