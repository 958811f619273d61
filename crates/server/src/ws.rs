//! WebSocket endpoint
//!
//! Accepts one device connection per upgrade, builds the per-connection
//! provider snapshot (agent id from the URL path, voice from the directory),
//! and runs the read loop: JSON control frames flip connection flags, binary
//! frames feed the receiver. The write half lives in its own task behind a
//! [`voice_dialog_core::ClientSink`] so the pacer never touches the socket
//! directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use voice_dialog_config::ProviderSnapshot;
use voice_dialog_core::{ClientMessage, ClientSink, Result};
use voice_dialog_pipeline::QUEUE_CAPACITY;

use crate::connection::ConnectionContext;
use crate::controller::SessionController;
use crate::metrics;
use crate::receiver::AudioReceiver;
use crate::state::AppState;
use crate::ServerError;

/// Frames queued for the socket write task
enum OutboundFrame {
    Text(String),
    Binary(Bytes),
    Close,
}

/// Send half handed to the pipeline
struct WsSink {
    out_tx: mpsc::Sender<OutboundFrame>,
    idle_deadline: Arc<Mutex<tokio::time::Instant>>,
    idle_timeout: Duration,
}

impl WsSink {
    fn refresh_deadline(&self) {
        *self.idle_deadline.lock() = tokio::time::Instant::now() + self.idle_timeout;
    }
}

#[async_trait]
impl ClientSink for WsSink {
    async fn send_text(&self, payload: String) -> Result<()> {
        self.out_tx
            .send(OutboundFrame::Text(payload))
            .await
            .map_err(|_| voice_dialog_core::Error::PeerSend("socket closed".to_string()))
    }

    async fn send_audio(&self, frame: Bytes) -> Result<()> {
        self.out_tx
            .send(OutboundFrame::Binary(frame))
            .await
            .map_err(|_| voice_dialog_core::Error::PeerSend("socket closed".to_string()))
    }

    async fn reset_timeout(&self) -> Result<()> {
        self.refresh_deadline();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Best-effort: the write task may already be gone.
        let _ = self.out_tx.send(OutboundFrame::Close).await;
        Ok(())
    }
}

/// `GET /ws/:agent_id` upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, agent_id, headers))
}

/// Resolve the per-connection snapshot and its synthesizer
///
/// Voice lookup failures fall back to the free provider; configuration gaps
/// are fatal here, before any worker spawns.
async fn setup_connection(
    state: &AppState,
    agent_id: &str,
) -> std::result::Result<
    (
        ProviderSnapshot,
        Arc<dyn voice_dialog_core::SpeechSynthesizer>,
    ),
    ServerError,
> {
    let voice = match state.directory.voice_for(agent_id).await {
        Ok(voice) => voice,
        Err(e) => {
            tracing::warn!(error = %e, agent_id, "voice lookup failed, using fallback");
            None
        }
    };

    let snapshot = ProviderSnapshot::build(&state.settings, agent_id, voice)?;
    let synthesizer = voice_dialog_tts::create_synthesizer(
        &snapshot.tts_module,
        &snapshot.tts,
        snapshot.tts_timeout,
    )
    .map_err(|e| ServerError::Setup(e.to_string()))?;

    Ok((snapshot, synthesizer))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, agent_id: String, headers: HeaderMap) {
    let device_id = headers
        .get("device-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let (snapshot, synthesizer) = match setup_connection(&state, &agent_id).await {
        Ok(setup) => setup,
        Err(e) => {
            tracing::error!(error = %e, agent_id, "connection setup failed");
            close_with_diagnostic(&mut socket, &e.to_string()).await;
            return;
        }
    };

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(QUEUE_CAPACITY);
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let sent = match frame {
                OutboundFrame::Text(text) => ws_tx.send(Message::Text(text)).await,
                OutboundFrame::Binary(payload) => {
                    ws_tx.send(Message::Binary(payload.to_vec())).await
                }
                OutboundFrame::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            };
            if sent.is_err() {
                break;
            }
        }
    });

    let idle_timeout = Duration::from_secs(state.settings.server.idle_timeout_secs);
    let idle_deadline = Arc::new(Mutex::new(tokio::time::Instant::now() + idle_timeout));
    let sink: Arc<dyn ClientSink> = Arc::new(WsSink {
        out_tx,
        idle_deadline: Arc::clone(&idle_deadline),
        idle_timeout,
    });

    let conn = ConnectionContext::open(
        &state.settings,
        snapshot,
        synthesizer,
        Arc::clone(&sink),
        device_id,
        state.meter.clone(),
    );
    let controller = SessionController::new(
        conn.session_id.clone(),
        Arc::clone(&sink),
        Arc::clone(&conn.turn),
        state.settings.end_prompt.prompt.clone(),
    );
    let mut receiver = AudioReceiver::new();

    metrics::record_connection_opened();
    tracing::info!(session_id = %conn.session_id, agent_id = %conn.agent_id, "connection opened");

    loop {
        let deadline = *idle_deadline.lock();
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                // The pacer may have pushed the deadline out mid-sleep.
                if tokio::time::Instant::now() >= *idle_deadline.lock() {
                    tracing::info!(session_id = %conn.session_id, "idle timeout, closing");
                    break;
                }
            }
            message = ws_rx.next() => {
                let Some(Ok(message)) = message else { break };
                *idle_deadline.lock() = tokio::time::Instant::now() + idle_timeout;
                match message {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Abort) => {
                            tracing::info!(session_id = %conn.session_id, "barge-in");
                            conn.turn.request_abort();
                        }
                        Ok(ClientMessage::Close) => break,
                        Err(_) => {
                            tracing::debug!(frame = %text, "unrecognized control frame");
                        }
                    },
                    Message::Binary(frame) => {
                        receiver.on_audio_frame(&frame, &state, &conn, &controller).await;
                    }
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
        }
    }

    conn.shutdown().await;
    let _ = writer.await;
    metrics::record_connection_closed();
}

async fn close_with_diagnostic(socket: &mut WebSocket, reason: &str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: reason.to_string().into(),
        })))
        .await;
}
