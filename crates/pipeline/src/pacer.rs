//! Audio pacer
//!
//! Consumes frame batches from the audio queue and delivers them to the
//! client under a fixed per-frame wall-clock schedule. The send schedule is
//! anchored to the start of each segment so accumulated synthesis jitter
//! does not skew playback; a three-frame pre-buffer absorbs first-frame
//! network variance.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use voice_dialog_core::{
    analyze_emotion, emotion_symbol, AudioBatch, ClientSink, EmotionStyle, OutputMeter,
    SentenceType, ServerMessage, TtsState, FRAME_DURATION_MS, KEEPALIVE_INTERVAL_SECS,
    PRE_BUFFER_FRAMES,
};

use crate::{codec, filter, PipelineError, TurnState};

/// Pacer configuration, fixed per connection
#[derive(Debug, Clone)]
pub struct PacerConfig {
    pub session_id: String,
    /// Device identity for output metering
    pub device_id: Option<String>,
    pub emotion_style: EmotionStyle,
    /// Play a notification sound after the terminal `stop`
    pub enable_stop_notify: bool,
    pub stop_notify_voice: PathBuf,
    /// Metering threshold; zero disables the hook
    pub max_output_size: u64,
}

/// Per-connection paced frame delivery
pub struct AudioPacer {
    config: PacerConfig,
    sink: Arc<dyn ClientSink>,
    turn: Arc<TurnState>,
    audio_rx: mpsc::Receiver<AudioBatch>,
    stop_rx: watch::Receiver<bool>,
    meter: Option<Arc<dyn OutputMeter>>,
}

impl AudioPacer {
    pub fn new(
        config: PacerConfig,
        sink: Arc<dyn ClientSink>,
        turn: Arc<TurnState>,
        audio_rx: mpsc::Receiver<AudioBatch>,
        stop_rx: watch::Receiver<bool>,
        meter: Option<Arc<dyn OutputMeter>>,
    ) -> Self {
        Self {
            config,
            sink,
            turn,
            audio_rx,
            stop_rx,
            meter,
        }
    }

    /// Pacer loop; exits on the stop signal, a closed queue, or a fatal
    /// peer send failure
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                changed = self.stop_rx.changed() => {
                    if changed.is_err() || *self.stop_rx.borrow() {
                        break;
                    }
                }
                batch = self.audio_rx.recv() => {
                    let Some(batch) = batch else { break };
                    if self.turn.abort_requested()
                        && batch.sentence_type != SentenceType::Last
                    {
                        tracing::debug!("discarding queued audio after barge-in");
                        continue;
                    }
                    if let Err(e) = self.handle_batch(batch).await {
                        tracing::error!(error = %e, "peer send failed, pacer exiting");
                        break;
                    }
                }
            }
        }
        tracing::debug!("audio pacer exiting");
    }

    async fn handle_batch(&mut self, batch: AudioBatch) -> Result<(), PipelineError> {
        // The client's transcript view gets the filter once more.
        let text = batch.text.as_deref().and_then(filter::filter);

        if let Some(text) = &text {
            let emotion = analyze_emotion(text);
            let symbol = emotion_symbol(emotion, self.config.emotion_style);
            self.send(ServerMessage::llm(symbol, emotion, &self.config.session_id))
                .await?;
        }

        let mut pre_buffer = false;
        if text.is_some() && self.turn.first_audio.load(Ordering::Acquire) {
            tracing::info!("sending first speech segment: {}", text.as_deref().unwrap_or(""));
            self.turn.first_audio.store(false, Ordering::Release);
            pre_buffer = true;
        }

        self.send(ServerMessage::tts(
            TtsState::SentenceStart,
            text.clone(),
            &self.config.session_id,
        ))
        .await?;

        self.play(&batch.frames, pre_buffer).await?;

        self.send(ServerMessage::tts(
            TtsState::SentenceEnd,
            text.clone(),
            &self.config.session_id,
        ))
        .await?;

        if batch.sentence_type == SentenceType::Last
            && self.turn.llm_finished.load(Ordering::Acquire)
        {
            self.finish_turn().await?;
        }

        if self.config.max_output_size > 0 {
            if let (Some(meter), Some(device), Some(text)) =
                (&self.meter, &self.config.device_id, &text)
            {
                meter.add_output(device, text.chars().count());
            }
        }

        Ok(())
    }

    /// Terminal `stop`, optional notification sound, speaking-state cleanup
    async fn finish_turn(&mut self) -> Result<(), PipelineError> {
        self.send(ServerMessage::tts(
            TtsState::Stop,
            None,
            &self.config.session_id,
        ))
        .await?;

        if self.config.enable_stop_notify {
            match codec::decode_audio(
                &self.config.stop_notify_voice,
                voice_dialog_core::AudioFormat::Opus,
            ) {
                Ok(decoded) => self.play(&decoded.frames, true).await?,
                Err(e) => {
                    tracing::warn!(error = %e, "stop notification sound unavailable");
                }
            }
        }

        self.turn.speaking.store(false, Ordering::Release);

        if self.turn.close_after_chat.load(Ordering::Acquire) {
            tracing::info!("chat complete, closing peer");
            if let Err(e) = self.sink.close().await {
                tracing::warn!(error = %e, "peer close failed");
            }
        }

        Ok(())
    }

    /// Send frames on a wall-clock schedule anchored at entry
    ///
    /// With `pre_buffer`, up to the first three frames go out as an unpaced
    /// burst. Remaining frames are scheduled at 60 ms intervals; the abort
    /// flag is checked before every send, and the connection idle timer is
    /// refreshed once a minute during long segments.
    async fn play(&mut self, frames: &[Bytes], pre_buffer: bool) -> Result<(), PipelineError> {
        if frames.is_empty() {
            return Ok(());
        }

        let start = tokio::time::Instant::now();
        let mut play_position: u64 = 0;
        let mut last_reset = tokio::time::Instant::now();

        let remaining = if pre_buffer {
            let burst = frames.len().min(PRE_BUFFER_FRAMES);
            for frame in &frames[..burst] {
                self.send_audio(frame.clone()).await?;
            }
            &frames[burst..]
        } else {
            frames
        };

        for frame in remaining {
            if self.turn.abort_requested() {
                tracing::debug!("barge-in during playback, stopping segment");
                break;
            }

            if last_reset.elapsed() > Duration::from_secs(KEEPALIVE_INTERVAL_SECS) {
                // A failed reset is logged and swallowed; playback continues.
                if let Err(e) = self.sink.reset_timeout().await {
                    tracing::warn!(error = %e, "keepalive reset failed");
                }
                last_reset = tokio::time::Instant::now();
            }

            let expected = start + Duration::from_millis(play_position);
            tokio::time::sleep_until(expected).await;

            self.send_audio(frame.clone()).await?;
            play_position += FRAME_DURATION_MS;
        }

        Ok(())
    }

    async fn send(&self, message: ServerMessage) -> Result<(), PipelineError> {
        self.sink
            .send_message(&message)
            .await
            .map_err(|e| PipelineError::Send(e.to_string()))
    }

    async fn send_audio(&self, frame: Bytes) -> Result<(), PipelineError> {
        self.sink
            .send_audio(frame)
            .await
            .map_err(|e| PipelineError::Send(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Text(serde_json::Value),
        Audio(tokio::time::Instant),
        Closed,
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Sent>>,
    }

    #[async_trait]
    impl ClientSink for RecordingSink {
        async fn send_text(&self, payload: String) -> voice_dialog_core::Result<()> {
            self.sent
                .lock()
                .push(Sent::Text(serde_json::from_str(&payload).unwrap()));
            Ok(())
        }

        async fn send_audio(&self, _frame: Bytes) -> voice_dialog_core::Result<()> {
            self.sent.lock().push(Sent::Audio(tokio::time::Instant::now()));
            Ok(())
        }

        async fn reset_timeout(&self) -> voice_dialog_core::Result<()> {
            Ok(())
        }

        async fn close(&self) -> voice_dialog_core::Result<()> {
            self.sent.lock().push(Sent::Closed);
            Ok(())
        }
    }

    struct Harness {
        audio_tx: mpsc::Sender<AudioBatch>,
        sink: Arc<RecordingSink>,
        turn: Arc<TurnState>,
        _stop_tx: watch::Sender<bool>,
    }

    fn spawn_pacer() -> Harness {
        let sink = Arc::new(RecordingSink::default());
        let turn = Arc::new(TurnState::new());
        let (audio_tx, audio_rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = watch::channel(false);

        let pacer = AudioPacer::new(
            PacerConfig {
                session_id: "s-1".to_string(),
                device_id: None,
                emotion_style: EmotionStyle::Emoji,
                enable_stop_notify: false,
                stop_notify_voice: PathBuf::new(),
                max_output_size: 0,
            },
            Arc::clone(&sink) as Arc<dyn ClientSink>,
            Arc::clone(&turn),
            audio_rx,
            stop_rx,
            None,
        );
        tokio::spawn(pacer.run());

        Harness {
            audio_tx,
            sink,
            turn,
            _stop_tx: stop_tx,
        }
    }

    fn frames(n: usize) -> Vec<Bytes> {
        (0..n).map(|_| Bytes::from_static(&[0u8; 8])).collect()
    }

    async fn drain_until<F: Fn(&[Sent]) -> bool>(sink: &RecordingSink, done: F) {
        for _ in 0..200 {
            if done(sink.sent.lock().as_slice()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached; sent: {:?}", *sink.sent.lock());
    }

    #[tokio::test(start_paused = true)]
    async fn test_segment_protocol_order() {
        let harness = spawn_pacer();
        harness.turn.first_audio.store(false, Ordering::Release);

        harness
            .audio_tx
            .send(AudioBatch::new(
                SentenceType::Middle,
                frames(2),
                Some("你好。".to_string()),
            ))
            .await
            .unwrap();

        drain_until(&harness.sink, |sent| sent.len() == 5).await;

        let sent = harness.sink.sent.lock();
        // llm hint, sentence_start, two frames, sentence_end
        match &sent[0] {
            Sent::Text(v) => {
                assert_eq!(v["type"], "llm");
                assert_eq!(v["session_id"], "s-1");
            }
            other => panic!("expected llm frame, got {other:?}"),
        }
        match &sent[1] {
            Sent::Text(v) => {
                assert_eq!(v["state"], "sentence_start");
                assert_eq!(v["text"], "你好。");
            }
            other => panic!("expected sentence_start, got {other:?}"),
        }
        assert!(matches!(sent[2], Sent::Audio(_)));
        assert!(matches!(sent[3], Sent::Audio(_)));
        match &sent[4] {
            Sent::Text(v) => assert_eq!(v["state"], "sentence_end"),
            other => panic!("expected sentence_end, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_paced_at_frame_duration() {
        let harness = spawn_pacer();
        harness.turn.first_audio.store(false, Ordering::Release);

        harness
            .audio_tx
            .send(AudioBatch::new(
                SentenceType::Middle,
                frames(5),
                Some("测试。".to_string()),
            ))
            .await
            .unwrap();

        drain_until(&harness.sink, |sent| {
            sent.iter().filter(|s| matches!(s, Sent::Audio(_))).count() == 5
        })
        .await;

        let sent = harness.sink.sent.lock();
        let stamps: Vec<_> = sent
            .iter()
            .filter_map(|s| match s {
                Sent::Audio(t) => Some(*t),
                _ => None,
            })
            .collect();
        for pair in stamps.windows(2) {
            let gap = pair[1].duration_since(pair[0]);
            assert!(
                gap >= Duration::from_millis(FRAME_DURATION_MS),
                "frames only {gap:?} apart"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_segment_pre_buffers_three_frames() {
        let harness = spawn_pacer();
        // first_audio is armed, as after a FIRST message.
        harness.turn.first_audio.store(true, Ordering::Release);

        harness
            .audio_tx
            .send(AudioBatch::new(
                SentenceType::Middle,
                frames(6),
                Some("预热。".to_string()),
            ))
            .await
            .unwrap();

        drain_until(&harness.sink, |sent| {
            sent.iter().filter(|s| matches!(s, Sent::Audio(_))).count() == 6
        })
        .await;

        let sent = harness.sink.sent.lock();
        let stamps: Vec<_> = sent
            .iter()
            .filter_map(|s| match s {
                Sent::Audio(t) => Some(*t),
                _ => None,
            })
            .collect();

        // Burst frames share one instant; the flag is consumed.
        assert_eq!(stamps[0], stamps[1]);
        assert_eq!(stamps[1], stamps[2]);
        assert!(!harness.turn.first_audio.load(Ordering::Acquire));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_batch_emits_stop_and_clears_speaking() {
        let harness = spawn_pacer();
        harness.turn.first_audio.store(false, Ordering::Release);
        harness.turn.speaking.store(true, Ordering::Release);
        harness.turn.llm_finished.store(true, Ordering::Release);

        harness
            .audio_tx
            .send(AudioBatch::terminal(None))
            .await
            .unwrap();

        drain_until(&harness.sink, |sent| {
            sent.iter().any(|s| matches!(s, Sent::Text(v) if v["state"] == "stop"))
        })
        .await;

        assert!(!harness.turn.speaking.load(Ordering::Acquire));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_discards_queued_audio_until_last() {
        let harness = spawn_pacer();
        harness.turn.first_audio.store(false, Ordering::Release);
        harness.turn.llm_finished.store(true, Ordering::Release);
        harness.turn.request_abort();

        harness
            .audio_tx
            .send(AudioBatch::new(
                SentenceType::Middle,
                frames(3),
                Some("不该被听到。".to_string()),
            ))
            .await
            .unwrap();
        harness
            .audio_tx
            .send(AudioBatch::terminal(None))
            .await
            .unwrap();

        drain_until(&harness.sink, |sent| {
            sent.iter().any(|s| matches!(s, Sent::Text(v) if v["state"] == "stop"))
        })
        .await;

        let sent = harness.sink.sent.lock();
        // The middle batch vanished: no audio frames, no llm hint for it.
        assert!(!sent.iter().any(|s| matches!(s, Sent::Audio(_))));
        assert!(!sent
            .iter()
            .any(|s| matches!(s, Sent::Text(v) if v["type"] == "llm")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_after_chat_closes_peer() {
        let harness = spawn_pacer();
        harness.turn.first_audio.store(false, Ordering::Release);
        harness.turn.llm_finished.store(true, Ordering::Release);
        harness.turn.close_after_chat.store(true, Ordering::Release);

        harness
            .audio_tx
            .send(AudioBatch::terminal(None))
            .await
            .unwrap();

        drain_until(&harness.sink, |sent| sent.contains(&Sent::Closed)).await;
    }
}
