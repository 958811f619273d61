//! Audio file decoding to the connection wire format
//!
//! Synthesized files (wav/mp3/ogg containers) are decoded once, downmixed to
//! mono, and turned into either raw PCM chunks at the provider-native rate
//! or Opus packets at 60 ms cadence. Files carrying pre-encoded Opus frames
//! (`.p3`) bypass the codec entirely and ship their frames as-is.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use audiopus::coder::Encoder;
use audiopus::{Application, Channels, SampleRate};
use bytes::Bytes;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use voice_dialog_core::{AudioFormat, FRAME_DURATION_MS};

use crate::PipelineError;

/// Rate Opus frames are encoded at
pub const OPUS_SAMPLE_RATE: u32 = 16_000;

/// Extension of the framed pre-encoded Opus container
pub const FRAMED_OPUS_EXTENSION: &str = "p3";

/// Samples per 60 ms Opus frame at [`OPUS_SAMPLE_RATE`]
const SAMPLES_PER_OPUS_FRAME: usize =
    (OPUS_SAMPLE_RATE as usize / 1000) * FRAME_DURATION_MS as usize;

/// Upper bound for one encoded Opus packet
const MAX_OPUS_PACKET: usize = 4000;

/// Result of decoding one audio file
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub frames: Vec<Bytes>,
    pub duration: Duration,
}

/// Decode an audio file into wire frames for the given format
pub fn decode_audio(path: &Path, format: AudioFormat) -> Result<DecodedAudio, PipelineError> {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(FRAMED_OPUS_EXTENSION))
    {
        return read_framed_opus(path);
    }

    let (samples, sample_rate) = decode_file_to_mono(path)?;
    if samples.is_empty() {
        return Err(PipelineError::Decode(format!(
            "no audio data in {}",
            path.display()
        )));
    }

    let duration = Duration::from_secs_f64(samples.len() as f64 / sample_rate as f64);
    let frames = match format {
        AudioFormat::Pcm => pcm_chunks(&samples, sample_rate),
        AudioFormat::Opus => {
            let samples = resample_mono(&samples, sample_rate, OPUS_SAMPLE_RATE)?;
            encode_opus_frames(&samples)?
        }
    };

    Ok(DecodedAudio { frames, duration })
}

/// Read a framed container of pre-encoded Opus packets
///
/// Frame layout: 1-byte type, 1-byte reserved, 2-byte big-endian payload
/// length, payload.
fn read_framed_opus(path: &Path) -> Result<DecodedAudio, PipelineError> {
    let data = std::fs::read(path)?;
    let mut frames = Vec::new();
    let mut cursor = 0usize;

    while cursor + 4 <= data.len() {
        let len = u16::from_be_bytes([data[cursor + 2], data[cursor + 3]]) as usize;
        cursor += 4;
        if cursor + len > data.len() {
            return Err(PipelineError::Decode(format!(
                "truncated frame in {}",
                path.display()
            )));
        }
        frames.push(Bytes::copy_from_slice(&data[cursor..cursor + len]));
        cursor += len;
    }

    let duration = Duration::from_millis(frames.len() as u64 * FRAME_DURATION_MS);
    Ok(DecodedAudio { frames, duration })
}

/// Decode any supported container to mono f32 samples
fn decode_file_to_mono(path: &Path) -> Result<(Vec<f32>, u32), PipelineError> {
    let file = File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PipelineError::Decode(format!("{}: {e}", path.display())))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::Decode(format!("no audio track in {}", path.display())))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PipelineError::Decode(e.to_string()))?;

    let mut samples = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(OPUS_SAMPLE_RATE);
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut channels = 1usize;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(PipelineError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_buf.is_none() {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count().max(1);
                    sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    for frame in buf.samples().chunks(channels) {
                        samples.push(frame.iter().sum::<f32>() / channels as f32);
                    }
                }
            }
            // Recoverable per-packet corruption; skip the packet.
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!(error = %e, "skipping undecodable packet");
            }
            Err(e) => return Err(PipelineError::Decode(e.to_string())),
        }
    }

    Ok((samples, sample_rate))
}

/// Chunk mono samples into 60 ms raw PCM (s16le) frames at the native rate
fn pcm_chunks(samples: &[f32], sample_rate: u32) -> Vec<Bytes> {
    let samples_per_chunk = ((sample_rate as usize / 1000) * FRAME_DURATION_MS as usize).max(1);
    samples
        .chunks(samples_per_chunk)
        .map(|chunk| {
            let mut bytes = Vec::with_capacity(chunk.len() * 2);
            for &sample in chunk {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            Bytes::from(bytes)
        })
        .collect()
}

/// Encode mono 16 kHz samples into 60 ms Opus packets
fn encode_opus_frames(samples: &[f32]) -> Result<Vec<Bytes>, PipelineError> {
    let mut encoder = Encoder::new(SampleRate::Hz16000, Channels::Mono, Application::Voip)
        .map_err(|e| PipelineError::Decode(format!("opus encoder: {e}")))?;

    let pcm: Vec<i16> = samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect();

    let mut frames = Vec::with_capacity(pcm.len() / SAMPLES_PER_OPUS_FRAME + 1);
    let mut packet = vec![0u8; MAX_OPUS_PACKET];
    for chunk in pcm.chunks(SAMPLES_PER_OPUS_FRAME) {
        let written = if chunk.len() == SAMPLES_PER_OPUS_FRAME {
            encoder.encode(chunk, &mut packet)
        } else {
            // Zero-pad the trailing partial frame to a full 60 ms.
            let mut padded = chunk.to_vec();
            padded.resize(SAMPLES_PER_OPUS_FRAME, 0);
            encoder.encode(&padded, &mut packet)
        }
        .map_err(|e| PipelineError::Decode(format!("opus encode: {e}")))?;
        frames.push(Bytes::copy_from_slice(&packet[..written]));
    }

    Ok(frames)
}

/// Resample mono audio between rates
fn resample_mono(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, PipelineError> {
    if from == to {
        return Ok(samples.to_vec());
    }

    const CHUNK: usize = 1024;
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(to as f64 / from as f64, 2.0, params, CHUNK, 1)
        .map_err(|e| PipelineError::Decode(format!("resampler: {e}")))?;

    let mut output =
        Vec::with_capacity((samples.len() as u64 * to as u64 / from as u64) as usize + CHUNK);
    let mut chunks = samples.chunks_exact(CHUNK);
    for chunk in &mut chunks {
        let processed = resampler
            .process(&[chunk.to_vec()], None)
            .map_err(|e| PipelineError::Decode(format!("resample: {e}")))?;
        output.extend_from_slice(&processed[0]);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let processed = resampler
            .process_partial(Some(&[rest.to_vec()]), None)
            .map_err(|e| PipelineError::Decode(format!("resample: {e}")))?;
        output.extend_from_slice(&processed[0]);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// 16 kHz mono sine test tone
    fn write_test_wav(path: &Path, rate: u32, millis: u64) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let total = (rate as u64 * millis / 1000) as usize;
        for n in 0..total {
            let t = n as f32 / rate as f32;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
            writer.write_sample((sample * 0.5 * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_wav_to_pcm_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 16_000, 300);

        let decoded = decode_audio(&path, AudioFormat::Pcm).unwrap();
        // 300 ms at 60 ms per chunk
        assert_eq!(decoded.frames.len(), 5);
        // 960 samples * 2 bytes
        assert_eq!(decoded.frames[0].len(), 1920);
        assert!((decoded.duration.as_millis() as i64 - 300).abs() <= 1);
    }

    #[test]
    fn test_decode_wav_to_opus_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 16_000, 300);

        let decoded = decode_audio(&path, AudioFormat::Opus).unwrap();
        assert_eq!(decoded.frames.len(), 5);
        for frame in &decoded.frames {
            assert!(!frame.is_empty());
            assert!(frame.len() <= MAX_OPUS_PACKET);
        }
    }

    #[test]
    fn test_decode_resamples_foreign_rates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone44k.wav");
        write_test_wav(&path, 44_100, 300);

        let decoded = decode_audio(&path, AudioFormat::Opus).unwrap();
        // Duration survives the resample within one frame of tolerance.
        assert!((4..=6).contains(&decoded.frames.len()));
    }

    #[test]
    fn test_framed_opus_container_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify.p3");

        let mut file = std::fs::File::create(&path).unwrap();
        for payload in [&b"abc"[..], &b"defgh"[..]] {
            file.write_all(&[0, 0]).unwrap();
            file.write_all(&(payload.len() as u16).to_be_bytes()).unwrap();
            file.write_all(payload).unwrap();
        }
        drop(file);

        let decoded = decode_audio(&path, AudioFormat::Pcm).unwrap();
        assert_eq!(decoded.frames.len(), 2);
        assert_eq!(&decoded.frames[0][..], b"abc");
        assert_eq!(&decoded.frames[1][..], b"defgh");
        assert_eq!(decoded.duration, Duration::from_millis(120));
    }

    #[test]
    fn test_truncated_framed_container_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.p3");
        std::fs::write(&path, [0u8, 0, 0, 9, b'x']).unwrap();

        assert!(decode_audio(&path, AudioFormat::Pcm).is_err());
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"not a riff header").unwrap();

        assert!(decode_audio(&path, AudioFormat::Pcm).is_err());
    }
}
