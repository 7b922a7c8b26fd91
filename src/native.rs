//! Native speech capture: cpal microphone input, VAD-driven segmentation,
//! and Parakeet transcription, surfaced as adapter events.
//!
//! One session covers one listening window. Interim transcripts are emitted
//! while a speech segment is open; a final entry is emitted when trailing
//! silence closes it. The session never decides to stop on its own after a
//! final result - that is the state machine's call.

use crate::config::SpeechConfig;
use crate::speech::{ResultBatch, ResultEntry, SessionHandle, SpeechError, SpeechEvent};
use flume::{Receiver, Sender};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use transcribe_rs::{
    TranscriptionEngine,
    engines::parakeet::{ParakeetEngine, ParakeetModelParams},
};
use vad_rs::Vad;

pub const TARGET_RATE: usize = 16000;
const VAD_FRAME_SAMPLES: usize = 480;
const MIN_INTERIM_SAMPLES: usize = TARGET_RATE / 2;

const VAD_THRESHOLD: f32 = 0.3;
const VAD_THRESHOLD_END: f32 = 0.25;
const ENERGY_THRESHOLD: f32 = 0.01;
const ENERGY_THRESHOLD_END: f32 = 0.006;

/// Capability check performed once at adapter construction. The recognizer
/// model is required; the VAD model is not (energy fallback).
pub fn probe(config: &SpeechConfig) -> bool {
    use cpal::traits::HostTrait;

    if !Path::new(&config.recognizer_model).exists() {
        return false;
    }
    cpal::default_host().default_input_device().is_some()
}

pub fn spawn_session(config: &SpeechConfig, events: Sender<SpeechEvent>) -> SessionHandle {
    let running = Arc::new(AtomicBool::new(true));
    let running_session = Arc::clone(&running);
    let config = config.clone();

    std::thread::spawn(move || {
        if let Err(err) = run_session(&config, &events, &running_session) {
            let _ = events.send(SpeechEvent::Error(err));
        }
        let _ = events.send(SpeechEvent::Ended);
    });

    SessionHandle::new(move || running.store(false, Ordering::SeqCst))
}

fn run_session(
    config: &SpeechConfig,
    events: &Sender<SpeechEvent>,
    running: &Arc<AtomicBool>,
) -> Result<(), SpeechError> {
    let (audio_tx, audio_rx) = flume::bounded::<Vec<f32>>(100);

    // Keep the stream alive for the whole session; dropping it stops capture.
    let _stream = start_capture(audio_tx)?;

    let mut vad = VadEngine::load(&config.vad_model);
    let mut engine = ParakeetEngine::new();
    engine
        .load_model_with_params(Path::new(&config.recognizer_model), ParakeetModelParams::int8())
        .map_err(|e| SpeechError::Unknown(e.to_string()))?;

    let _ = events.send(SpeechEvent::Started);
    segment_loop(config, events, running, &audio_rx, &mut vad, &mut engine)
}

fn segment_loop(
    config: &SpeechConfig,
    events: &Sender<SpeechEvent>,
    running: &Arc<AtomicBool>,
    audio_rx: &Receiver<Vec<f32>>,
    vad: &mut VadEngine,
    engine: &mut ParakeetEngine,
) -> Result<(), SpeechError> {
    let silence_threshold_frames =
        (config.silence_ms as usize * TARGET_RATE) / (1000 * VAD_FRAME_SAMPLES);
    let interim_samples =
        ((config.interim_ms as usize * TARGET_RATE) / 1000).max(VAD_FRAME_SAMPLES);
    let max_samples = config.max_utterance_secs as usize * TARGET_RATE;
    let no_speech_timeout = Duration::from_secs(config.no_speech_timeout_secs);

    let started = Instant::now();
    let mut vad_buf: Vec<f32> = Vec::new();
    let mut speech_buf: Vec<f32> = Vec::new();
    let mut in_speech = false;
    let mut heard_speech = false;
    let mut silence_frames: usize = 0;
    let mut prob_sum = 0.0f32;
    let mut prob_frames: usize = 0;
    let mut last_interim_len: usize = 0;
    let mut finalized: usize = 0;

    while running.load(Ordering::SeqCst) {
        match audio_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(samples) => vad_buf.extend_from_slice(&samples),
            Err(flume::RecvTimeoutError::Timeout) => {
                if !heard_speech && started.elapsed() > no_speech_timeout {
                    return Err(SpeechError::NoSpeech);
                }
                continue;
            }
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }

        if !heard_speech && started.elapsed() > no_speech_timeout {
            return Err(SpeechError::NoSpeech);
        }

        while vad_buf.len() >= VAD_FRAME_SAMPLES {
            let frame: Vec<f32> = vad_buf.drain(..VAD_FRAME_SAMPLES).collect();
            let prob = vad.speech_prob(&frame);
            let is_speech = prob > vad.threshold(in_speech);

            if is_speech {
                in_speech = true;
                heard_speech = true;
                silence_frames = 0;
                prob_sum += prob;
                prob_frames += 1;
                speech_buf.extend_from_slice(&frame);

                if speech_buf.len() >= MIN_INTERIM_SAMPLES
                    && speech_buf.len() - last_interim_len >= interim_samples
                {
                    last_interim_len = speech_buf.len();
                    emit_transcript(events, engine, &speech_buf, finalized, false, prob_sum, prob_frames);
                }
            } else if in_speech {
                silence_frames += 1;
                speech_buf.extend_from_slice(&frame);

                if silence_frames >= silence_threshold_frames || speech_buf.len() >= max_samples {
                    emit_transcript(events, engine, &speech_buf, finalized, true, prob_sum, prob_frames);
                    finalized += 1;
                    speech_buf.clear();
                    last_interim_len = 0;
                    prob_sum = 0.0;
                    prob_frames = 0;
                    in_speech = false;
                    silence_frames = 0;
                    vad.reset();
                }
            }
        }
    }

    // Flush a segment cut off by stop, as a final entry
    if in_speech && speech_buf.len() >= MIN_INTERIM_SAMPLES {
        emit_transcript(events, engine, &speech_buf, finalized, true, prob_sum, prob_frames);
    }

    Ok(())
}

fn emit_transcript(
    events: &Sender<SpeechEvent>,
    engine: &mut ParakeetEngine,
    samples: &[f32],
    result_index: usize,
    is_final: bool,
    prob_sum: f32,
    prob_frames: usize,
) {
    let text = match engine.transcribe_samples(samples.to_vec(), None) {
        Ok(result) => result.text.trim().to_string(),
        Err(e) => {
            tracing::warn!(code = %e, "transcription failed");
            return;
        }
    };
    if text.is_empty() {
        return;
    }

    let confidence = if prob_frames > 0 {
        (prob_sum / prob_frames as f32).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let _ = events.send(SpeechEvent::Result(ResultBatch {
        result_index,
        entries: vec![ResultEntry {
            transcript: text,
            confidence,
            is_final,
        }],
    }));
}

fn start_capture(tx: Sender<Vec<f32>>) -> Result<cpal::Stream, SpeechError> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(SpeechError::NoMic)?;
    let supported = device
        .default_input_config()
        .map_err(|e| SpeechError::Unknown(e.to_string()))?;
    let sample_rate = u32::from(supported.sample_rate()) as usize;
    let channels = supported.channels() as usize;

    let stream = device
        .build_input_stream(
            &supported.config(),
            move |data: &[f32], _| {
                let mono: Vec<f32> = if channels == 1 {
                    data.to_vec()
                } else {
                    data.chunks(channels)
                        .map(|c| c.iter().sum::<f32>() / channels as f32)
                        .collect()
                };
                let _ = tx.send(resample(&mono, sample_rate, TARGET_RATE));
            },
            |e| tracing::warn!(code = %e, "mic stream error"),
            None,
        )
        .map_err(|e| SpeechError::Unknown(e.to_string()))?;
    stream.play().map_err(|e| SpeechError::Unknown(e.to_string()))?;

    Ok(stream)
}

fn resample(samples: &[f32], from_rate: usize, to_rate: usize) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    (0..new_len)
        .map(|i| {
            let src_idx = i as f64 / ratio;
            let idx = src_idx as usize;
            let frac = src_idx - idx as f64;
            if idx + 1 < samples.len() {
                samples[idx] * (1.0 - frac as f32) + samples[idx + 1] * frac as f32
            } else {
                samples.get(idx).copied().unwrap_or(0.0)
            }
        })
        .collect()
}

enum VadEngine {
    Silero(Vad),
    Energy,
}

impl VadEngine {
    /// Silero when the model file is present, energy-based otherwise.
    fn load(model_path: &str) -> Self {
        if Path::new(model_path).exists() {
            match Vad::new(model_path, TARGET_RATE) {
                Ok(vad) => return VadEngine::Silero(vad),
                Err(e) => tracing::warn!(code = %e, "silero init failed, using energy VAD"),
            }
        }
        VadEngine::Energy
    }

    /// Speech probability for one frame, also used as the confidence proxy.
    fn speech_prob(&mut self, frame: &[f32]) -> f32 {
        match self {
            VadEngine::Silero(vad) => vad.compute(frame).map(|r| r.prob).unwrap_or(0.0),
            VadEngine::Energy => {
                let rms = (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt();
                (rms / (ENERGY_THRESHOLD * 2.0)).min(1.0)
            }
        }
    }

    fn threshold(&self, currently_speaking: bool) -> f32 {
        match (self, currently_speaking) {
            (VadEngine::Silero(_), true) => VAD_THRESHOLD_END,
            (VadEngine::Silero(_), false) => VAD_THRESHOLD,
            (VadEngine::Energy, true) => ENERGY_THRESHOLD_END / (ENERGY_THRESHOLD * 2.0),
            (VadEngine::Energy, false) => 0.5,
        }
    }

    fn reset(&mut self) {
        if let VadEngine::Silero(vad) = self {
            vad.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        let out = resample(&samples, 32000, 16000);
        assert_eq!(out.len(), 500);
    }

    #[test]
    fn test_energy_prob_scales_with_level() {
        let mut vad = VadEngine::Energy;
        let quiet = vec![0.0001f32; VAD_FRAME_SAMPLES];
        let loud = vec![0.5f32; VAD_FRAME_SAMPLES];
        assert!(vad.speech_prob(&quiet) < vad.speech_prob(&loud));
        assert!(vad.speech_prob(&loud) <= 1.0);
    }
}
