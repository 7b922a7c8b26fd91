//! Speech capture adapter - wraps the native recognition engine behind a
//! small event surface (start/result/error/end) and normalizes an absent
//! capability into an unsupported no-op instead of an error.

use crate::config::SpeechConfig;
use flume::Sender;
use std::fmt;

/// One recognized transcript entry within a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub transcript: String,
    pub confidence: f32,
    pub is_final: bool,
}

/// A batch of result entries for the current utterance.
///
/// `result_index` is the index of the first not-yet-finalized entry; batches
/// for a single utterance arrive with non-decreasing `result_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBatch {
    pub result_index: usize,
    pub entries: Vec<ResultEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    Started,
    Result(ResultBatch),
    Error(SpeechError),
    Ended,
}

/// Closed error taxonomy surfaced by the adapter.
///
/// `Unknown` preserves the backend's original error code so it can be logged
/// without widening the variant set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    NotAllowed,
    NoSpeech,
    ServiceNotAllowed,
    NoMic,
    Unknown(String),
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechError::NotAllowed => write!(f, "microphone permission blocked"),
            SpeechError::NoSpeech => write!(f, "no speech detected"),
            SpeechError::ServiceNotAllowed => write!(f, "speech service denied"),
            SpeechError::NoMic => write!(f, "no microphone found"),
            SpeechError::Unknown(code) => write!(f, "speech error: {}", code),
        }
    }
}

/// Handle to a running capture session. Dropping it detaches the session
/// thread; `stop` signals the thread to wind down and emit `Ended`.
pub struct SessionHandle {
    stop: Box<dyn FnOnce() + Send>,
}

impl SessionHandle {
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stop: Box::new(stop),
        }
    }

    pub fn stop(self) {
        (self.stop)();
    }
}

/// Wraps the platform capture engine. When the capability is unavailable
/// (feature compiled out, model missing, or no input device), `start` and
/// `stop` are no-ops and `is_supported` reports false so the state machine
/// can render the unsupported status up front.
pub struct SpeechAdapter {
    config: SpeechConfig,
    event_tx: Sender<SpeechEvent>,
    supported: bool,
    session: Option<SessionHandle>,
}

impl SpeechAdapter {
    pub fn new(config: &SpeechConfig, event_tx: Sender<SpeechEvent>) -> Self {
        let supported = probe(config);
        if !supported {
            tracing::debug!("speech capture unavailable, console is text-only");
        }
        Self {
            config: config.clone(),
            event_tx,
            supported,
            session: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Spawn a capture session. No-op when unsupported or already running.
    pub fn start(&mut self) {
        if !self.supported || self.session.is_some() {
            return;
        }
        self.session = Some(spawn_session(&self.config, self.event_tx.clone()));
    }

    /// Signal the running session to stop. The session emits `Ended` once it
    /// has fully torn down. Idempotent.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
    }
}

#[cfg(feature = "speech")]
fn probe(config: &SpeechConfig) -> bool {
    crate::native::probe(config)
}

#[cfg(feature = "speech")]
fn spawn_session(config: &SpeechConfig, events: Sender<SpeechEvent>) -> SessionHandle {
    crate::native::spawn_session(config, events)
}

#[cfg(not(feature = "speech"))]
fn probe(_config: &SpeechConfig) -> bool {
    false
}

#[cfg(not(feature = "speech"))]
fn spawn_session(_config: &SpeechConfig, _events: Sender<SpeechEvent>) -> SessionHandle {
    SessionHandle::new(|| {})
}
