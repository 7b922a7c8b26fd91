//! Recognition state machine - owns the speech display state, transitions on
//! adapter events, and decides when a result triggers a submission.
//!
//! All mutation goes through the named transitions (`toggle_start_stop`,
//! `on_event`); callers act on the returned effects instead of reaching into
//! the state. One finalized utterance ends the listening session.

use crate::speech::{ResultBatch, SpeechError, SpeechEvent};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Setup,
    Listening,
    Processing,
    Blocked,
    Denied,
    NoMic,
    NoSpeech,
    Unsupported,
}

impl Status {
    /// Error statuses carry retry guidance and survive session teardown
    /// until the user toggles again.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Status::Blocked | Status::Denied | Status::NoMic | Status::NoSpeech
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Setup => write!(f, "Setup"),
            Status::Listening => write!(f, "Listening"),
            Status::Processing => write!(f, "Processing"),
            Status::Blocked => write!(f, "Blocked"),
            Status::Denied => write!(f, "Denied"),
            Status::NoMic => write!(f, "NoMic"),
            Status::NoSpeech => write!(f, "NoSpeech"),
            Status::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// Display state owned exclusively by the state machine.
#[derive(Debug, Clone)]
pub struct SpeechState {
    pub status: Status,
    pub current_text: String,
    /// Live preview taken from the first entry of the latest batch,
    /// independent of the per-entry update loop.
    pub interim: String,
    pub confidence: f32,
    pub is_final: bool,
    pub recognizing: bool,
}

impl SpeechState {
    fn new(status: Status) -> Self {
        Self {
            status,
            current_text: String::new(),
            interim: String::new(),
            confidence: 0.0,
            is_final: false,
            recognizing: false,
        }
    }
}

/// What the event loop should do next. The state machine never performs I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start the adapter session
    Start,
    /// Stop the adapter session
    Stop,
    /// Hand text to the submission gate
    Submit { text: String, is_final: bool },
}

pub struct Recognizer {
    state: SpeechState,
}

impl Recognizer {
    pub fn new(supported: bool) -> Self {
        let status = if supported {
            Status::Setup
        } else {
            Status::Unsupported
        };
        Self {
            state: SpeechState::new(status),
        }
    }

    pub fn state(&self) -> &SpeechState {
        &self.state
    }

    /// The sole external command. Listening -> stop and reset; otherwise
    /// start a session and wait for the adapter's `Started`. Terminal no-op
    /// when the capability is unsupported.
    pub fn toggle_start_stop(&mut self) -> Vec<Effect> {
        if self.state.status == Status::Unsupported {
            return Vec::new();
        }
        if self.state.recognizing {
            self.reset();
            vec![Effect::Stop]
        } else {
            self.state.recognizing = true;
            self.state.status = Status::Processing;
            self.state.interim.clear();
            self.state.is_final = false;
            vec![Effect::Start]
        }
    }

    pub fn on_event(&mut self, event: SpeechEvent) -> Vec<Effect> {
        if self.state.status == Status::Unsupported {
            return Vec::new();
        }
        match event {
            SpeechEvent::Started => {
                self.state.status = Status::Listening;
                Vec::new()
            }
            SpeechEvent::Result(batch) => self.on_result(batch),
            SpeechEvent::Error(err) => {
                self.on_error(err);
                Vec::new()
            }
            SpeechEvent::Ended => {
                self.on_end();
                Vec::new()
            }
        }
    }

    /// Process a result batch in order. Each entry updates the display
    /// state; a final entry submits and stops the session. Once a final
    /// entry has landed, trailing interim entries no longer touch the
    /// display - final is terminal for the utterance.
    fn on_result(&mut self, batch: ResultBatch) -> Vec<Effect> {
        self.state.status = Status::Listening;

        if let Some(first) = batch.entries.first() {
            self.state.interim = first.transcript.clone();
        }

        let mut effects = Vec::new();
        for entry in batch.entries {
            if self.state.is_final && !entry.is_final {
                continue;
            }
            self.state.current_text = entry.transcript;
            self.state.confidence = entry.confidence;
            self.state.is_final = entry.is_final;

            if entry.is_final {
                effects.push(Effect::Submit {
                    text: self.state.current_text.clone(),
                    is_final: true,
                });
                if self.state.recognizing {
                    effects.extend(self.toggle_start_stop());
                }
            }
        }
        effects
    }

    fn on_error(&mut self, err: SpeechError) {
        match err {
            SpeechError::NotAllowed => self.state.status = Status::Blocked,
            SpeechError::NoSpeech => self.state.status = Status::NoSpeech,
            SpeechError::ServiceNotAllowed => self.state.status = Status::Denied,
            SpeechError::NoMic => self.state.status = Status::NoMic,
            SpeechError::Unknown(code) => {
                tracing::warn!(code = %code, "unhandled speech error");
            }
        }
    }

    /// Session fully torn down: re-arm the toggle. Error statuses stay on
    /// screen so the retry guidance survives the teardown; everything else
    /// returns to setup.
    fn on_end(&mut self) {
        self.state.recognizing = false;
        self.state.interim.clear();
        if !self.state.status.is_error() {
            self.state.status = Status::Setup;
        }
    }

    fn reset(&mut self) {
        self.state.recognizing = false;
        self.state.status = Status::Setup;
        self.state.interim.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::ResultEntry;

    fn batch(result_index: usize, entries: &[(&str, bool)]) -> SpeechEvent {
        SpeechEvent::Result(ResultBatch {
            result_index,
            entries: entries
                .iter()
                .map(|(text, is_final)| ResultEntry {
                    transcript: text.to_string(),
                    confidence: 0.9,
                    is_final: *is_final,
                })
                .collect(),
        })
    }

    #[test]
    fn test_toggle_twice_returns_to_setup() {
        let mut rec = Recognizer::new(true);
        assert_eq!(rec.toggle_start_stop(), vec![Effect::Start]);
        assert!(rec.state().recognizing);
        assert_eq!(rec.state().status, Status::Processing);

        assert_eq!(rec.toggle_start_stop(), vec![Effect::Stop]);
        assert!(!rec.state().recognizing);
        assert_eq!(rec.state().status, Status::Setup);
    }

    #[test]
    fn test_unsupported_is_terminal() {
        let mut rec = Recognizer::new(false);
        assert_eq!(rec.state().status, Status::Unsupported);
        assert!(rec.toggle_start_stop().is_empty());
        assert!(rec.on_event(SpeechEvent::Ended).is_empty());
        assert_eq!(rec.state().status, Status::Unsupported);
    }

    #[test]
    fn test_started_moves_to_listening() {
        let mut rec = Recognizer::new(true);
        rec.toggle_start_stop();
        rec.on_event(SpeechEvent::Started);
        assert_eq!(rec.state().status, Status::Listening);
    }

    #[test]
    fn test_interim_updates_display_without_submit() {
        let mut rec = Recognizer::new(true);
        rec.toggle_start_stop();
        rec.on_event(SpeechEvent::Started);

        let effects = rec.on_event(batch(0, &[("hello", false)]));
        assert!(effects.is_empty());
        assert_eq!(rec.state().current_text, "hello");
        assert_eq!(rec.state().interim, "hello");
        assert!(!rec.state().is_final);
    }

    #[test]
    fn test_final_submits_and_stops() {
        let mut rec = Recognizer::new(true);
        rec.toggle_start_stop();
        rec.on_event(SpeechEvent::Started);
        rec.on_event(batch(0, &[("hello", false)]));

        let effects = rec.on_event(batch(0, &[("hello world", true)]));
        assert_eq!(
            effects,
            vec![
                Effect::Submit {
                    text: "hello world".to_string(),
                    is_final: true
                },
                Effect::Stop,
            ]
        );
        assert_eq!(rec.state().current_text, "hello world");
        assert_eq!(rec.state().status, Status::Setup);
        assert!(!rec.state().recognizing);
    }

    #[test]
    fn test_batch_entries_processed_in_order() {
        let mut rec = Recognizer::new(true);
        rec.toggle_start_stop();
        rec.on_event(SpeechEvent::Started);

        rec.on_event(batch(0, &[("turn", false), ("turn on", false)]));
        assert_eq!(rec.state().current_text, "turn on");
        // Preview holds the first entry of the batch
        assert_eq!(rec.state().interim, "turn");
    }

    #[test]
    fn test_final_is_terminal_within_batch() {
        let mut rec = Recognizer::new(true);
        rec.toggle_start_stop();
        rec.on_event(SpeechEvent::Started);

        rec.on_event(batch(0, &[("lights off", true), ("lights", false)]));
        assert_eq!(rec.state().current_text, "lights off");
        assert!(rec.state().is_final);
    }

    #[test]
    fn test_last_entry_wins_when_none_final() {
        let mut rec = Recognizer::new(true);
        rec.toggle_start_stop();
        rec.on_event(SpeechEvent::Started);

        rec.on_event(batch(0, &[("a", false)]));
        rec.on_event(batch(0, &[("ab", false)]));
        rec.on_event(batch(0, &[("abc", false)]));
        assert_eq!(rec.state().current_text, "abc");
    }

    #[test]
    fn test_error_mapping() {
        let cases = [
            (SpeechError::NotAllowed, Status::Blocked),
            (SpeechError::NoSpeech, Status::NoSpeech),
            (SpeechError::ServiceNotAllowed, Status::Denied),
            (SpeechError::NoMic, Status::NoMic),
        ];
        for (err, status) in cases {
            let mut rec = Recognizer::new(true);
            rec.toggle_start_stop();
            rec.on_event(SpeechEvent::Error(err));
            assert_eq!(rec.state().status, status);
        }
    }

    #[test]
    fn test_unknown_error_leaves_status() {
        let mut rec = Recognizer::new(true);
        rec.toggle_start_stop();
        rec.on_event(SpeechEvent::Started);
        rec.on_event(SpeechEvent::Error(SpeechError::Unknown("aborted".into())));
        assert_eq!(rec.state().status, Status::Listening);
    }

    #[test]
    fn test_end_resets_to_setup() {
        let mut rec = Recognizer::new(true);
        rec.toggle_start_stop();
        rec.on_event(SpeechEvent::Started);
        rec.on_event(SpeechEvent::Ended);
        assert_eq!(rec.state().status, Status::Setup);
        assert!(!rec.state().recognizing);
        // Toggle is re-armed
        assert_eq!(rec.toggle_start_stop(), vec![Effect::Start]);
    }

    #[test]
    fn test_end_preserves_error_status_for_retry() {
        let mut rec = Recognizer::new(true);
        rec.toggle_start_stop();
        rec.on_event(SpeechEvent::Error(SpeechError::NoSpeech));
        rec.on_event(SpeechEvent::Ended);
        assert_eq!(rec.state().status, Status::NoSpeech);
        // Retry clears it
        assert_eq!(rec.toggle_start_stop(), vec![Effect::Start]);
        assert_eq!(rec.state().status, Status::Processing);
    }

    #[test]
    fn test_new_session_clears_final_flag() {
        let mut rec = Recognizer::new(true);
        rec.toggle_start_stop();
        rec.on_event(SpeechEvent::Started);
        rec.on_event(batch(0, &[("done", true)]));
        rec.on_event(SpeechEvent::Ended);
        assert!(rec.state().is_final);

        rec.toggle_start_stop();
        assert!(!rec.state().is_final);
        rec.on_event(SpeechEvent::Started);
        let effects = rec.on_event(batch(0, &[("again", false)]));
        assert!(effects.is_empty());
        assert_eq!(rec.state().current_text, "again");
    }
}
