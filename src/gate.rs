//! Submission gate - dedupes outgoing parse requests and stamps each
//! accepted one with a correlation token so late responses can be fenced.

use crate::parser::ParseRequest;

/// An accepted submission. The token pairs the eventual response with the
/// request that produced it; tokens are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub token: u64,
    pub request: ParseRequest,
}

pub struct SubmissionGate {
    incremental: bool,
    last_submitted: Option<String>,
    next_token: u64,
}

impl SubmissionGate {
    pub fn new(incremental: bool) -> Self {
        Self {
            incremental,
            last_submitted: None,
            next_token: 0,
        }
    }

    pub fn incremental(&self) -> bool {
        self.incremental
    }

    /// Flip incremental mode. Returns true when the remote cache should be
    /// cleared - exactly on the off-to-on transition, so stale server-side
    /// cache does not leak into the new session.
    pub fn set_incremental(&mut self, on: bool) -> bool {
        let was = self.incremental;
        self.incremental = on;
        on && !was
    }

    /// Accept or suppress a submission. Empty text and text identical to the
    /// previous accepted submission are suppressed; identity is tracked at
    /// accept time, not at completion, so overlapping interim events with
    /// the same content collapse to one request.
    pub fn submit(&mut self, text: &str, is_final: bool) -> Option<Submission> {
        if text.is_empty() {
            return None;
        }
        if self.last_submitted.as_deref() == Some(text) {
            return None;
        }
        self.last_submitted = Some(text.to_string());
        self.next_token += 1;
        Some(Submission {
            token: self.next_token,
            request: ParseRequest {
                text: text.to_string(),
                incremental: self.incremental,
                is_final,
            },
        })
    }

    /// Per-keystroke hook for typed input. In incremental mode a word
    /// boundary (trailing space) behaves like a speech interim result.
    pub fn keystroke(&mut self, text: &str) -> Option<Submission> {
        if self.incremental && !text.is_empty() && text.ends_with(' ') {
            self.submit(text, false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_suppressed() {
        let mut gate = SubmissionGate::new(false);
        assert!(gate.submit("", true).is_none());
    }

    #[test]
    fn test_duplicate_text_suppressed() {
        let mut gate = SubmissionGate::new(false);
        assert!(gate.submit("hello world", true).is_some());
        assert!(gate.submit("hello world", true).is_none());
        assert!(gate.submit("hello world", false).is_none());
    }

    #[test]
    fn test_changed_text_accepted() {
        let mut gate = SubmissionGate::new(false);
        assert!(gate.submit("hello", false).is_some());
        assert!(gate.submit("hello world", true).is_some());
    }

    #[test]
    fn test_tokens_strictly_increase() {
        let mut gate = SubmissionGate::new(false);
        let a = gate.submit("one", false).unwrap();
        let b = gate.submit("two", false).unwrap();
        assert!(b.token > a.token);
    }

    #[test]
    fn test_request_carries_incremental_flag() {
        let mut gate = SubmissionGate::new(true);
        let sub = gate.submit("lights on", true).unwrap();
        assert!(sub.request.incremental);
        assert!(sub.request.is_final);
        assert_eq!(sub.request.text, "lights on");
    }

    #[test]
    fn test_keystroke_word_boundary() {
        let mut gate = SubmissionGate::new(true);
        let sub = gate.keystroke("foo ").unwrap();
        assert_eq!(sub.request.text, "foo ");
        assert!(!sub.request.is_final);
    }

    #[test]
    fn test_keystroke_mid_word_suppressed() {
        let mut gate = SubmissionGate::new(true);
        assert!(gate.keystroke("foo b").is_none());
    }

    #[test]
    fn test_keystroke_ignored_without_incremental() {
        let mut gate = SubmissionGate::new(false);
        assert!(gate.keystroke("foo ").is_none());
    }

    #[test]
    fn test_keystroke_duplicate_suppressed() {
        let mut gate = SubmissionGate::new(true);
        assert!(gate.keystroke("foo ").is_some());
        // Backspace then retype the same boundary
        assert!(gate.keystroke("foo ").is_none());
    }

    #[test]
    fn test_set_incremental_clears_cache_on_rising_edge() {
        let mut gate = SubmissionGate::new(false);
        assert!(gate.set_incremental(true));
        assert!(!gate.set_incremental(true));
        assert!(!gate.set_incremental(false));
        assert!(gate.set_incremental(true));
    }
}
