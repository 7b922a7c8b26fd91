//! Parse result sink - applies responses to display state only when they
//! still correspond to the newest issued submission. Responses may complete
//! out of request order; a superseded token is discarded, never applied.

use crate::parser::ParseResponse;
use serde_json::Value;

#[derive(Debug, Default)]
pub struct ResultSink {
    newest: u64,
    pub results: Option<Value>,
    pub tree: Option<Value>,
    pub error: Option<String>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly issued submission. The displayed tree is cleared right
    /// away so a stale tree is never shown against fresher text.
    pub fn begin(&mut self, token: u64) {
        self.newest = token;
        self.tree = None;
        self.error = None;
    }

    /// Apply a completed response. Returns false (and changes nothing) when
    /// a later submission has superseded this token.
    pub fn apply(&mut self, token: u64, response: ParseResponse) -> bool {
        if token != self.newest {
            tracing::debug!(token, newest = self.newest, "discarding stale parse response");
            return false;
        }
        self.results = Some(response.data);
        self.tree = Some(response.tree);
        self.error = None;
        true
    }

    /// Record a failed submission under the same fencing rule.
    pub fn fail(&mut self, token: u64, message: String) -> bool {
        if token != self.newest {
            tracing::debug!(token, newest = self.newest, "discarding stale parse failure");
            return false;
        }
        self.error = Some(message);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(tag: &str) -> ParseResponse {
        serde_json::from_value(serde_json::json!({
            "data": tag,
            "tree": { "root": tag },
        }))
        .unwrap()
    }

    #[test]
    fn test_begin_clears_displayed_tree() {
        let mut sink = ResultSink::new();
        sink.begin(1);
        assert!(sink.apply(1, response("a")));
        assert!(sink.tree.is_some());

        sink.begin(2);
        assert!(sink.tree.is_none());
    }

    #[test]
    fn test_stale_response_discarded() {
        let mut sink = ResultSink::new();
        sink.begin(1);
        sink.begin(2);

        assert!(!sink.apply(1, response("old")));
        assert!(sink.tree.is_none());

        assert!(sink.apply(2, response("new")));
        assert_eq!(sink.tree.as_ref().unwrap()["root"], "new");
    }

    #[test]
    fn test_newest_applies_even_after_stale_arrival() {
        let mut sink = ResultSink::new();
        sink.begin(1);
        sink.begin(2);
        assert!(!sink.apply(1, response("old")));
        assert!(sink.apply(2, response("new")));
        assert_eq!(sink.results.as_ref().unwrap(), "new");
    }

    #[test]
    fn test_stale_failure_discarded() {
        let mut sink = ResultSink::new();
        sink.begin(1);
        sink.begin(2);
        assert!(!sink.fail(1, "timeout".into()));
        assert!(sink.error.is_none());

        assert!(sink.fail(2, "timeout".into()));
        assert_eq!(sink.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_success_clears_prior_error() {
        let mut sink = ResultSink::new();
        sink.begin(1);
        assert!(sink.fail(1, "boom".into()));
        sink.begin(2);
        assert!(sink.apply(2, response("ok")));
        assert!(sink.error.is_none());
    }
}
