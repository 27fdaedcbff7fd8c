//! Provider that plays back queued answers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use provider_core::{LookupError, LookupProvider, LookupResponse};
use serde_json::Value;

/// Returns queued answers in order, then fails once the queue runs dry.
///
/// Also records how often it was called and with which queries.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<LookupResponse, LookupError>>>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful answer.
    pub fn then_ok(self, payload: Value) -> Self {
        self.then(Ok(LookupResponse::new(payload)))
    }

    /// Queue a failure.
    pub fn then_err(self, error: LookupError) -> Self {
        self.then(Err(error))
    }

    /// Queue any answer.
    pub fn then(self, answer: Result<LookupResponse, LookupError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(answer);
        }
        self
    }

    /// Number of lookups so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Queries seen, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LookupProvider for ScriptedProvider {
    async fn lookup(&self, query: &str) -> Result<LookupResponse, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }

        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| Err(LookupError::permanent("script exhausted")))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_plays_back_in_order() {
        let provider = ScriptedProvider::new("nik")
            .then_ok(json!({"n": 1}))
            .then_err(LookupError::Timeout);

        assert_eq!(provider.lookup("a").await.unwrap().payload["n"], 1);
        assert_eq!(provider.lookup("b").await.unwrap_err(), LookupError::Timeout);
        assert!(matches!(
            provider.lookup("c").await,
            Err(LookupError::Failed { .. })
        ));
        assert_eq!(provider.calls(), 3);
        assert_eq!(provider.queries(), vec!["a", "b", "c"]);
    }
}
