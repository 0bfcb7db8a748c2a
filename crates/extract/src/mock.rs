use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::llm::Llm;

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail,
}

/// Deterministic [`Llm`] for tests. Each rule matches prompts containing a
/// substring; the first matching rule wins, otherwise the default response
/// is returned. Clones share rules, recorded prompts and the call counter.
///
/// ```
/// use extract::{Llm, MockLlm};
///
/// # tokio_test::block_on(async {
/// let llm = MockLlm::new("[]").on("knee", r#"[{"clause_id": "1", "text": "Knee surgery"}]"#);
/// assert!(llm.generate("about a knee").await.unwrap().contains("Knee surgery"));
/// assert_eq!(llm.generate("anything else").await.unwrap(), "[]");
/// assert_eq!(llm.call_count(), 2);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MockLlm {
    default_response: String,
    rules: Arc<Mutex<Vec<(String, Reply)>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
}

impl MockLlm {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            default_response: default_response.into(),
            rules: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Respond with `response` to prompts containing `needle`.
    pub fn on(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.push_rule(needle.into(), Reply::Text(response.into()));
        self
    }

    /// Fail every call whose prompt contains `needle`.
    pub fn fail_on(self, needle: impl Into<String>) -> Self {
        self.push_rule(needle.into(), Reply::Fail);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn push_rule(&self, needle: String, reply: Reply) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push((needle, reply));
        }
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

#[async_trait]
impl Llm for MockLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let reply = self.rules.lock().ok().and_then(|rules| {
            rules
                .iter()
                .find(|(needle, _)| prompt.contains(needle.as_str()))
                .map(|(_, reply)| reply.clone())
        });

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail) => anyhow::bail!("mock failure"),
            None => Ok(self.default_response.clone()),
        }
    }
}
