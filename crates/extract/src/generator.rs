use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use finsight_core::{GenerationError, TextGenerator};
use tokio::sync::Mutex;

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set reply (or a pre-set failure) and records every prompt it saw.
pub struct MockGenerator {
    reply: Result<String, String>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Every call fails with a transport error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().await.clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().await = Some(prompt.to_string());
        self.reply
            .clone()
            .map_err(GenerationError::Transport)
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
