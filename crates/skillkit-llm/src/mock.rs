//! Scripted provider for tests: replies are taken from a queue in order and
//! every request is recorded for later assertions. No network access.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::provider::*;
use skillkit_core::{Message, Result, SkillkitError};

/// Reply used once the script runs dry.
const EXHAUSTED: &str = "(mock: no more queued responses)";

/// One scripted reply.
#[derive(Debug, Clone, Default)]
pub struct MockResponse {
    pub text: String,
    /// Failure reported instead of the text by `complete`, and after the
    /// text by `stream`.
    pub error: Option<String>,
    pub stop_reason: StopReason,
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn error(msg: &str) -> Self {
        Self {
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }

    /// Streams `text`, then fails with `msg`.
    pub fn partial(text: &str, msg: &str) -> Self {
        Self {
            text: text.to_string(),
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }
}

/// ```
/// use skillkit_llm::MockProvider;
/// let provider = MockProvider::new("test").with_response("{\"summary\": \"Lunch\"}");
/// ```
pub struct MockProvider {
    name: String,
    script: Mutex<VecDeque<MockResponse>>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Rough token count: whitespace-separated words.
fn words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(self, text: &str) -> Self {
        self.with_mock_response(MockResponse::text(text))
    }

    pub fn with_error(self, error: &str) -> Self {
        self.with_mock_response(MockResponse::error(error))
    }

    pub fn with_mock_response(self, resp: MockResponse) -> Self {
        lock(&self.script).push_back(resp);
        self
    }

    /// Shared handle to the requests received so far. Stays valid after the
    /// provider is moved into an `Arc<dyn LlmProvider>`.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<LlmRequest>>> {
        Arc::clone(&self.requests)
    }

    /// Record `request` and take the next scripted reply.
    fn take(&self, request: &LlmRequest) -> (MockResponse, Usage) {
        lock(&self.requests).push(request.clone());
        let reply = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| MockResponse::text(EXHAUSTED));
        let prompt: u32 = request.messages.iter().map(|m| words(&m.content)).sum::<u32>()
            + request.system.as_deref().map_or(0, words);
        let usage = Usage {
            input_tokens: prompt,
            output_tokens: words(&reply.text),
        };
        (reply, usage)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let (reply, usage) = self.take(request);
        match reply.error {
            Some(error) => Err(SkillkitError::LlmProvider(error)),
            None => Ok(LlmResponse {
                message: Message::assistant(reply.text),
                usage,
                stop_reason: reply.stop_reason,
            }),
        }
    }

    async fn stream(&self, request: &LlmRequest) -> Result<mpsc::Receiver<StreamChunk>> {
        let (reply, usage) = self.take(request);
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            // Word-sized deltas that concatenate back to the exact text.
            for piece in reply.text.split_inclusive(char::is_whitespace) {
                if tx.send(StreamChunk::TextDelta(piece.to_string())).await.is_err() {
                    return;
                }
            }
            let tail = match reply.error {
                Some(error) => vec![StreamChunk::Error(error)],
                None => vec![StreamChunk::Usage(usage), StreamChunk::Done(reply.stop_reason)],
            };
            for chunk in tail {
                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
