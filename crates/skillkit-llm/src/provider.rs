use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skillkit_core::{Message, Result};

/// One chat-completions call.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// e.g. "meta/llama-3.1-405b-instruct"
    pub model: String,
    pub messages: Vec<Message>,
    /// Sent ahead of `messages` as a system turn.
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Nucleus sampling; omitted from the wire request when `None`.
    pub top_p: Option<f32>,
    pub stream: bool,
}

impl LlmRequest {
    /// A request carrying one user turn, with default sampling.
    pub fn single(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            system: None,
            max_tokens: 4096,
            temperature: 0.7,
            top_p: None,
            stream: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_sampling(mut self, temperature: f32, top_p: Option<f32>) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub message: Message,
    pub usage: Usage,
    pub stop_reason: StopReason,
}

impl LlmResponse {
    pub fn text(&self) -> &str {
        &self.message.content
    }

    pub fn into_text(self) -> String {
        self.message.content
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    EndTurn,
    MaxTokens,
    StopSequence,
    ContentFilter,
}

impl StopReason {
    /// Map an OpenAI-style `finish_reason`.
    pub fn from_finish_reason(reason: Option<&str>) -> Self {
        match reason {
            Some("length") => StopReason::MaxTokens,
            Some("content_filter") => StopReason::ContentFilter,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }
}

/// Items delivered by [`LlmProvider::stream`]. A stream ends after `Done`
/// or `Error`; `Usage`, when the backend reports it, comes before `Done`.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    TextDelta(String),
    Usage(Usage),
    Done(StopReason),
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// A chat-completion backend. Skills hold an `Arc<dyn LlmProvider>`.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short name used in logs and errors, e.g. "nvidia".
    fn name(&self) -> &str;

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Start a streamed completion. Dropping the receiver stops the
    /// producer at its next send.
    async fn stream(
        &self,
        request: &LlmRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamChunk>>;

    /// Fails when the provider cannot be used as configured (e.g. no API
    /// key). Makes no model call.
    async fn health_check(&self) -> Result<()>;
}
