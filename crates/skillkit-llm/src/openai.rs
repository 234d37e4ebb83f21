use async_trait::async_trait;
use skillkit_core::{Result, SkillkitError};
use tracing::{debug, info, warn};

use crate::provider::*;

pub const NVIDIA_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";

/// OpenAI-compatible chat-completions provider (NVIDIA NIM, OpenAI, vLLM, ...)
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    provider_name: String,
}

impl OpenAiProvider {
    /// Provider for the NVIDIA integrate API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: NVIDIA_BASE_URL.into(),
            provider_name: "nvidia".into(),
        }
    }

    /// Use a custom base URL (for OpenAI, a local vLLM, etc.)
    pub fn with_base_url(mut self, url: impl Into<String>, name: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self.provider_name = name.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn ensure_key(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(SkillkitError::MissingCredentials(format!(
                "{} API key not set (NVIDIA_API_KEY)",
                self.provider_name
            )));
        }
        Ok(())
    }

    fn post(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
    }
}

/// Build the JSON body of a chat-completions request.
pub fn build_body(request: &LlmRequest, stream: bool) -> serde_json::Value {
    let mut messages = Vec::new();

    if let Some(ref system) = request.system {
        messages.push(serde_json::json!({
            "role": "system",
            "content": system,
        }));
    }

    for msg in &request.messages {
        messages.push(serde_json::json!({
            "role": msg.role.as_str(),
            "content": &msg.content,
        }));
    }

    let mut body = serde_json::json!({
        "model": &request.model,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "messages": messages,
        "stream": stream,
    });
    if let Some(top_p) = request.top_p {
        body["top_p"] = serde_json::json!(top_p);
    }
    body
}

/// What one SSE `data:` line contributed to the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Text(String),
    Finish(Option<String>),
    Usage(Usage),
    Done,
}

/// Incremental decoder for an OpenAI-style SSE body. Bytes are pushed as
/// they arrive; complete lines are turned into [`SseEvent`]s.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Lines are decoded only once complete, so a multi-byte character
    /// split across network chunks survives intact.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line);
            events.extend(parse_sse_line(line.trim()));
        }
        events
    }
}

/// Chunks to emit when the body closes without `[DONE]`. Without a
/// `finish_reason` the answer was cut off, which is an error.
fn unterminated_end(finish_reason: Option<&str>, usage: Usage) -> Vec<StreamChunk> {
    match finish_reason {
        Some(fr) => vec![
            StreamChunk::Usage(usage),
            StreamChunk::Done(StopReason::from_finish_reason(Some(fr))),
        ],
        None => {
            warn!("SSE body ended before the model finished");
            vec![StreamChunk::Error(
                "stream ended before the model finished".into(),
            )]
        }
    }
}

fn parse_sse_line(line: &str) -> Vec<SseEvent> {
    if line.is_empty() || line.starts_with(':') {
        return vec![];
    }
    let Some(data) = line.strip_prefix("data:") else {
        return vec![];
    };
    let data = data.trim();
    if data == "[DONE]" {
        return vec![SseEvent::Done];
    }
    let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
        debug!(line = data, "skipping unparseable SSE line");
        return vec![];
    };

    let mut out = Vec::new();
    let choice = &event["choices"][0];
    if let Some(text) = choice["delta"]["content"].as_str()
        && !text.is_empty()
    {
        out.push(SseEvent::Text(text.to_string()));
    }
    if let Some(fr) = choice["finish_reason"].as_str() {
        out.push(SseEvent::Finish(Some(fr.to_string())));
    }
    if let Some(usage) = event.get("usage").filter(|u| u.is_object()) {
        out.push(SseEvent::Usage(Usage {
            input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
        }));
    }
    out
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.ensure_key()?;
        let body = build_body(request, false);
        debug!(provider = %self.provider_name, model = %request.model, "chat completion");

        let resp = self
            .post(&body)
            .send()
            .await
            .map_err(|e| SkillkitError::LlmProvider(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SkillkitError::LlmProvider(format!("HTTP {status}: {text}")));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SkillkitError::LlmProvider(e.to_string()))?;

        let choice = &data["choices"][0];
        let content = choice["message"]["content"].as_str().unwrap_or("");
        let usage_data = &data["usage"];

        Ok(LlmResponse {
            message: skillkit_core::Message::assistant(content),
            usage: Usage {
                input_tokens: usage_data["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                output_tokens: usage_data["completion_tokens"].as_u64().unwrap_or(0) as u32,
            },
            stop_reason: StopReason::from_finish_reason(choice["finish_reason"].as_str()),
        })
    }

    async fn stream(
        &self,
        request: &LlmRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamChunk>> {
        self.ensure_key()?;
        let (tx, rx) = tokio::sync::mpsc::channel(256);
        let builder = self.post(&build_body(request, true));
        debug!(provider = %self.provider_name, model = %request.model, "streaming chat completion");

        tokio::spawn(async move {
            let resp = match builder.send().await {
                Ok(resp) if resp.status().is_success() => resp,
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    let _ = tx.send(StreamChunk::Error(format!("HTTP {status}: {text}"))).await;
                    return;
                }
                Err(e) => {
                    let _ = tx.send(StreamChunk::Error(e.to_string())).await;
                    return;
                }
            };

            use futures::StreamExt;
            let mut stream = resp.bytes_stream();
            let mut decoder = SseDecoder::default();
            let mut finish_reason: Option<String> = None;
            let mut usage = Usage::default();

            while let Some(chunk_result) = stream.next().await {
                let bytes = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(StreamChunk::Error(e.to_string())).await;
                        return;
                    }
                };
                for event in decoder.push(&bytes) {
                    match event {
                        SseEvent::Text(text) => {
                            // Receiver dropped: the consumer cancelled.
                            if tx.send(StreamChunk::TextDelta(text)).await.is_err() {
                                return;
                            }
                        }
                        SseEvent::Finish(fr) => finish_reason = fr,
                        SseEvent::Usage(u) => usage = u,
                        SseEvent::Done => {
                            let _ = tx.send(StreamChunk::Usage(usage)).await;
                            let _ = tx
                                .send(StreamChunk::Done(StopReason::from_finish_reason(
                                    finish_reason.as_deref(),
                                )))
                                .await;
                            return;
                        }
                    }
                }
            }
            for chunk in unterminated_end(finish_reason.as_deref(), usage) {
                let _ = tx.send(chunk).await;
            }
        });

        Ok(rx)
    }

    async fn health_check(&self) -> Result<()> {
        info!(provider = self.provider_name, base_url = %self.base_url, "checking API health");
        self.ensure_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillkit_core::Message;

    #[test]
    fn test_build_body_includes_system_and_top_p() {
        let req = LlmRequest::single("meta/llama-3.1-405b-instruct", "Lunch tomorrow at noon")
            .with_system("Extract event details")
            .with_sampling(0.3, Some(0.95));
        let body = build_body(&req, false);
        assert_eq!(body["model"], "meta/llama-3.1-405b-instruct");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Lunch tomorrow at noon");
        assert_eq!(body["stream"], false);
        assert!((body["top_p"].as_f64().unwrap() - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_build_body_omits_top_p_when_unset() {
        let mut req = LlmRequest::single("m", "hi");
        req.messages.push(Message::assistant("hello"));
        let body = build_body(&req, true);
        assert!(body.get("top_p").is_none());
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_sse_decoder_handles_split_lines() {
        let mut dec = SseDecoder::default();
        let first = dec.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel");
        assert!(first.is_empty());
        let second = dec.push(b"lo\"}}]}\n\n: keep-alive\ndata: [DONE]\n");
        assert_eq!(second, vec![SseEvent::Text("Hello".into()), SseEvent::Done]);
    }

    #[test]
    fn test_sse_decoder_finish_and_usage() {
        let mut dec = SseDecoder::default();
        let events = dec.push(
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"length\"}],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":34}}\n",
        );
        assert_eq!(
            events,
            vec![
                SseEvent::Finish(Some("length".into())),
                SseEvent::Usage(Usage { input_tokens: 12, output_tokens: 34 }),
            ]
        );
        assert_eq!(StopReason::from_finish_reason(Some("length")), StopReason::MaxTokens);
    }

    #[test]
    fn test_sse_decoder_keeps_split_multibyte_chars() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut dec = SseDecoder::default();
        assert!(dec.push(&line[..split]).is_empty());
        assert_eq!(dec.push(&line[split..]), vec![SseEvent::Text("café".into())]);
    }

    #[test]
    fn test_unterminated_body_without_finish_is_error() {
        let chunks = unterminated_end(None, Usage::default());
        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], StreamChunk::Error(msg) if msg.contains("ended")));
    }

    #[test]
    fn test_unterminated_body_after_finish_is_done() {
        let chunks = unterminated_end(Some("stop"), Usage::default());
        assert!(matches!(chunks.last(), Some(StreamChunk::Done(StopReason::EndTurn))));
    }

    #[test]
    fn test_sse_decoder_skips_garbage() {
        let mut dec = SseDecoder::default();
        assert!(dec.push(b"event: ping\ndata: not-json\n").is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_reported() {
        let provider = OpenAiProvider::new("");
        let err = provider.complete(&LlmRequest::single("m", "hi")).await.unwrap_err();
        assert_eq!(err.kind(), "missing_credentials");
        assert!(provider.health_check().await.is_err());
    }

    #[test]
    fn test_custom_base_url_trims_slash() {
        let provider = OpenAiProvider::new("k").with_base_url("http://localhost:8000/v1/", "vllm");
        assert_eq!(provider.base_url(), "http://localhost:8000/v1");
        assert_eq!(provider.name(), "vllm");
    }
}
