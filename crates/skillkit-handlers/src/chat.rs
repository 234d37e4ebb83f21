//! General chat used when no skill matches a query.

use skillkit_config::SkillkitConfig;
use skillkit_core::{Message, Result};
use skillkit_llm::{LlmProvider, LlmRequest};
use skillkit_skills::{SkillRegistry, TextStream};
use std::sync::Arc;
use tracing::debug;

use crate::bridge;

pub struct FallbackChat {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl FallbackChat {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 4096,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &SkillkitConfig) -> Self {
        Self {
            temperature: config.llm.temperature,
            top_p: config.llm.top_p,
            max_tokens: config.llm.max_tokens,
            ..Self::new(provider, config.llm.model.clone())
        }
    }

    fn request(&self, registry: &SkillRegistry, groups: &[String], history: &[Message], query: &str) -> LlmRequest {
        let mut messages = history.to_vec();
        messages.push(Message::user(query));
        LlmRequest {
            model: self.model.clone(),
            messages,
            system: Some(registry.system_prompt(None, groups)),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: Some(self.top_p),
            stream: false,
        }
    }

    /// Answer `query` after `history`, with the skills block in the system
    /// prompt.
    pub async fn respond(
        &self,
        registry: &SkillRegistry,
        groups: &[String],
        history: &[Message],
        query: &str,
    ) -> Result<String> {
        let request = self.request(registry, groups, history, query);
        debug!(model = %self.model, turns = request.messages.len(), "fallback chat");
        Ok(self.provider.complete(&request).await?.into_text())
    }

    pub async fn respond_stream(
        &self,
        registry: &SkillRegistry,
        groups: &[String],
        history: &[Message],
        query: &str,
    ) -> Result<TextStream> {
        let request = LlmRequest {
            stream: true,
            ..self.request(registry, groups, history, query)
        };
        debug!(model = %self.model, turns = request.messages.len(), "fallback chat (streaming)");
        let rx = self.provider.stream(&request).await?;
        Ok(bridge::text_stream(rx))
    }
}
