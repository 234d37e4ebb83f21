use async_trait::async_trait;
use serde_json::{Map, Value};
use skillkit_core::{Artifact, Result, Tool};
use std::collections::HashMap;
use std::sync::Arc;

use crate::stream::TextStream;

/// One call into a skill: the user's query plus caller-supplied parameters.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub skill: String,
    pub query: String,
    pub params: Map<String, Value>,
}

impl Invocation {
    pub fn new(skill: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            skill: skill.into(),
            query: query.into(),
            params: Map::new(),
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// A string parameter. Numbers and booleans are rendered as text.
    pub fn param_str(&self, key: &str) -> Option<String> {
        match self.params.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// A numeric parameter; accepts JSON numbers and numeric strings.
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// What a skill hands back: display text, an optional file, or both.
#[derive(Debug, Clone, Default)]
pub struct SkillOutput {
    pub text: String,
    pub artifact: Option<Artifact>,
}

impl SkillOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = Some(artifact);
        self
    }
}

/// The entry point of a skill implementation.
#[async_trait]
pub trait SkillHandler: Send + Sync {
    /// The tool this handler exposes.
    fn tool(&self) -> Tool;

    /// Run the skill to completion.
    async fn invoke(&self, invocation: &Invocation) -> Result<SkillOutput>;

    /// Run the skill, yielding text incrementally. Handlers without native
    /// streaming emit their whole text output as one chunk.
    async fn invoke_stream(&self, invocation: &Invocation) -> Result<TextStream> {
        let output = self.invoke(invocation).await?;
        Ok(TextStream::once(output.text))
    }
}

/// Explicit skill name → handler table.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Arc<dyn SkillHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `skill`, replacing any earlier entry.
    pub fn register(&mut self, skill: impl Into<String>, handler: Arc<dyn SkillHandler>) {
        self.handlers.insert(skill.into(), handler);
    }

    pub fn with(mut self, skill: impl Into<String>, handler: Arc<dyn SkillHandler>) -> Self {
        self.register(skill, handler);
        self
    }

    pub fn get(&self, skill: &str) -> Option<Arc<dyn SkillHandler>> {
        self.handlers.get(skill).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerTable").field("skills", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_accessors_coerce() {
        let params = json!({ "num_ideas": "7", "creativity": 0.9, "topic": "drones", "flag": true });
        let inv = Invocation::new("nvidia-ideagen", "q")
            .with_params(params.as_object().unwrap().clone());
        assert_eq!(inv.param_u64("num_ideas"), Some(7));
        assert_eq!(inv.param_f64("creativity"), Some(0.9));
        assert_eq!(inv.param_str("topic").as_deref(), Some("drones"));
        assert_eq!(inv.param_str("flag").as_deref(), Some("true"));
        assert_eq!(inv.param_u64("topic"), None);
        assert_eq!(inv.param_str("missing"), None);
    }
}
