use futures::FutureExt;
use serde_json::{Map, Value};
use skillkit_core::{Artifact, Result, SkillkitError};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::handler::{Invocation, SkillHandler};
use crate::registry::SkillRegistry;
use crate::stream::TextStream;

/// Outcome of one successful skill execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub skill: String,
    /// Name of the tool that was invoked.
    pub tool: String,
    pub text: String,
    pub artifact: Option<Artifact>,
    pub elapsed: Duration,
    /// Payload size: text bytes plus artifact bytes.
    pub bytes: usize,
}

/// A streaming execution: metadata known up front plus the text stream.
#[derive(Debug)]
pub struct StreamingExecution {
    pub skill: String,
    pub tool: String,
    pub stream: TextStream,
}

/// Runs a skill's entry point and turns every failure inside the skill
/// (error or panic) into a labelled [`SkillkitError::Execution`].
#[derive(Debug, Clone, Default)]
pub struct Executor {
    groups: Option<Vec<String>>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enforce skill access control for a caller in `groups`.
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = Some(groups);
        self
    }

    fn resolve(&self, registry: &SkillRegistry, skill: &str) -> Result<Arc<dyn SkillHandler>> {
        let entry = registry
            .entry(skill)
            .ok_or_else(|| SkillkitError::SkillNotFound(skill.to_string()))?;
        if let Some(groups) = &self.groups
            && !entry.descriptor.has_access(groups)
        {
            return Err(SkillkitError::AccessDenied(skill.to_string()));
        }
        entry
            .handler
            .clone()
            .ok_or_else(|| SkillkitError::HandlerNotFound(skill.to_string()))
    }

    /// Invoke `skill` with `query` and caller-supplied `params`.
    pub async fn execute(
        &self,
        registry: &SkillRegistry,
        skill: &str,
        query: &str,
        params: Map<String, Value>,
    ) -> Result<ExecutionResult> {
        let handler = self.resolve(registry, skill)?;
        let tool = tool_name(skill, handler.as_ref())?;
        let invocation = Invocation::new(skill, query).with_params(params);

        info!(skill, tool = %tool, "executing skill");
        let started = Instant::now();
        let outcome = AssertUnwindSafe(handler.invoke(&invocation))
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(failure(skill, &tool, e.to_string(), elapsed)),
            Err(panic) => return Err(failure(skill, &tool, panic_message(&*panic), elapsed)),
        };

        let bytes = output.text.len() + output.artifact.as_ref().map_or(0, Artifact::len);
        info!(
            skill,
            tool = %tool,
            elapsed_ms = elapsed.as_millis() as u64,
            bytes,
            artifact = output.artifact.as_ref().map(|a| a.filename.as_str()),
            "skill finished"
        );

        Ok(ExecutionResult {
            skill: skill.to_string(),
            tool,
            text: output.text,
            artifact: output.artifact,
            elapsed,
            bytes,
        })
    }

    /// Invoke `skill` in streaming mode. Failures while starting the stream
    /// are labelled like [`Executor::execute`]; errors after that arrive as
    /// items of the stream.
    pub async fn execute_stream(
        &self,
        registry: &SkillRegistry,
        skill: &str,
        query: &str,
        params: Map<String, Value>,
    ) -> Result<StreamingExecution> {
        let handler = self.resolve(registry, skill)?;
        let tool = tool_name(skill, handler.as_ref())?;
        let invocation = Invocation::new(skill, query).with_params(params);

        info!(skill, tool = %tool, "executing skill (streaming)");
        let started = Instant::now();
        let outcome = AssertUnwindSafe(handler.invoke_stream(&invocation))
            .catch_unwind()
            .await;

        let stream = match outcome {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(failure(skill, &tool, e.to_string(), started.elapsed())),
            Err(panic) => {
                return Err(failure(skill, &tool, panic_message(&*panic), started.elapsed()));
            }
        };

        Ok(StreamingExecution {
            skill: skill.to_string(),
            tool,
            stream,
        })
    }
}

/// Name of the handler's tool; a panicking `tool()` is labelled like any
/// other skill failure.
fn tool_name(skill: &str, handler: &dyn SkillHandler) -> Result<String> {
    std::panic::catch_unwind(AssertUnwindSafe(|| handler.tool().name))
        .map_err(|panic| failure(skill, "unknown", panic_message(&*panic), Duration::ZERO))
}

fn failure(skill: &str, tool: &str, reason: String, elapsed: Duration) -> SkillkitError {
    warn!(skill, tool, elapsed_ms = elapsed.as_millis() as u64, error = %reason, "skill failed");
    SkillkitError::Execution {
        skill: skill.to_string(),
        tool: tool.to_string(),
        reason,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SkillDescriptor;
    use crate::handler::SkillOutput;
    use async_trait::async_trait;
    use skillkit_core::Tool;
    use std::path::PathBuf;

    struct Echo;

    #[async_trait]
    impl SkillHandler for Echo {
        fn tool(&self) -> Tool {
            Tool::new("echo", "Echo the query")
        }
        async fn invoke(&self, inv: &Invocation) -> Result<SkillOutput> {
            let suffix = inv.param_str("suffix").unwrap_or_default();
            Ok(SkillOutput::text(format!("{}{}", inv.query, suffix))
                .with_artifact(Artifact::new("echo.txt", "text/plain", b"abc".to_vec())))
        }
    }

    struct Failing;

    #[async_trait]
    impl SkillHandler for Failing {
        fn tool(&self) -> Tool {
            Tool::new("fail", "Always fails")
        }
        async fn invoke(&self, _inv: &Invocation) -> Result<SkillOutput> {
            Err(SkillkitError::InvalidInput("topic cannot be empty".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl SkillHandler for Panicking {
        fn tool(&self) -> Tool {
            Tool::new("boom", "Panics")
        }
        async fn invoke(&self, _inv: &Invocation) -> Result<SkillOutput> {
            panic!("handler exploded")
        }
    }

    struct BadTool;

    #[async_trait]
    impl SkillHandler for BadTool {
        fn tool(&self) -> Tool {
            panic!("tool metadata missing")
        }
        async fn invoke(&self, _inv: &Invocation) -> Result<SkillOutput> {
            Ok(SkillOutput::text("unreachable"))
        }
    }

    fn descriptor(name: &str, front_extra: &str) -> SkillDescriptor {
        SkillDescriptor::parse(
            &format!("---\nname: {name}\ndescription: d\n{front_extra}---\n"),
            PathBuf::from(format!("/s/{name}/SKILL.md")),
            PathBuf::from(format!("/s/{name}")),
        )
        .unwrap()
    }

    fn registry() -> SkillRegistry {
        let mut reg = SkillRegistry::new();
        reg.register(descriptor("echo", ""), Some(Arc::new(Echo)));
        reg.register(descriptor("fail", ""), Some(Arc::new(Failing)));
        reg.register(descriptor("boom", ""), Some(Arc::new(Panicking)));
        reg.register(descriptor("bad-tool", ""), Some(Arc::new(BadTool)));
        reg.register(descriptor("listing-only", ""), None);
        reg.register(descriptor("staff", "user_groups: [staff]\n"), Some(Arc::new(Echo)));
        reg
    }

    #[tokio::test]
    async fn test_execute_returns_output_and_metadata() {
        let mut params = Map::new();
        params.insert("suffix".into(), Value::String("!".into()));
        let res = Executor::new()
            .execute(&registry(), "echo", "hello", params)
            .await
            .unwrap();
        assert_eq!(res.skill, "echo");
        assert_eq!(res.tool, "echo");
        assert_eq!(res.text, "hello!");
        assert_eq!(res.bytes, 6 + 3);
        assert_eq!(res.artifact.unwrap().filename, "echo.txt");
    }

    #[tokio::test]
    async fn test_unknown_skill_is_an_error() {
        let err = Executor::new()
            .execute(&registry(), "weather", "q", Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "skill_not_found");
    }

    #[tokio::test]
    async fn test_missing_handler_is_an_error() {
        let err = Executor::new()
            .execute(&registry(), "listing-only", "q", Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "handler_not_found");
    }

    #[tokio::test]
    async fn test_handler_error_is_labelled() {
        let err = Executor::new()
            .execute(&registry(), "fail", "q", Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "execution");
        let msg = err.to_string();
        assert!(msg.contains("fail (fail)"));
        assert!(msg.contains("topic cannot be empty"));
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let reg = registry();
        let exec = Executor::new();
        let err = exec.execute(&reg, "boom", "q", Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), "execution");
        assert!(err.to_string().contains("handler exploded"));

        // The executor keeps working afterwards.
        assert!(exec.execute(&reg, "echo", "still here", Map::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_panicking_tool_metadata_is_contained() {
        let reg = registry();
        let exec = Executor::new();
        let err = exec.execute(&reg, "bad-tool", "q", Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), "execution");
        assert!(err.to_string().contains("tool metadata missing"));
        let err = exec
            .execute_stream(&reg, "bad-tool", "q", Map::new())
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), "execution");
    }

    #[tokio::test]
    async fn test_access_denied_for_wrong_group() {
        let reg = registry();
        let guest = Executor::new().with_groups(vec!["guest".into()]);
        let err = guest.execute(&reg, "staff", "q", Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), "access_denied");
        let staff = Executor::new().with_groups(vec!["staff".into()]);
        assert!(staff.execute(&reg, "staff", "q", Map::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_default_streaming_yields_whole_text() {
        let exec = Executor::new()
            .execute_stream(&registry(), "echo", "streamed", Map::new())
            .await
            .unwrap();
        assert_eq!(exec.tool, "echo");
        assert_eq!(exec.stream.collect_text().await.unwrap(), "streamed");
    }

    #[tokio::test]
    async fn test_streaming_failure_is_labelled() {
        let err = Executor::new()
            .execute_stream(&registry(), "fail", "q", Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "execution");
    }
}
