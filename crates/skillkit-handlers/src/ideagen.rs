//! `nvidia-ideagen`: streamed idea generation, brainstorming and expansion.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use skillkit_config::SkillkitConfig;
use skillkit_core::{Artifact, Result, SkillkitError, Tool};
use skillkit_llm::{LlmProvider, LlmRequest};
use skillkit_skills::{Invocation, SkillHandler, SkillOutput, TextStream};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bridge;
use crate::params::{extract_idea_params, safe_stem};

pub const TOOL_NAME: &str = "generate_ideas_stream";
pub const MAX_IDEAS: u8 = 10;

const TOP_P: f32 = 0.95;
const MAX_TOKENS: u32 = 4096;
const BRAINSTORM_TEMPERATURE: f32 = 0.8;
const EXPAND_TEMPERATURE: f32 = 0.5;

const GENERATE_SYSTEM: &str = "You are an expert idea generation assistant inspired by advanced brainstorming methodologies.
Your role is to generate creative, practical, and well-structured ideas.

Key principles:
- Be innovative yet feasible
- Provide clear explanations
- Consider multiple perspectives
- Include actionable details
- Structure ideas logically

Format your responses with clear numbering and organization.";

const BRAINSTORM_SYSTEM: &str = "You are a creative brainstorming assistant. Generate innovative,
practical, and well-explained concepts. Structure your response with clear numbering and
detailed explanations for each concept.";

/// Angle taken when expanding an idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionKind {
    Detailed,
    Technical,
    Creative,
    Business,
}

impl ExpansionKind {
    fn instruction(self) -> &'static str {
        match self {
            Self::Detailed => "Provide a comprehensive breakdown with implementation steps, requirements, and considerations.",
            Self::Technical => "Focus on technical architecture, technologies, and implementation details.",
            Self::Creative => "Explore creative variations, alternative approaches, and innovative extensions.",
            Self::Business => "Analyze business value, market potential, stakeholders, and ROI considerations.",
        }
    }
}

impl FromStr for ExpansionKind {
    type Err = SkillkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detailed" => Ok(Self::Detailed),
            "technical" => Ok(Self::Technical),
            "creative" => Ok(Self::Creative),
            "business" => Ok(Self::Business),
            _ => Err(SkillkitError::InvalidInput(format!(
                "invalid expansion_type '{s}'. Must be one of: detailed, technical, creative, business"
            ))),
        }
    }
}

/// A previously saved ideas document.
#[derive(Debug, Clone, Serialize)]
pub struct SavedIdeas {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Local>,
}

#[derive(Clone)]
pub struct IdeaGenSkill {
    provider: Arc<dyn LlmProvider>,
    model: String,
    ideas_dir: PathBuf,
    default_num_ideas: u8,
    creativity: f32,
}

impl IdeaGenSkill {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, ideas_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            model: model.into(),
            ideas_dir: ideas_dir.into(),
            default_num_ideas: 5,
            creativity: 0.7,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &SkillkitConfig) -> Self {
        Self {
            default_num_ideas: config.ideagen.default_num_ideas,
            creativity: config.ideagen.creativity,
            ..Self::new(provider, config.ideagen_model(), config.ideagen.ideas_dir.clone())
        }
    }

    pub fn ideas_dir(&self) -> &Path {
        &self.ideas_dir
    }

    async fn stream(&self, system: &str, prompt: String, temperature: f32) -> Result<TextStream> {
        let request = LlmRequest {
            stream: true,
            ..LlmRequest::single(&self.model, prompt)
                .with_system(system)
                .with_sampling(temperature, Some(TOP_P))
                .with_max_tokens(MAX_TOKENS)
        };
        let rx = self.provider.stream(&request).await?;
        Ok(bridge::text_stream(rx))
    }

    /// Stream `num_ideas` ideas on `topic`.
    pub async fn generate_ideas_stream(
        &self,
        topic: &str,
        num_ideas: u8,
        context: Option<&str>,
        creativity: f32,
    ) -> Result<TextStream> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SkillkitError::InvalidInput("topic cannot be empty".into()));
        }
        if !(1..=MAX_IDEAS).contains(&num_ideas) {
            return Err(SkillkitError::InvalidInput(format!(
                "number of ideas must be between 1 and {MAX_IDEAS}, got {num_ideas}"
            )));
        }

        let context = context
            .filter(|c| !c.trim().is_empty())
            .map(|c| format!("\n\nAdditional Context:\n{c}"))
            .unwrap_or_default();
        let prompt = format!(
            "Generate {num_ideas} innovative ideas for the following topic:

**Topic:** {topic}{context}

For each idea, provide:
1. **Title:** A catchy, descriptive name
2. **Description:** 2-3 sentence overview
3. **Key Features:** 3-5 main aspects or components
4. **Potential Impact:** Why this idea matters
5. **Next Steps:** Initial actions to explore or implement

Format each idea clearly with numbering and use markdown formatting for readability."
        );
        info!(topic, num_ideas, creativity, "generating ideas");
        self.stream(GENERATE_SYSTEM, prompt, creativity).await
    }

    /// Non-streaming variant of [`IdeaGenSkill::generate_ideas_stream`].
    pub async fn generate_ideas(
        &self,
        topic: &str,
        num_ideas: u8,
        context: Option<&str>,
        creativity: f32,
    ) -> Result<String> {
        self.generate_ideas_stream(topic, num_ideas, context, creativity)
            .await?
            .collect_text()
            .await
    }

    /// Stream 3-5 concepts for `domain`, optionally narrowed by a focus
    /// area and constraints.
    pub async fn brainstorm(&self, domain: &str, focus: Option<&str>, constraints: &[String]) -> Result<TextStream> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(SkillkitError::InvalidInput("domain cannot be empty".into()));
        }
        let focus = focus
            .filter(|f| !f.trim().is_empty())
            .map(|f| format!("Focus Area: {f}\n"))
            .unwrap_or_default();
        let constraints = if constraints.is_empty() {
            String::new()
        } else {
            let items: Vec<String> = constraints.iter().map(|c| format!("- {c}")).collect();
            format!("\nConstraints/Requirements:\n{}\n", items.join("\n"))
        };
        let prompt = format!(
            "Generate creative concepts for the following:

Domain: {domain}
{focus}{constraints}
Provide 3-5 innovative concepts with:
1. Concept name
2. Brief description (2-3 sentences)
3. Key benefits or unique aspects
4. Implementation considerations

Format each concept clearly and make them actionable."
        );
        info!(domain, "brainstorming");
        self.stream(BRAINSTORM_SYSTEM, prompt, BRAINSTORM_TEMPERATURE).await
    }

    /// Stream an in-depth expansion of `idea`.
    pub async fn expand(&self, idea: &str, kind: ExpansionKind) -> Result<TextStream> {
        let idea = idea.trim();
        if idea.is_empty() {
            return Err(SkillkitError::InvalidInput("idea cannot be empty".into()));
        }
        let system = format!(
            "You are an expert idea expansion assistant. {}",
            kind.instruction()
        );
        let prompt = format!(
            "Expand the following idea in depth:

{idea}

Provide a thorough expansion covering:
- Core concept elaboration
- Key components and elements
- Practical considerations
- Potential challenges and solutions
- Next steps or action items

Make it comprehensive and actionable."
        );
        info!(?kind, "expanding idea");
        self.stream(&system, prompt, EXPAND_TEMPERATURE).await
    }

    /// Write `content` as a Markdown document into the ideas directory.
    pub fn save_ideas(&self, topic: &str, content: &str) -> Result<PathBuf> {
        let now = Local::now();
        let filename = format!(
            "ideas_{}_{}.md",
            safe_stem(topic),
            now.format("%Y%m%d_%H%M%S")
        );
        std::fs::create_dir_all(&self.ideas_dir)?;
        let path = self.ideas_dir.join(filename);
        std::fs::write(&path, render_markdown(topic, content, now))?;
        info!(path = %path.display(), "ideas saved");
        Ok(path)
    }

    /// Saved documents, newest first. A missing directory is empty.
    pub fn list_saved_ideas(&self) -> Result<Vec<SavedIdeas>> {
        if !self.ideas_dir.is_dir() {
            return Ok(vec![]);
        }
        let mut saved = Vec::new();
        for entry in std::fs::read_dir(&self.ideas_dir)? {
            let entry = entry?;
            let filename = entry.file_name().to_string_lossy().to_string();
            if !filename.starts_with("ideas_") || !filename.ends_with(".md") {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            saved.push(SavedIdeas {
                filename,
                path: entry.path(),
                size: meta.len(),
                modified: meta.modified().map(DateTime::<Local>::from).unwrap_or_else(|_| Local::now()),
            });
        }
        saved.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.filename.cmp(&a.filename)));
        Ok(saved)
    }
}

fn render_markdown(topic: &str, content: &str, now: DateTime<Local>) -> String {
    format!(
        "# Ideas: {topic}\n\n**Generated:** {}\n\n---\n\n{content}\n\n---\n\n*Generated via the nvidia-ideagen skill*\n",
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Which operation an invocation asks for.
#[derive(Debug, Clone, PartialEq)]
enum Request {
    Generate { topic: String, num_ideas: u8, context: Option<String>, creativity: f32 },
    Brainstorm { domain: String, focus: Option<String>, constraints: Vec<String> },
    Expand { idea: String, kind: ExpansionKind },
}

impl Request {
    fn subject(&self) -> &str {
        match self {
            Request::Generate { topic, .. } => topic,
            Request::Brainstorm { domain, .. } => domain,
            Request::Expand { idea, .. } => idea,
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => vec![],
    }
}

impl IdeaGenSkill {
    fn request(&self, inv: &Invocation) -> Result<Request> {
        let mode = inv.param_str("mode").unwrap_or_else(|| "generate".into());
        match mode.to_ascii_lowercase().as_str() {
            "generate" => {
                let extracted = extract_idea_params(&inv.query, self.default_num_ideas);
                let num_ideas = match inv.param_u64("num_ideas") {
                    Some(n) => u8::try_from(n).map_err(|_| {
                        SkillkitError::InvalidInput(format!(
                            "number of ideas must be between 1 and {MAX_IDEAS}, got {n}"
                        ))
                    })?,
                    None => extracted.num_ideas,
                };
                Ok(Request::Generate {
                    topic: inv.param_str("topic").unwrap_or(extracted.topic),
                    num_ideas,
                    context: inv.param_str("context"),
                    creativity: inv
                        .param_f64("creativity")
                        .map(|c| c as f32)
                        .unwrap_or(self.creativity),
                })
            }
            "brainstorm" => Ok(Request::Brainstorm {
                domain: inv
                    .param_str("domain")
                    .or_else(|| inv.param_str("topic"))
                    .unwrap_or_else(|| inv.query.clone()),
                focus: inv.param_str("focus"),
                constraints: string_list(inv.params.get("constraints")),
            }),
            "expand" => Ok(Request::Expand {
                idea: inv.param_str("idea").unwrap_or_else(|| inv.query.clone()),
                kind: inv
                    .param_str("expansion_type")
                    .as_deref()
                    .unwrap_or("detailed")
                    .parse()?,
            }),
            other => Err(SkillkitError::InvalidInput(format!(
                "unknown mode '{other}'. Must be one of: generate, brainstorm, expand"
            ))),
        }
    }

    async fn start(&self, request: &Request) -> Result<TextStream> {
        match request {
            Request::Generate { topic, num_ideas, context, creativity } => {
                self.generate_ideas_stream(topic, *num_ideas, context.as_deref(), *creativity)
                    .await
            }
            Request::Brainstorm { domain, focus, constraints } => {
                self.brainstorm(domain, focus.as_deref(), constraints).await
            }
            Request::Expand { idea, kind } => self.expand(idea, *kind).await,
        }
    }
}

fn wants_save(inv: &Invocation) -> bool {
    match inv.params.get("save") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

#[async_trait]
impl SkillHandler for IdeaGenSkill {
    fn tool(&self) -> Tool {
        Tool::new(TOOL_NAME, "Generate, brainstorm or expand ideas with streamed output")
            .with_parameters(serde_json::json!({
                "type": "object",
                "properties": {
                    "mode": { "type": "string", "enum": ["generate", "brainstorm", "expand"] },
                    "topic": { "type": "string" },
                    "num_ideas": { "type": "integer", "minimum": 1, "maximum": MAX_IDEAS },
                    "context": { "type": "string" },
                    "creativity": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                    "domain": { "type": "string" },
                    "focus": { "type": "string" },
                    "constraints": { "type": "array", "items": { "type": "string" } },
                    "idea": { "type": "string" },
                    "expansion_type": { "type": "string", "enum": ["detailed", "technical", "creative", "business"] },
                    "save": { "type": "boolean" }
                }
            }))
            .streaming()
    }

    async fn invoke(&self, inv: &Invocation) -> Result<SkillOutput> {
        let request = self.request(inv)?;
        let text = self.start(&request).await?.collect_text().await?;
        let mut output = SkillOutput::text(text);
        if wants_save(inv) {
            let path = self.save_ideas(request.subject(), &output.text)?;
            let data = std::fs::read(&path)?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            output = output.with_artifact(Artifact::new(filename, "text/markdown", data));
        }
        Ok(output)
    }

    async fn invoke_stream(&self, inv: &Invocation) -> Result<TextStream> {
        let request = self.request(inv)?;
        let mut upstream = self.start(&request).await?;
        if !wants_save(inv) {
            return Ok(upstream);
        }

        // Forward chunks and save the full text once the stream completes.
        let saver = self.clone();
        let subject = request.subject().to_string();
        let (tx, stream) = TextStream::channel(64);
        tokio::spawn(async move {
            let mut full = String::new();
            while let Some(chunk) = upstream.next_chunk().await {
                let failed = chunk.is_err();
                if let Ok(text) = &chunk {
                    full.push_str(text);
                }
                if tx.send(chunk).await.is_err() || failed {
                    return;
                }
            }
            if let Err(e) = saver.save_ideas(&subject, &full) {
                warn!(error = %e, "failed to save streamed ideas");
            }
        });
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};
    use skillkit_llm::MockProvider;

    fn skill(mock: MockProvider, dir: &Path) -> IdeaGenSkill {
        IdeaGenSkill::new(Arc::new(mock), "test-model", dir)
    }

    fn inv(query: &str, params: Value) -> Invocation {
        let params: Map<String, Value> = params.as_object().cloned().unwrap_or_default();
        Invocation::new("nvidia-ideagen", query).with_params(params)
    }

    #[test]
    fn test_expansion_kinds_parse() {
        assert_eq!("Business".parse::<ExpansionKind>().unwrap(), ExpansionKind::Business);
        assert_eq!("invalid_expansion_kind".parse::<ExpansionKind>().unwrap_err().kind(), "invalid_input");
    }

    #[test]
    fn test_request_from_query() {
        let s = skill(MockProvider::new("mock"), Path::new("/tmp"));
        let r = s.request(&inv("Give me 3 ideas for a coffee shop", json!({}))).unwrap();
        assert_eq!(
            r,
            Request::Generate {
                topic: "a coffee shop".into(),
                num_ideas: 3,
                context: None,
                creativity: 0.7
            }
        );
    }

    #[test]
    fn test_request_from_params() {
        let s = skill(MockProvider::new("mock"), Path::new("/tmp"));
        let r = s
            .request(&inv("", json!({"mode": "brainstorm", "domain": "retail", "constraints": "cheap, fast"})))
            .unwrap();
        assert_eq!(
            r,
            Request::Brainstorm {
                domain: "retail".into(),
                focus: None,
                constraints: vec!["cheap".into(), "fast".into()]
            }
        );
        assert!(s.request(&inv("x", json!({"mode": "dance"}))).is_err());
        assert!(s.request(&inv("x", json!({"mode": "expand", "expansion_type": "bogus"}))).is_err());
    }

    #[tokio::test]
    async fn test_rejects_empty_topic_and_bad_count() {
        let dir = tempfile::tempdir().unwrap();
        let s = skill(MockProvider::new("mock"), dir.path());
        assert_eq!(s.generate_ideas_stream("  ", 3, None, 0.7).await.unwrap_err().kind(), "invalid_input");
        assert!(s.generate_ideas_stream("coffee", 0, None, 0.7).await.is_err());
        assert!(s.generate_ideas_stream("coffee", 11, None, 0.7).await.is_err());
        assert!(s.expand("", ExpansionKind::Detailed).await.is_err());
        assert!(s.brainstorm("", None, &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_sampling_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockProvider::new("mock").with_response("a").with_response("b").with_response("c");
        let requests = mock.recorded_requests();
        let s = skill(mock, dir.path());

        s.generate_ideas("coffee", 2, Some("budget"), 0.9).await.unwrap();
        s.brainstorm("retail", Some("online"), &["cheap".into()]).await.unwrap().collect_text().await.unwrap();
        s.expand("kiosk", ExpansionKind::Technical).await.unwrap().collect_text().await.unwrap();

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.stream && r.top_p == Some(0.95) && r.max_tokens == 4096));
        assert_eq!(requests[0].temperature, 0.9);
        assert!(requests[0].messages[0].content.contains("Generate 2 innovative ideas"));
        assert!(requests[0].messages[0].content.contains("Additional Context:\nbudget"));
        assert_eq!(requests[1].temperature, 0.8);
        assert!(requests[1].messages[0].content.contains("Focus Area: online"));
        assert!(requests[1].messages[0].content.contains("- cheap"));
        assert_eq!(requests[2].temperature, 0.5);
        assert!(requests[2].system.as_deref().unwrap().contains("technical architecture"));
    }

    #[tokio::test]
    async fn test_cut_off_stream_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockProvider::new("mock")
            .with_mock_response(skillkit_llm::MockResponse::partial("1. Cold brew", "stream ended"))
            .with_response("1. Cold brew\n2. Oat latte");
        let s = skill(mock, dir.path());

        let cut = s
            .invoke_stream(&inv("3 ideas for coffee", json!({"save": true})))
            .await
            .unwrap();
        assert!(cut.collect_text().await.is_err());
        assert!(s.list_saved_ideas().unwrap().is_empty());

        let full = s
            .invoke_stream(&inv("3 ideas for coffee", json!({"save": true})))
            .await
            .unwrap();
        assert!(full.collect_text().await.unwrap().contains("Oat latte"));
        for _ in 0..50 {
            if !s.list_saved_ideas().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(s.list_saved_ideas().unwrap().len(), 1);
    }

    #[test]
    fn test_save_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let s = skill(MockProvider::new("mock"), &dir.path().join("ideas"));
        assert!(s.list_saved_ideas().unwrap().is_empty());

        let path = s.save_ideas("Coffee shop / menu", "1. Latte art").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ideas_Coffee_shop__menu_"));
        assert!(name.ends_with(".md"));
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# Ideas: Coffee shop / menu\n"));
        assert!(body.contains("1. Latte art"));

        std::fs::write(dir.path().join("ideas/notes.txt"), "ignored").unwrap();
        let listed = s.list_saved_ideas().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename, name);
    }
}
