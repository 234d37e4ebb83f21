//! # skillkit-server
//!
//! HTTP API over a loaded skill registry:
//!
//! - `GET  /health`
//! - `GET  /api/v1/skills`, `GET /api/v1/skills/{name}`
//! - `GET  /api/v1/skills/{name}/references/{file}`
//! - `POST /api/v1/route`: which skill would handle a query
//! - `POST /api/v1/execute`: route (unless a skill is named) and run;
//!   artifacts come back base64-encoded
//! - `POST /api/v1/execute/stream`: same, as Server-Sent Events
//!
//! Every failure is a JSON `{ "error", "kind" }` body; the server keeps
//! serving after a skill fails.

pub mod error;

pub use error::ApiError;

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response, Sse, sse::Event as SseEvent},
    routing::{get, post},
};
use base64::Engine;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use skillkit_config::ServerConfig;
use skillkit_core::{Artifact, SkillkitError};
use skillkit_handlers::FallbackChat;
use skillkit_skills::{
    Executor, MatchResult, Router as SkillRouter, SkillRegistry, SkillScore, TextStream, TieBreak,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// Shared server state. The registry is read-only after startup.
pub struct AppState {
    pub registry: Arc<SkillRegistry>,
    pub tie_break: TieBreak,
    /// Answers queries no skill matches; without it they get a 404.
    pub fallback: Option<Arc<FallbackChat>>,
    pub started: Instant,
}

impl AppState {
    pub fn new(registry: Arc<SkillRegistry>) -> Self {
        Self {
            registry,
            tie_break: TieBreak::default(),
            fallback: None,
            started: Instant::now(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<FallbackChat>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    fn router(&self, groups: Option<&[String]>) -> SkillRouter {
        let router = SkillRouter::new(self.tie_break);
        match groups {
            Some(g) => router.with_groups(g.to_vec()),
            None => router,
        }
    }

    fn executor(&self, groups: Option<&[String]>) -> Executor {
        match groups {
            Some(g) => Executor::new().with_groups(g.to_vec()),
            None => Executor::new(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    skills: usize,
}

#[derive(Serialize)]
struct SkillSummary {
    name: String,
    description: String,
    version: String,
    tags: Vec<String>,
    triggers: Vec<String>,
    tools: Vec<String>,
    streaming: bool,
    has_handler: bool,
}

#[derive(Deserialize)]
struct RouteRequest {
    query: String,
    #[serde(default)]
    groups: Option<Vec<String>>,
}

#[derive(Serialize)]
struct RouteResponse {
    #[serde(flatten)]
    result: MatchResult,
    scores: Vec<SkillScore>,
}

#[derive(Deserialize)]
struct ExecuteRequest {
    query: String,
    /// Skip routing and run this skill.
    #[serde(default)]
    skill: Option<String>,
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default)]
    groups: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ArtifactBody {
    filename: String,
    media_type: String,
    size: usize,
    data_base64: String,
}

impl From<&Artifact> for ArtifactBody {
    fn from(a: &Artifact) -> Self {
        Self {
            filename: a.filename.clone(),
            media_type: a.media_type.clone(),
            size: a.len(),
            data_base64: base64::engine::general_purpose::STANDARD.encode(&a.data),
        }
    }
}

#[derive(Serialize)]
struct ExecuteResponse {
    request_id: Uuid,
    /// `None` when the fallback chat answered.
    skill: Option<String>,
    tool: Option<String>,
    score: usize,
    text: String,
    artifact: Option<ArtifactBody>,
    elapsed_ms: u64,
    bytes: usize,
}

/// Build the Axum router.
pub fn build_router(config: &ServerConfig, state: AppState) -> Router {
    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/api/v1/skills", get(list_skills_handler))
        .route("/api/v1/skills/{name}", get(skill_handler))
        .route(
            "/api/v1/skills/{name}/references/{file}",
            get(reference_handler),
        )
        .route("/api/v1/route", post(route_handler))
        .route("/api/v1/execute", post(execute_handler))
        .route("/api/v1/execute/stream", post(execute_stream_handler));

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        skills: state.registry.len(),
    })
}

async fn list_skills_handler(State(state): State<Arc<AppState>>) -> Json<Vec<SkillSummary>> {
    let skills = state
        .registry
        .entries()
        .map(|entry| {
            let d = &entry.descriptor;
            SkillSummary {
                name: d.name.clone(),
                description: d.description.clone(),
                version: d.version.clone(),
                tags: d.tags.clone(),
                triggers: d.triggers.clone(),
                tools: entry.tool_names(),
                streaming: entry.handler.as_ref().is_some_and(|h| h.tool().streaming),
                has_handler: entry.handler.is_some(),
            }
        })
        .collect();
    Json(skills)
}

async fn skill_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let entry = state
        .registry
        .entry(&name)
        .ok_or_else(|| SkillkitError::SkillNotFound(name.clone()))?;
    let d = &entry.descriptor;

    let mut body = serde_json::to_value(d)?;
    body["instructions"] = json!(d.instructions());
    body["resources"] = serde_json::to_value(d.list_resources()?)?;
    body["tools"] = json!(
        entry
            .handler
            .as_ref()
            .map(|h| vec![h.tool()])
            .unwrap_or_default()
    );
    body["missing_env"] = json!(d.missing_env());
    Ok(Json(body))
}

async fn reference_handler(
    State(state): State<Arc<AppState>>,
    Path((name, file)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let d = state
        .registry
        .get(&name)
        .ok_or_else(|| SkillkitError::SkillNotFound(name.clone()))?;
    let text = d.read_reference(&file)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    )
        .into_response())
}

async fn route_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RouteRequest>,
) -> Json<RouteResponse> {
    let router = state.router(req.groups.as_deref());
    Json(RouteResponse {
        result: router.match_query(&req.query, &state.registry),
        scores: router.score_all(&req.query, &state.registry),
    })
}

/// The skill to run: the named one, or the router's pick.
fn resolve(state: &AppState, req: &ExecuteRequest) -> Result<(Option<String>, usize), ApiError> {
    if req.query.trim().is_empty() {
        return Err(ApiError::bad_request("query cannot be empty"));
    }
    if let Some(skill) = &req.skill {
        return Ok((Some(skill.clone()), 0));
    }
    let m = state
        .router(req.groups.as_deref())
        .match_query(&req.query, &state.registry);
    Ok((m.skill, m.score))
}

async fn execute_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let (skill, score) = resolve(&state, &req)?;
    let groups = req.groups.as_deref();

    let Some(skill) = skill else {
        let chat = state
            .fallback
            .as_ref()
            .ok_or_else(|| ApiError::no_match(&req.query))?;
        let started = Instant::now();
        let text = chat
            .respond(&state.registry, groups.unwrap_or_default(), &[], &req.query)
            .await?;
        info!(%request_id, "answered without a skill");
        return Ok(Json(ExecuteResponse {
            request_id,
            skill: None,
            tool: None,
            score: 0,
            bytes: text.len(),
            text,
            artifact: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }));
    };

    info!(%request_id, skill = %skill, score, "executing via API");
    let result = state
        .executor(groups)
        .execute(&state.registry, &skill, &req.query, req.params)
        .await?;
    Ok(Json(ExecuteResponse {
        request_id,
        skill: Some(result.skill),
        tool: Some(result.tool),
        score,
        artifact: result.artifact.as_ref().map(ArtifactBody::from),
        text: result.text,
        elapsed_ms: result.elapsed.as_millis() as u64,
        bytes: result.bytes,
    }))
}

/// SSE: `chunk` events carrying `{ "text" }`, then one `done` event, or an
/// `error` event if the skill fails part-way.
async fn execute_stream_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let request_id = Uuid::new_v4();
    let (skill, score) = resolve(&state, &req)?;
    let groups = req.groups.as_deref();

    let (skill, tool, text): (Option<String>, Option<String>, TextStream) = match skill {
        Some(skill) => {
            let exec = state
                .executor(groups)
                .execute_stream(&state.registry, &skill, &req.query, req.params)
                .await?;
            (Some(exec.skill), Some(exec.tool), exec.stream)
        }
        None => {
            let chat = state
                .fallback
                .as_ref()
                .ok_or_else(|| ApiError::no_match(&req.query))?;
            let stream = chat
                .respond_stream(&state.registry, groups.unwrap_or_default(), &[], &req.query)
                .await?;
            (None, None, stream)
        }
    };
    info!(%request_id, skill = ?skill, score, "streaming via API");

    let stream = async_stream::stream! {
        let mut text = text;
        let mut chunks = 0usize;
        let mut failed = false;
        while let Some(item) = text.next_chunk().await {
            match item {
                Ok(chunk) => {
                    chunks += 1;
                    yield Ok(SseEvent::default().event("chunk").data(json!({ "text": chunk }).to_string()));
                }
                Err(e) => {
                    failed = true;
                    yield Ok(SseEvent::default()
                        .event("error")
                        .data(json!({ "error": e.to_string(), "kind": e.kind() }).to_string()));
                    break;
                }
            }
        }
        if !failed {
            let done = json!({
                "request_id": request_id,
                "skill": skill,
                "tool": tool,
                "score": score,
                "chunks": chunks,
            });
            yield Ok(SseEvent::default().event("done").data(done.to_string()));
        }
    };

    Ok(Sse::new(stream))
}

/// Start the HTTP server.
pub async fn start_server(config: ServerConfig, state: AppState) -> skillkit_core::Result<()> {
    let listen = config.listen.clone();
    let router = build_router(&config, state);

    info!(listen = %listen, cors = config.cors, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .map_err(|e| SkillkitError::Config(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, router).await?;

    Ok(())
}
