use serde_json::{Map, Value, json};
use skillkit_config::SkillkitConfig;
use skillkit_handlers::{CALENDAR_SKILL, IDEAGEN_SKILL, builtin_handlers};
use skillkit_llm::{LlmProvider, MockProvider, MockResponse};
use skillkit_skills::{Executor, Router, SkillRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn bundled_skills() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../skills")
}

fn config(ideas_dir: &Path) -> SkillkitConfig {
    let mut config = SkillkitConfig::default();
    config.calendar.timezone = "America/New_York".into();
    config.ideagen.ideas_dir = ideas_dir.to_path_buf();
    config
}

fn registry(mock: MockProvider, config: &SkillkitConfig) -> SkillRegistry {
    let provider: Arc<dyn LlmProvider> = Arc::new(mock);
    let handlers = builtin_handlers(config, provider).unwrap();
    SkillRegistry::load(&[bundled_skills()], &handlers)
}

fn params(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_calendar_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let reply = "```json\n{\"summary\": \"Team Meeting - Q4 Planning\", \"start_date\": \"2025-03-14\", \"start_time\": \"14:00\", \"duration_hours\": 2.0, \"description\": \"Quarterly planning discussion\", \"reminder_hours\": 1}\n```";
    let mock = MockProvider::new("mock").with_response(reply);
    let requests = mock.recorded_requests();
    let cfg = config(dir.path());
    let reg = registry(mock, &cfg);

    let query = "Schedule a team meeting tomorrow at 2pm for 2 hours about Q4 planning";
    let m = Router::default().match_query(query, &reg);
    assert_eq!(m.skill.as_deref(), Some(CALENDAR_SKILL));

    let result = Executor::new()
        .execute(&reg, CALENDAR_SKILL, query, Map::new())
        .await
        .unwrap();
    assert_eq!(result.tool, "natural_language_to_ics");
    assert!(result.text.contains("Team Meeting - Q4 Planning"));

    let artifact = result.artifact.unwrap();
    assert_eq!(artifact.filename, "Team_Meeting__Q4_Planning_2025-03-14.ics");
    assert_eq!(artifact.media_type, "text/calendar");
    let ics = String::from_utf8(artifact.data.to_vec()).unwrap();
    assert!(ics.contains("DTSTART:20250314T180000Z\r\n"));
    assert!(ics.contains("DTEND:20250314T200000Z\r\n"));
    assert!(ics.contains("TRIGGER:-PT1H\r\n"));
    assert_eq!(result.bytes, result.text.len() + artifact.data.len());

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].system.as_deref().unwrap().contains("Timezone: America/New_York"));
    assert!((requests[0].temperature - 0.3).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_calendar_structured_params_skip_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new("mock");
    let requests = mock.recorded_requests();
    let reg = registry(mock, &config(dir.path()));

    let result = Executor::new()
        .execute(
            &reg,
            CALENDAR_SKILL,
            "dentist",
            params(json!({
                "summary": "Dentist",
                "start_date": "2025-07-01",
                "start_time": "10:30",
                "location": "Main St, Suite 4",
                "attendees": [{"email": "sam@example.com", "name": "Sam"}]
            })),
        )
        .await
        .unwrap();

    assert!(requests.lock().unwrap().is_empty());
    let ics = String::from_utf8(result.artifact.unwrap().data.to_vec()).unwrap();
    // 10:30 EDT
    assert!(ics.contains("DTSTART:20250701T143000Z"));
    assert!(ics.contains("LOCATION:Main St\\, Suite 4"));
    assert!(ics.contains("ATTENDEE;CN=Sam;ROLE=REQ-PARTICIPANT:mailto:sam@example.com"));
}

#[tokio::test]
async fn test_calendar_model_failures_are_labelled() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new("mock")
        .with_response("{\"summary\": \"No date\"}")
        .with_error("HTTP 401: unauthorized");
    let reg = registry(mock, &config(dir.path()));
    let exec = Executor::new();

    let err = exec
        .execute(&reg, CALENDAR_SKILL, "meeting sometime", Map::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "execution");
    assert!(err.to_string().contains("missing required field: start_date"));

    let err = exec
        .execute(&reg, CALENDAR_SKILL, "meeting sometime", Map::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_ideagen_streams_and_saves() {
    let dir = tempfile::tempdir().unwrap();
    let ideas_dir = dir.path().join("ideas");
    let text = "1. **Title:** Bean Lab\n2. **Title:** Cup Club\n";
    let mock = MockProvider::new("mock").with_response(text);
    let requests = mock.recorded_requests();
    let reg = registry(mock, &config(&ideas_dir));

    let query = "Give me 2 ideas for a sustainable coffee shop";
    let m = Router::default().match_query(query, &reg);
    assert_eq!(m.skill.as_deref(), Some(IDEAGEN_SKILL));

    let exec = Executor::new()
        .execute_stream(&reg, IDEAGEN_SKILL, query, params(json!({"save": true})))
        .await
        .unwrap();
    assert_eq!(exec.tool, "generate_ideas_stream");
    assert_eq!(exec.stream.collect_text().await.unwrap(), text);

    {
        let requests = requests.lock().unwrap();
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.contains("Generate 2 innovative ideas"));
        assert!(prompt.contains("**Topic:** a sustainable coffee shop"));
    }

    // The save happens after the last chunk is forwarded.
    let mut saved = Vec::new();
    for _ in 0..50 {
        saved = std::fs::read_dir(&ideas_dir)
            .map(|rd| rd.filter_map(|e| e.ok()).collect())
            .unwrap_or_default();
        if !saved.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(saved.len(), 1);
    let body = std::fs::read_to_string(saved[0].path()).unwrap();
    assert!(body.contains("Bean Lab"));
}

#[tokio::test]
async fn test_ideagen_non_streaming_with_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new("mock").with_response("Deep dive.");
    let reg = registry(mock, &config(dir.path()));

    let result = Executor::new()
        .execute(
            &reg,
            IDEAGEN_SKILL,
            "solar kiosks",
            params(json!({"mode": "expand", "expansion_type": "business", "save": "yes"})),
        )
        .await
        .unwrap();
    assert_eq!(result.text, "Deep dive.");
    let artifact = result.artifact.unwrap();
    assert!(artifact.filename.starts_with("ideas_solar_kiosks_"));
    assert_eq!(artifact.media_type, "text/markdown");
}

#[tokio::test]
async fn test_ideagen_invalid_input_is_labelled() {
    let dir = tempfile::tempdir().unwrap();
    let reg = registry(MockProvider::new("mock"), &config(dir.path()));
    let err = Executor::new()
        .execute_stream(&reg, IDEAGEN_SKILL, "ideas", params(json!({"num_ideas": 12})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "execution");
    assert!(err.to_string().contains("between 1 and 10"));
}

#[tokio::test]
async fn test_ideagen_midstream_error_reaches_consumer() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockProvider::new("mock")
        .with_mock_response(MockResponse::partial("1. First ", "stream reset"));
    let reg = registry(mock, &config(dir.path()));
    let exec = Executor::new()
        .execute_stream(&reg, IDEAGEN_SKILL, "brainstorm drones", Map::new())
        .await
        .unwrap();
    let err = exec.stream.collect_text().await.unwrap_err();
    assert_eq!(err.kind(), "llm_provider");
}

#[test]
fn test_invalid_timezone_fails_handler_setup() {
    let mut cfg = SkillkitConfig::default();
    cfg.calendar.timezone = "Not/AZone".into();
    let provider: Arc<dyn LlmProvider> = Arc::new(MockProvider::new("mock"));
    let err = builtin_handlers(&cfg, provider).unwrap_err();
    assert_eq!(err.kind(), "invalid_timezone");
}
