//! `calendar-assistant`: natural-language event requests to `.ics` files.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use skillkit_config::SkillkitConfig;
use skillkit_core::{Artifact, Result, SkillkitError, Tool};
use skillkit_llm::{LlmProvider, LlmRequest};
use skillkit_skills::{Invocation, SkillHandler, SkillOutput};
use std::sync::Arc;
use tracing::{debug, info};

use crate::ics::{self, CalendarEvent, Participant};
use crate::params::safe_stem;

pub const TOOL_NAME: &str = "natural_language_to_ics";
pub const MEDIA_TYPE: &str = "text/calendar";

const REQUIRED_FIELDS: [&str; 3] = ["summary", "start_date", "start_time"];

/// Event fields as returned by the model (or supplied directly by a caller).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `HH:MM`
    pub start_time: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration_hours: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub organizer_email: Option<String>,
    #[serde(default)]
    pub organizer_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub reminder_hours: Option<f64>,
    #[serde(default)]
    pub attendees: Vec<AttendeeData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendeeData {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Models sometimes quote numbers.
fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got '{s}'"))),
        Some(other) => Err(serde::de::Error::custom(format!("expected a number, got {other}"))),
    }
}

impl EventData {
    /// Parse a JSON object, reporting the first missing required field.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SkillkitError::Calendar(format!("error parsing JSON response: {e}")))?;
        let Value::Object(map) = &value else {
            return Err(SkillkitError::Calendar("expected a JSON object".into()));
        };
        for field in REQUIRED_FIELDS {
            if map.get(field).is_none_or(Value::is_null) {
                return Err(SkillkitError::Calendar(format!("missing required field: {field}")));
            }
        }
        serde_json::from_value(value)
            .map_err(|e| SkillkitError::Calendar(format!("invalid event data: {e}")))
    }

    /// Resolve into an event in `tz`. Missing duration and reminder fall
    /// back to the given defaults.
    pub fn to_event(&self, tz: Tz, default_duration_hours: f64, default_reminder_hours: f64) -> Result<CalendarEvent> {
        let summary = self.summary.trim();
        if summary.is_empty() {
            return Err(SkillkitError::Calendar("event summary is required".into()));
        }

        let date = NaiveDate::parse_from_str(self.start_date.trim(), "%Y-%m-%d").map_err(|e| {
            SkillkitError::Calendar(format!("invalid start_date '{}': {e}", self.start_date))
        })?;
        let time = parse_time(self.start_time.trim())?;
        let local = date.and_time(time);
        let start = tz.from_local_datetime(&local).earliest().ok_or_else(|| {
            SkillkitError::Calendar(format!("{local} does not exist in {}", tz.name()))
        })?;

        let hours = self.duration_hours.unwrap_or(default_duration_hours);
        if !hours.is_finite() || hours <= 0.0 {
            return Err(SkillkitError::Calendar(format!(
                "duration must be positive, got {hours}"
            )));
        }

        let duration = Duration::try_milliseconds((hours * 3_600_000.0).round() as i64)
            .filter(|d| start.checked_add_signed(*d).is_some())
            .ok_or_else(|| {
                SkillkitError::Calendar(format!("duration of {hours} hours is out of range"))
            })?;

        let organizer = self
            .organizer_email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(|email| Participant {
                email: email.trim().to_string(),
                name: self.organizer_name.clone(),
                role: None,
            });
        let attendees = self
            .attendees
            .iter()
            .filter(|a| !a.email.trim().is_empty())
            .map(|a| Participant {
                email: a.email.trim().to_string(),
                name: a.name.clone(),
                role: a.role.clone(),
            })
            .collect();

        Ok(CalendarEvent {
            summary: summary.to_string(),
            description: self.description.clone(),
            location: self.location.clone(),
            start,
            duration,
            organizer,
            attendees,
            reminder_hours: self.reminder_hours.unwrap_or(default_reminder_hours),
        })
    }
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| SkillkitError::Calendar(format!("invalid start_time '{s}': {e}")))
}

/// Strip a Markdown code fence (```json or ```) around a model reply.
pub fn extract_json(response: &str) -> &str {
    let response = response.trim();
    let (open, start) = match response.find("```json") {
        Some(i) => ("```json", i),
        None => match response.find("```") {
            Some(i) => ("```", i),
            None => return response,
        },
    };
    let body = &response[start + open.len()..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// `<safe summary>_<start date>.ics`, or a timestamped name when nothing
/// of the summary survives.
pub fn ics_filename(summary: &str, start_date: &str, now: DateTime<Utc>) -> String {
    let stem = safe_stem(summary);
    if stem.is_empty() {
        format!("event_{}.ics", now.format("%Y%m%d_%H%M%S"))
    } else {
        format!("{stem}_{start_date}.ics")
    }
}

/// Calendar assistant: parses requests with an LLM and writes iCalendar.
pub struct CalendarSkill {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    timezone: Tz,
    default_duration_hours: f64,
    default_reminder_hours: f64,
}

impl CalendarSkill {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, timezone: &str) -> Result<Self> {
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| SkillkitError::InvalidTimezone(timezone.to_string()))?;
        Ok(Self {
            provider,
            model: model.into(),
            temperature: 0.3,
            timezone,
            default_duration_hours: 1.0,
            default_reminder_hours: 1.0,
        })
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &SkillkitConfig) -> Result<Self> {
        let mut skill = Self::new(provider, config.calendar_model(), &config.calendar.timezone)?;
        skill.temperature = config.calendar.temperature;
        skill.default_duration_hours = config.calendar.default_duration_hours;
        skill.default_reminder_hours = config.calendar.reminder_hours;
        Ok(skill)
    }

    pub fn with_defaults(mut self, duration_hours: f64, reminder_hours: f64) -> Self {
        self.default_duration_hours = duration_hours;
        self.default_reminder_hours = reminder_hours;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    fn system_prompt(&self, reference: DateTime<Tz>) -> String {
        format!(
            r#"You are a calendar assistant. Parse user requests into structured event data.
Return ONLY a valid JSON object with these fields:
{{
    "summary": "Event title",
    "description": "Event description",
    "start_date": "YYYY-MM-DD",
    "start_time": "HH:MM",
    "duration_hours": float,
    "location": "Location (optional)",
    "organizer_email": "email@example.com (optional)",
    "organizer_name": "Name (optional)",
    "reminder_hours": 1
}}

Current date for reference: {date} ({weekday})
Timezone: {tz}

Example input: "Schedule a team meeting tomorrow at 2pm for 2 hours about Q4 planning"
Example output: {{"summary": "Team Meeting - Q4 Planning", "start_date": "{tomorrow}", "start_time": "14:00", "duration_hours": 2.0, "description": "Quarterly planning discussion", "reminder_hours": 1}}

IMPORTANT: Return ONLY the JSON object, no explanations."#,
            date = reference.format("%Y-%m-%d"),
            weekday = reference.format("%A"),
            tz = self.timezone.name(),
            tomorrow = (reference + Duration::days(1)).format("%Y-%m-%d"),
        )
    }

    /// Ask the model to turn `query` into [`EventData`]; relative dates are
    /// resolved against `reference`.
    pub async fn parse_event(&self, query: &str, reference: DateTime<Tz>) -> Result<EventData> {
        let request = LlmRequest::single(&self.model, query)
            .with_system(self.system_prompt(reference))
            .with_sampling(self.temperature, None)
            .with_max_tokens(1024);
        let response = self.provider.complete(&request).await?;
        let json = extract_json(response.text());
        debug!(model = %self.model, extracted = %json, "calendar event extracted");
        EventData::from_json(json)
    }

    /// Render `data` as an `.ics` artifact.
    pub fn create_event(&self, data: &EventData) -> Result<(CalendarEvent, Artifact)> {
        let event = data.to_event(
            self.timezone,
            self.default_duration_hours,
            self.default_reminder_hours,
        )?;
        let now = Utc::now();
        let bytes = ics::build_ics(&event, now)?;
        let filename = ics_filename(&event.summary, &event.start.format("%Y-%m-%d").to_string(), now);
        Ok((event, Artifact::new(filename, MEDIA_TYPE, bytes)))
    }

    /// The whole pipeline: parse with the model, then build the file.
    pub async fn natural_language_to_ics(&self, query: &str) -> Result<(CalendarEvent, Artifact)> {
        let now = Utc::now().with_timezone(&self.timezone);
        let data = self.parse_event(query, now).await?;
        self.create_event(&data)
    }
}

/// Event data given directly as parameters; skips the model.
fn structured_event(inv: &Invocation) -> Option<EventData> {
    let start_date = inv.param_str("start_date")?;
    Some(EventData {
        summary: inv.param_str("summary").unwrap_or_else(|| inv.query.clone()),
        description: inv.param_str("description"),
        start_date,
        start_time: inv.param_str("start_time").unwrap_or_else(|| "09:00".into()),
        duration_hours: inv.param_f64("duration_hours"),
        location: inv.param_str("location"),
        organizer_email: inv.param_str("organizer_email"),
        organizer_name: inv.param_str("organizer_name"),
        reminder_hours: inv.param_f64("reminder_hours"),
        attendees: inv
            .params
            .get("attendees")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
    })
}

fn describe(event: &CalendarEvent, artifact: &Artifact) -> String {
    let mut text = format!(
        "Created calendar event: {}\nStart: {}\nEnd: {}",
        event.summary,
        event.start.format("%Y-%m-%d %H:%M %Z"),
        event
            .end()
            .map(|end| end.format("%Y-%m-%d %H:%M %Z").to_string())
            .unwrap_or_default(),
    );
    if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
        text.push_str(&format!("\nLocation: {location}"));
    }
    if event.reminder_hours > 0.0 {
        text.push_str(&format!("\nReminder: {} hour(s) before", event.reminder_hours));
    }
    text.push_str(&format!("\nFile: {} ({} bytes)", artifact.filename, artifact.len()));
    text
}

#[async_trait]
impl SkillHandler for CalendarSkill {
    fn tool(&self) -> Tool {
        Tool::new(
            TOOL_NAME,
            "Convert a natural-language event request into an iCalendar (.ics) file",
        )
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "summary": { "type": "string" },
                "start_date": { "type": "string", "description": "YYYY-MM-DD" },
                "start_time": { "type": "string", "description": "HH:MM" },
                "duration_hours": { "type": "number" },
                "description": { "type": "string" },
                "location": { "type": "string" },
                "organizer_email": { "type": "string" },
                "organizer_name": { "type": "string" },
                "reminder_hours": { "type": "number" },
                "attendees": { "type": "array" }
            }
        }))
    }

    async fn invoke(&self, inv: &Invocation) -> Result<SkillOutput> {
        let (event, artifact) = match structured_event(inv) {
            Some(data) => self.create_event(&data)?,
            None => {
                if inv.query.trim().is_empty() {
                    return Err(SkillkitError::InvalidInput("event request is empty".into()));
                }
                self.natural_language_to_ics(&inv.query).await?
            }
        };
        info!(
            summary = %event.summary,
            start = %event.start.to_rfc3339(),
            file = %artifact.filename,
            "calendar event created"
        );
        Ok(SkillOutput::text(describe(&event, &artifact)).with_artifact(artifact))
    }
}
