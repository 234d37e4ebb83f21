use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, mapped to `skillkit.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillkitConfig {
    pub skills: SkillsConfig,
    pub llm: LlmConfig,
    pub calendar: CalendarConfig,
    pub ideagen: IdeaGenConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

// ── Skills ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// Directories scanned for `<skill>/SKILL.md`, in precedence order
    /// (first = highest priority).
    pub dirs: Vec<PathBuf>,
    /// How the router breaks a tie between equally scored skills:
    /// "registration" (first loaded wins) or "longest-trigger".
    pub tie_break: String,
    /// Groups the local user belongs to, used for skill access control.
    pub user_groups: Vec<String>,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            dirs: vec![PathBuf::from("skills")],
            tie_break: "registration".into(),
            user_groups: vec![],
        }
    }
}

// ── LLM ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint base URL.
    pub base_url: String,
    /// Default chat model.
    pub model: String,
    /// API key. Can also be set via NVIDIA_API_KEY.
    /// Config file takes priority over environment variable.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://integrate.api.nvidia.com/v1".into(),
            model: "nvidia/llama-3.1-nemotron-nano-8b-v1".into(),
            api_key: None,
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 4096,
        }
    }
}

// ── Calendar ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA timezone applied to parsed events, e.g. "Europe/Berlin".
    pub timezone: String,
    /// Model used to extract event fields (None = `llm.model`).
    pub model: Option<String>,
    pub temperature: f32,
    pub default_duration_hours: f64,
    pub reminder_hours: f64,
    /// Where the CLI writes generated `.ics` files.
    pub output_dir: PathBuf,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
            model: Some("meta/llama-3.1-405b-instruct".into()),
            temperature: 0.3,
            default_duration_hours: 1.0,
            reminder_hours: 1.0,
            output_dir: PathBuf::from("."),
        }
    }
}

// ── Idea generation ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeaGenConfig {
    /// Model used for idea generation (None = `llm.model`).
    pub model: Option<String>,
    /// Directory holding saved idea documents.
    pub ideas_dir: PathBuf,
    /// Ideas generated when the query does not say how many (1-10).
    pub default_num_ideas: u8,
    /// Sampling temperature for generation (0.0-1.0).
    pub creativity: f32,
}

impl Default for IdeaGenConfig {
    fn default() -> Self {
        Self {
            model: None,
            ideas_dir: PathBuf::from("ideas"),
            default_num_ideas: 5,
            creativity: 0.7,
        }
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Enable permissive CORS (for browser front-ends during development).
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7860".into(),
            cors: false,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl SkillkitConfig {
    /// Model for the calendar skill, falling back to the global model.
    pub fn calendar_model(&self) -> &str {
        self.calendar.model.as_deref().unwrap_or(&self.llm.model)
    }

    /// Model for the idea generation skill, falling back to the global model.
    pub fn ideagen_model(&self) -> &str {
        self.ideagen.model.as_deref().unwrap_or(&self.llm.model)
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl SkillkitConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Skills ───
        if self.skills.dirs.is_empty() {
            warnings.push(ConfigWarning {
                field: "skills.dirs".into(),
                message: "no skill directories configured: the router will never match".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set to e.g. [\"skills\"]".into()),
            });
        }
        let valid_tie_breaks = ["registration", "longest-trigger"];
        if !valid_tie_breaks.contains(&self.skills.tie_break.as_str()) {
            warnings.push(ConfigWarning {
                field: "skills.tie_break".into(),
                message: format!("unknown tie-break policy '{}'", self.skills.tie_break),
                severity: WarningSeverity::Error,
                hint: Some(format!("Valid values: {}", valid_tie_breaks.join(", "))),
            });
        }

        // ── LLM ───
        if self.llm.base_url.is_empty() {
            warnings.push(ConfigWarning {
                field: "llm.base_url".into(),
                message: "base URL is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'https://integrate.api.nvidia.com/v1'".into()),
            });
        } else if !self.llm.base_url.starts_with("http://")
            && !self.llm.base_url.starts_with("https://")
        {
            warnings.push(ConfigWarning {
                field: "llm.base_url".into(),
                message: format!("'{}' is not an http(s) URL", self.llm.base_url),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }
        if self.llm.model.is_empty() {
            warnings.push(ConfigWarning {
                field: "llm.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'nvidia/llama-3.1-nemotron-nano-8b-v1'".into()),
            });
        }
        if self.llm.api_key.as_deref().is_none_or(str::is_empty) {
            warnings.push(ConfigWarning {
                field: "llm.api_key".into(),
                message: "no API key set: LLM-backed skills will fail".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set llm.api_key or export NVIDIA_API_KEY (https://build.nvidia.com/)".into()),
            });
        }
        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            warnings.push(ConfigWarning {
                field: "llm.temperature".into(),
                message: format!("temperature {} is out of range", self.llm.temperature),
                severity: WarningSeverity::Error,
                hint: Some("Temperature must be between 0.0 and 2.0".into()),
            });
        }
        if self.llm.max_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "llm.max_tokens".into(),
                message: "max_tokens is 0: skills won't produce output".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 4096".into()),
            });
        }

        // ── Calendar ───
        if self.calendar.timezone.parse::<chrono_tz::Tz>().is_err() {
            warnings.push(ConfigWarning {
                field: "calendar.timezone".into(),
                message: format!("'{}' is not an IANA timezone", self.calendar.timezone),
                severity: WarningSeverity::Error,
                hint: Some("Use names like 'UTC', 'America/New_York', 'Europe/Berlin'".into()),
            });
        }
        if self.calendar.default_duration_hours <= 0.0 {
            warnings.push(ConfigWarning {
                field: "calendar.default_duration_hours".into(),
                message: "duration must be positive".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 1.0".into()),
            });
        }
        if self.calendar.reminder_hours < 0.0 {
            warnings.push(ConfigWarning {
                field: "calendar.reminder_hours".into(),
                message: "reminder is negative".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Use 0 to disable reminders".into()),
            });
        }

        // ── Idea generation ───
        if !(1..=10).contains(&self.ideagen.default_num_ideas) {
            warnings.push(ConfigWarning {
                field: "ideagen.default_num_ideas".into(),
                message: format!("{} is outside 1-10", self.ideagen.default_num_ideas),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 5".into()),
            });
        }
        if !(0.0..=1.0).contains(&self.ideagen.creativity) {
            warnings.push(ConfigWarning {
                field: "ideagen.creativity".into(),
                message: format!("creativity {} is outside 0.0-1.0", self.ideagen.creativity),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }

        // ── Server listen address ───
        if self.server.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:7860'".into()),
            });
        } else if self.server.listen.starts_with("0.0.0.0") {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "binding to 0.0.0.0: server is accessible from all interfaces".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Use '127.0.0.1:7860' for local-only access".into()),
            });
        }

        // ── Logging ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
