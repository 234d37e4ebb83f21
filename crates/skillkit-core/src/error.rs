use thiserror::Error;

/// Unified error type for the skillkit runtime.
#[derive(Error, Debug)]
pub enum SkillkitError {
    // ── Descriptor / registry errors ───────────────────────────
    #[error("invalid skill descriptor {path}: {reason}")]
    Descriptor { path: String, reason: String },

    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("no handler registered for skill: {0}")]
    HandlerNotFound(String),

    #[error("access denied to skill: {0}")]
    AccessDenied(String),

    #[error("resource error: {skill}: {reason}")]
    Resource { skill: String, reason: String },

    // ── Execution errors ───────────────────────────────────────
    #[error("skill execution failed: {skill} ({tool}): {reason}")]
    Execution {
        skill: String,
        tool: String,
        reason: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // ── LLM errors ─────────────────────────────────────────────
    #[error("llm provider error: {0}")]
    LlmProvider(String),

    #[error("llm credentials missing: {0}")]
    MissingCredentials(String),

    // ── Calendar errors ────────────────────────────────────────
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("calendar error: {0}")]
    Calendar(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SkillkitError {
    /// Short machine-readable label for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Descriptor { .. } => "descriptor",
            Self::SkillNotFound(_) => "skill_not_found",
            Self::HandlerNotFound(_) => "handler_not_found",
            Self::AccessDenied(_) => "access_denied",
            Self::Resource { .. } => "resource",
            Self::Execution { .. } => "execution",
            Self::InvalidInput(_) => "invalid_input",
            Self::LlmProvider(_) => "llm_provider",
            Self::MissingCredentials(_) => "missing_credentials",
            Self::InvalidTimezone(_) => "invalid_timezone",
            Self::Calendar(_) => "calendar",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, SkillkitError>;
