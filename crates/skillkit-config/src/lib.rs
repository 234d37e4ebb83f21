//! # skillkit-config
//!
//! Configuration system for skillkit. Reads from `skillkit.toml` and
//! environment variables, in that precedence order for most keys; API keys
//! fall back to the environment only when the file leaves them unset.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::SkillkitConfig;
pub use schema::{
    CalendarConfig, ConfigWarning, IdeaGenConfig, LlmConfig, LoggingConfig, ServerConfig,
    SkillsConfig, WarningSeverity,
};
