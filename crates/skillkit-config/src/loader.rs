use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::SkillkitConfig;

const CONFIG_FILE: &str = "skillkit.toml";

/// Loads the skillkit configuration once at startup.
pub struct ConfigLoader {
    config: SkillkitConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > SKILLKIT_CONFIG env >
    /// ./skillkit.toml > ~/.skillkit/skillkit.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("SKILLKIT_CONFIG") {
            return PathBuf::from(p);
        }
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return local;
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".skillkit")
            .join(CONFIG_FILE)
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> skillkit_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = Self::read(&config_path)?;
        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(skillkit_core::SkillkitError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn read(config_path: &Path) -> skillkit_core::Result<SkillkitConfig> {
        if !config_path.exists() {
            warn!(?config_path, "config file not found, using defaults");
            return Ok(SkillkitConfig::default());
        }
        info!(?config_path, "loading configuration");
        let raw = std::fs::read_to_string(config_path)?;
        toml::from_str::<SkillkitConfig>(&raw).map_err(|e| {
            skillkit_core::SkillkitError::Config(format!(
                "failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })
    }

    /// Get a snapshot of the loaded config.
    pub fn get(&self) -> SkillkitConfig {
        self.config.clone()
    }

    pub fn config(&self) -> &SkillkitConfig {
        &self.config
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(config: SkillkitConfig) -> SkillkitConfig {
        Self::apply_overrides_from(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup` (SKILLKIT_LLM_MODEL,
    /// SKILLKIT_SERVER_LISTEN, ...).
    pub fn apply_overrides_from(
        mut config: SkillkitConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> SkillkitConfig {
        if let Some(v) = lookup("SKILLKIT_LLM_BASE_URL") {
            config.llm.base_url = v;
        }
        if let Some(v) = lookup("SKILLKIT_LLM_MODEL") {
            config.llm.model = v;
        }
        if let Some(v) = lookup("SKILLKIT_SERVER_LISTEN") {
            config.server.listen = v;
        }
        if let Some(v) = lookup("SKILLKIT_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = lookup("SKILLKIT_TIMEZONE") {
            config.calendar.timezone = v;
        }
        if let Some(v) = lookup("SKILLKIT_SKILLS_DIRS") {
            config.skills.dirs = v
                .split(':')
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .collect();
        }
        // API key: config file takes priority, env is the fallback.
        if config.llm.api_key.as_deref().is_none_or(str::is_empty)
            && let Some(v) = lookup("NVIDIA_API_KEY")
        {
            config.llm.api_key = Some(v);
        }
        config
    }
}
