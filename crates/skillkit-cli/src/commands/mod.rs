use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use skillkit_config::{ConfigLoader, LlmConfig, SkillkitConfig, WarningSeverity};
use skillkit_core::SkillkitError;
use skillkit_handlers::{FallbackChat, builtin_handlers};
use skillkit_llm::{LlmProvider, OpenAiProvider};
use skillkit_skills::{Executor, Router, SkillRegistry, TieBreak};

mod chat;
mod run;
mod serve;
mod skills;

/// 🧰 skillkit: discover, route and run SKILL.md skills
#[derive(Parser)]
#[command(name = "skillkit", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to skillkit.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the loaded skills
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },
    /// Show which skill a query would be routed to
    Route {
        query: String,
        /// Caller group for access control (repeatable)
        #[arg(short, long)]
        group: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Route a query to a skill and execute it once
    Run {
        query: String,
        /// Run this skill instead of routing
        #[arg(short, long)]
        skill: Option<String>,
        /// Handler parameters as key=value pairs (values may be JSON)
        #[arg(short, long, value_parser = parse_key_val)]
        param: Vec<(String, String)>,
        /// Directory for generated files (default: calendar.output_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Caller group for access control (repeatable)
        #[arg(short, long)]
        group: Vec<String>,
    },
    /// Interactive chat: every line is routed, activated and executed
    Chat {
        /// Caller group for access control (repeatable)
        #[arg(short, long)]
        group: Vec<String>,
    },
    /// Start the HTTP API server
    Serve {
        /// Address to listen on (default: server.listen)
        #[arg(short = 'L', long)]
        listen: Option<String>,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Audit configuration, credentials and skill requirements
    Doctor,
    /// Show version and build info
    Version,
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum SkillAction {
    /// List loaded skills
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show details and instructions of a skill
    Show { name: String },
    /// List a skill's bundled files, or print one of them
    Resources {
        name: String,
        /// File under references/ or assets/ to print
        file: Option<String>,
    },
}

/// Parse "key=value" CLI arguments.
fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Turn `--param` pairs into handler parameters. Values that parse as JSON
/// (numbers, booleans, arrays, objects) keep their type; anything else is a
/// string.
fn params_from_pairs(pairs: Vec<(String, String)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| {
            let value = serde_json::from_str::<Value>(&v).unwrap_or(Value::String(v));
            (k, value)
        })
        .collect()
}

/// Resolve relative skill directories against the config file's directory.
fn resolve_skill_dirs(dirs: &[PathBuf], config_path: &Path) -> Vec<PathBuf> {
    let base = config_path
        .exists()
        .then(|| config_path.parent())
        .flatten()
        .filter(|p| !p.as_os_str().is_empty());
    dirs.iter()
        .map(|d| match base {
            Some(b) if d.is_relative() => b.join(d),
            _ => d.clone(),
        })
        .collect()
}

/// The OpenAI-compatible provider described by `[llm]`.
fn build_provider(llm: &LlmConfig) -> Arc<dyn LlmProvider> {
    let name = if llm.base_url.contains("nvidia.com") {
        "nvidia"
    } else {
        "openai-compatible"
    };
    let key = llm.api_key.clone().unwrap_or_default();
    Arc::new(OpenAiProvider::new(key).with_base_url(&llm.base_url, name))
}

/// Everything a command needs to route and execute queries.
struct SkillContext {
    config: SkillkitConfig,
    provider: Arc<dyn LlmProvider>,
    registry: Arc<SkillRegistry>,
    tie_break: TieBreak,
    groups: Vec<String>,
}

impl SkillContext {
    /// Build the provider, bind the built-in handlers and scan the skill
    /// directories. `groups` overrides `skills.user_groups` when non-empty.
    fn load(
        config: SkillkitConfig,
        config_path: &Path,
        groups: Vec<String>,
    ) -> skillkit_core::Result<Self> {
        let tie_break = config
            .skills
            .tie_break
            .parse::<TieBreak>()
            .map_err(SkillkitError::Config)?;
        let provider = build_provider(&config.llm);
        let handlers = builtin_handlers(&config, Arc::clone(&provider))?;
        let dirs = resolve_skill_dirs(&config.skills.dirs, config_path);
        let registry = Arc::new(SkillRegistry::load(&dirs, &handlers));

        let groups = if groups.is_empty() {
            config.skills.user_groups.clone()
        } else {
            groups
        };

        Ok(Self {
            config,
            provider,
            registry,
            tie_break,
            groups,
        })
    }

    fn router(&self) -> Router {
        Router::new(self.tie_break).with_groups(self.groups.clone())
    }

    fn executor(&self) -> Executor {
        Executor::new().with_groups(self.groups.clone())
    }

    fn fallback(&self) -> FallbackChat {
        FallbackChat::from_config(Arc::clone(&self.provider), &self.config)
    }

    fn dirs(&self, config_path: &Path) -> Vec<PathBuf> {
        resolve_skill_dirs(&self.config.skills.dirs, config_path)
    }
}

impl Cli {
    pub async fn run(self) -> skillkit_core::Result<()> {
        // Load config first so we can use it for log level and format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug".to_string()
        } else if self.quiet {
            "error".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone())
        };
        init_tracing(&log_level, &config.logging.format);

        let config_path = config_loader.path();
        match self.command {
            Commands::Skill { action } => {
                let ctx = SkillContext::load(config, config_path, vec![])?;
                skills::cmd_skill(&ctx, action, config_path)
            }
            Commands::Route { query, group, json } => {
                let ctx = SkillContext::load(config, config_path, group)?;
                skills::cmd_route(&ctx, &query, json)
            }
            Commands::Run {
                query,
                skill,
                param,
                out,
                group,
            } => {
                let ctx = SkillContext::load(config, config_path, group)?;
                let out = out.unwrap_or_else(|| ctx.config.calendar.output_dir.clone());
                run::cmd_run(&ctx, &query, skill, params_from_pairs(param), &out).await
            }
            Commands::Chat { group } => {
                let ctx = SkillContext::load(config, config_path, group)?;
                chat::cmd_chat(&ctx).await
            }
            Commands::Serve { listen } => {
                let ctx = SkillContext::load(config, config_path, vec![])?;
                serve::cmd_serve(ctx, listen).await
            }
            Commands::Config { json } => Self::cmd_config(&config, json),
            Commands::Doctor => Self::cmd_doctor(config, config_path).await,
            Commands::Version => Self::cmd_version(),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    fn cmd_config(config: &SkillkitConfig, json: bool) -> skillkit_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config).map_err(|e| SkillkitError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    async fn cmd_doctor(config: SkillkitConfig, config_path: &Path) -> skillkit_core::Result<()> {
        println!("🩺 skillkit doctor");
        println!("   Config: {}", config_path.display());
        println!();

        let mut warn_count = 0;
        let mut info_count = 0;
        let mut ok_count = 0;

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    println!("  {w}");
                    match w.severity {
                        WarningSeverity::Warning => warn_count += 1,
                        WarningSeverity::Info => info_count += 1,
                        WarningSeverity::Error => {}
                    }
                }
                if warnings.is_empty() {
                    ok_count += 1;
                }
            }
            Err(e) => {
                println!("{e}");
                return Ok(());
            }
        }

        let ctx = match SkillContext::load(config, config_path, vec![]) {
            Ok(ctx) => ctx,
            Err(e) => {
                println!("  ❌ {e}");
                return Ok(());
            }
        };
        ok_count += 1;

        match ctx.provider.health_check().await {
            Ok(()) => ok_count += 1,
            Err(e) => {
                println!("  ⚠️  llm ({}): {e}", ctx.provider.name());
                println!("   ↳ Set NVIDIA_API_KEY or [llm] api_key in skillkit.toml");
                warn_count += 1;
            }
        }

        for dir in ctx.dirs(config_path) {
            if !dir.is_dir() {
                println!("  💡 skills.dirs: {} does not exist", dir.display());
                info_count += 1;
            }
        }

        if ctx.registry.is_empty() {
            println!("  ⚠️  no skills loaded: every query falls back to plain chat");
            warn_count += 1;
        }
        for skipped in ctx.registry.skipped() {
            println!("  ⚠️  skipped {}: {}", skipped.path.display(), skipped.reason);
            warn_count += 1;
        }
        for entry in ctx.registry.entries() {
            let d = &entry.descriptor;
            let missing = d.missing_env();
            if !missing.is_empty() {
                println!("  ⚠️  {}: missing environment {}", d.name, missing.join(", "));
                warn_count += 1;
            } else if entry.handler.is_none() {
                println!("  💡 {}: no handler bound, listed for prompts only", d.name);
                info_count += 1;
            } else {
                ok_count += 1;
            }
        }

        println!();
        println!(
            "  ✅ {ok_count} checks passed, ⚠️  {warn_count} warnings, 💡 {info_count} suggestions"
        );
        Ok(())
    }

    fn cmd_version() -> skillkit_core::Result<()> {
        println!("🧰 skillkit v{}", env!("CARGO_PKG_VERSION"));
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> skillkit_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "skillkit", &mut std::io::stdout());
        Ok(())
    }
}

fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        "json" => builder.json().with_target(true).init(),
        "compact" => builder.compact().with_target(false).init(),
        _ => builder.with_target(false).init(),
    }
}

/// Truncate a string to `max` characters on one line, appending "..." if
/// truncated.
fn truncate_output(s: &str, max: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        format!("{}...", flat.chars().take(max).collect::<String>())
    }
}
