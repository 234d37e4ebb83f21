use serde_json::json;
use std::path::Path;

use skillkit_core::SkillkitError;

use super::{SkillAction, SkillContext};

pub(super) fn cmd_skill(
    ctx: &SkillContext,
    action: SkillAction,
    config_path: &Path,
) -> skillkit_core::Result<()> {
    let registry = &ctx.registry;

    match action {
        SkillAction::List { json } => {
            if json {
                let skills: Vec<_> = registry
                    .entries()
                    .map(|e| {
                        json!({
                            "name": e.descriptor.name,
                            "description": e.descriptor.description,
                            "version": e.descriptor.version,
                            "triggers": e.descriptor.triggers,
                            "tools": e.tool_names(),
                            "path": e.descriptor.file_path,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&skills)?);
                return Ok(());
            }

            if registry.is_empty() {
                let dirs: Vec<String> = ctx
                    .dirs(config_path)
                    .iter()
                    .map(|d| d.display().to_string())
                    .collect();
                println!("No skills found in {}", dirs.join(", "));
                println!("  A skill is a directory holding a SKILL.md file.");
                return Ok(());
            }

            println!("\x1b[1mAvailable Skills ({}):\x1b[0m\n", registry.len());
            for entry in registry.entries() {
                let s = &entry.descriptor;
                let tags = if s.tags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", s.tags.join(", "))
                };
                println!("  \x1b[36m{}\x1b[0m v{}{}", s.name, s.version, tags);
                println!("    {}", s.description);
                let tools = entry.tool_names();
                if tools.is_empty() {
                    println!("    Tools: \x1b[90m(none)\x1b[0m");
                } else {
                    println!("    Tools: {}", tools.join(", "));
                }
                println!("    File: {}", s.file_path.display());
                println!();
            }
            for skipped in registry.skipped() {
                println!(
                    "  \x1b[33m⚠️  skipped\x1b[0m {}: {}",
                    skipped.path.display(),
                    skipped.reason
                );
            }
        }
        SkillAction::Show { name } => {
            let entry = registry
                .entry(&name)
                .ok_or_else(|| SkillkitError::SkillNotFound(name.clone()))?;
            let skill = &entry.descriptor;

            println!("\x1b[1m{}\x1b[0m v{}", skill.name, skill.version);
            println!("  {}", skill.description);
            if let Some(ref author) = skill.author {
                println!("  Author: {author}");
            }
            if !skill.tags.is_empty() {
                println!("  Tags: {}", skill.tags.join(", "));
            }
            println!("  Triggers: {}", skill.triggers.join(", "));
            if let Some(handler) = &entry.handler {
                let tool = handler.tool();
                let mode = if tool.streaming { " (streaming)" } else { "" };
                println!("  Tool: {}{mode}", tool.name);
            }
            if skill.has_config {
                println!("  Type: {} (config.yaml)", skill.skill_type);
            }
            if !skill.user_groups.is_empty() {
                println!("  Groups: {}", skill.user_groups.join(", "));
            }
            if !skill.admin_groups.is_empty() {
                println!("  Admin groups: {}", skill.admin_groups.join(", "));
            }
            if !skill.environment.required.is_empty() {
                println!("  Requires: {}", skill.environment.required.join(", "));
            }
            let missing = skill.missing_env();
            if !missing.is_empty() {
                println!("  \x1b[33mMissing env: {}\x1b[0m", missing.join(", "));
            }
            println!("  File: {}", skill.file_path.display());

            println!("\n  \x1b[1mInstructions:\x1b[0m");
            for line in skill.instructions().lines() {
                println!("    {line}");
            }
        }
        SkillAction::Resources { name, file } => {
            let skill = registry
                .get(&name)
                .ok_or_else(|| SkillkitError::SkillNotFound(name.clone()))?;
            match file {
                None => println!("{}", skill.list_resources()?),
                Some(file) if skill.references_dir().join(&file).is_file() => {
                    println!("{}", skill.read_reference(&file)?)
                }
                Some(file) => println!("{}", skill.read_asset(&file)?),
            }
        }
    }

    Ok(())
}

pub(super) fn cmd_route(ctx: &SkillContext, query: &str, json: bool) -> skillkit_core::Result<()> {
    let router = ctx.router();
    let result = router.match_query(query, &ctx.registry);
    let scores = router.score_all(query, &ctx.registry);

    if json {
        let body = json!({ "result": result, "scores": scores });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    match &result.skill {
        Some(skill) => println!(
            "🎯 \x1b[36m{skill}\x1b[0m (score {}, matched: {})",
            result.score,
            result.matched.join(", ")
        ),
        None => println!("∅ No skill matched; the query would go to plain chat."),
    }
    for s in scores.iter().filter(|s| s.score > 0) {
        println!("   {:<24} {}", s.skill, s.score);
    }
    Ok(())
}
