use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;

use skillkit_core::{Artifact, SkillkitError};
use skillkit_skills::TextStream;
use tracing::info;

use super::SkillContext;

pub(super) async fn cmd_run(
    ctx: &SkillContext,
    query: &str,
    skill: Option<String>,
    params: Map<String, Value>,
    out: &Path,
) -> skillkit_core::Result<()> {
    if query.trim().is_empty() {
        return Err(SkillkitError::InvalidInput("query cannot be empty".into()));
    }

    let skill = match skill {
        Some(skill) => Some(skill),
        None => {
            let m = ctx.router().match_query(query, &ctx.registry);
            if let Some(ref s) = m.skill {
                eprintln!(
                    "\x1b[90m🎯 {s} (matched: {})\x1b[0m",
                    m.matched.join(", ")
                );
            }
            m.skill
        }
    };

    let Some(skill) = skill else {
        eprintln!("\x1b[90m∅ No skill matched, answering directly\x1b[0m");
        let stream = ctx
            .fallback()
            .respond_stream(&ctx.registry, &ctx.groups, &[], query)
            .await?;
        print_stream(stream).await?;
        return Ok(());
    };

    if let Some(artifact) = execute(ctx, &skill, query, params).await? {
        let path = save_artifact(&artifact, out)?;
        println!("💾 Saved {} ({} bytes)", path.display(), artifact.len());
    }
    Ok(())
}

/// Run `skill`, printing its text as it arrives. Streaming tools are
/// consumed chunk by chunk; returns the artifact, if any.
pub(super) async fn execute(
    ctx: &SkillContext,
    skill: &str,
    query: &str,
    params: Map<String, Value>,
) -> skillkit_core::Result<Option<Artifact>> {
    let streaming = ctx
        .registry
        .handler(skill)
        .is_some_and(|h| h.tool().streaming);

    if streaming {
        let exec = ctx
            .executor()
            .execute_stream(&ctx.registry, skill, query, params)
            .await?;
        print_stream(exec.stream).await?;
        return Ok(None);
    }

    let result = ctx
        .executor()
        .execute(&ctx.registry, skill, query, params)
        .await?;
    println!("{}", result.text);
    eprintln!(
        "\x1b[90m   [{} via {} in {} ms]\x1b[0m",
        result.skill,
        result.tool,
        result.elapsed.as_millis()
    );
    Ok(result.artifact)
}

/// Print chunks to stdout as they arrive and return the full text.
pub(super) async fn print_stream(mut stream: TextStream) -> skillkit_core::Result<String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next_chunk().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                if !text.is_empty() {
                    println!();
                }
                return Err(e);
            }
        };
        print!("{chunk}");
        std::io::stdout().flush().ok();
        text.push_str(&chunk);
    }
    if !text.ends_with('\n') {
        println!();
    }
    Ok(text)
}

/// Write the artifact into `dir`, creating it if needed.
pub(super) fn save_artifact(artifact: &Artifact, dir: &Path) -> skillkit_core::Result<std::path::PathBuf> {
    let path = artifact.save_to(dir)?;
    info!(path = %path.display(), bytes = artifact.len(), "artifact saved");
    Ok(path)
}
