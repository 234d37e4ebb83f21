use serde_json::Map;
use std::io::Write;
use tokio::io::AsyncBufReadExt;

use skillkit_core::Message;

use super::run::{execute, print_stream, save_artifact};
use super::{SkillContext, truncate_output};

/// Turns of plain chat kept as context for the fallback model.
const MAX_HISTORY: usize = 20;

pub(super) async fn cmd_chat(ctx: &SkillContext) -> skillkit_core::Result<()> {
    println!("🧰 skillkit chat");
    println!("   {} skill(s) loaded", ctx.registry.len());
    println!("   Type 'exit' or Ctrl+C to quit");
    println!("   Type '/skills' to list skills");
    println!();

    if ctx.config.llm.api_key.as_deref().is_none_or(str::is_empty) {
        eprintln!("⚠️  No LLM API key found.");
        eprintln!("   Add to [llm] in skillkit.toml:  api_key = \"nvapi-...\"");
        eprintln!("   Or set env var: export NVIDIA_API_KEY=nvapi-...");
        eprintln!();
    }

    let fallback = ctx.fallback();
    let mut history: Vec<Message> = Vec::new();
    let out_dir = ctx.config.calendar.output_dir.clone();

    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();

    loop {
        eprint!("\x1b[36myou>\x1b[0m ");
        std::io::stderr().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" || trimmed == "quit" || trimmed == "/exit" {
            println!("👋 Goodbye!");
            break;
        }
        if trimmed == "/skills" {
            for s in ctx.registry.accessible(&ctx.groups) {
                println!(
                    "  \x1b[36m{}\x1b[0m: {}",
                    s.name,
                    truncate_output(&s.description, 80)
                );
            }
            println!();
            continue;
        }

        let m = ctx.router().match_query(trimmed, &ctx.registry);
        match m.skill {
            Some(skill) => {
                match ctx.registry.activate(&skill) {
                    Ok(activation) => eprintln!(
                        "\x1b[33m📖 {}\x1b[0m \x1b[90m{}\x1b[0m",
                        activation.skill,
                        activation.summary()
                    ),
                    Err(e) => {
                        println!("\x1b[31m❌ {e}\x1b[0m\n");
                        continue;
                    }
                }
                eprint!("\x1b[32mskillkit>\x1b[0m ");
                match execute(ctx, &skill, trimmed, Map::new()).await {
                    Ok(Some(artifact)) => match save_artifact(&artifact, &out_dir) {
                        Ok(path) => println!("💾 Saved {}", path.display()),
                        Err(e) => println!("\x1b[31m❌ {e}\x1b[0m"),
                    },
                    Ok(None) => {}
                    Err(e) => println!("\x1b[31m❌ Error: {e}\x1b[0m"),
                }
            }
            None => {
                eprint!("\x1b[32mskillkit>\x1b[0m ");
                let reply = match fallback
                    .respond_stream(&ctx.registry, &ctx.groups, &history, trimmed)
                    .await
                {
                    Ok(stream) => print_stream(stream).await,
                    Err(e) => Err(e),
                };
                match reply {
                    Ok(text) => {
                        history.push(Message::user(trimmed));
                        history.push(Message::assistant(text));
                        if history.len() > MAX_HISTORY {
                            history.drain(..history.len() - MAX_HISTORY);
                        }
                    }
                    Err(e) => println!("\x1b[31m❌ Error: {e}\x1b[0m"),
                }
            }
        }
        println!();
    }

    Ok(())
}
