use std::sync::Arc;

use skillkit_server::{AppState, start_server};

use super::SkillContext;

pub(super) async fn cmd_serve(ctx: SkillContext, listen: Option<String>) -> skillkit_core::Result<()> {
    let mut server = ctx.config.server.clone();
    if let Some(listen) = listen {
        server.listen = listen;
    }

    let fallback = Arc::new(ctx.fallback());
    let state = AppState::new(Arc::clone(&ctx.registry))
        .with_tie_break(ctx.tie_break)
        .with_fallback(fallback);

    println!(
        "🚀 skillkit serving {} skill(s) on http://{}",
        ctx.registry.len(),
        server.listen
    );
    for name in ctx.registry.names() {
        println!("   • {name}");
    }

    start_server(server, state).await
}
