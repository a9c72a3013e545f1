//! `clawcraft status` — show configuration and storage stats.

use clawcraft_core::storage::Storage;
use clawcraft_store::SqliteStore;
use std::path::PathBuf;

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    println!("clawcraft status");
    println!("  game endpoint : {}:{}", config.game.host, config.game.port);
    println!("  username      : {}", config.game.username);
    println!("  llm provider  : {} ({})", config.llm.provider, config.llm.model);
    println!(
        "  api key       : {}",
        if config.llm.api_key.is_some() { "configured" } else { "MISSING" }
    );
    println!("  storage       : {}", config.storage.path);
    println!(
        "  memory budget : {} tokens, keep {} messages",
        config.memory.max_tokens, config.memory.keep_messages
    );

    match SqliteStore::open(&config.storage.path).await {
        Ok(store) => {
            let messages = store.recent_messages(u32::MAX).await?;
            let pending = store.pending_goals().await?;
            println!("  messages      : {}", messages.len());
            println!("  pending goals : {}", pending.len());
            if let Some(world) = store.latest_world_state().await? {
                println!(
                    "  last seen     : {} at {} ({})",
                    world.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    world.position,
                    world.dimension
                );
            }
        }
        Err(e) => println!("  storage error : {e}"),
    }

    Ok(())
}
