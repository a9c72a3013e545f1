//! `clawcraft run` — wire everything up and start the agent loop.
//!
//! Runs until SIGINT or SIGTERM, then stops the loop cooperatively,
//! disconnects the client, and exits 0.

use clawcraft_agent::{AgentRunner, RunnerConfig, SpeedrunStrategy};
use clawcraft_client::SimClient;
use clawcraft_core::bot::BotClient;
use clawcraft_core::provider::ChatOptions;
use clawcraft_core::storage::Storage;
use clawcraft_core::tool::{Dispatcher, ToolContext};
use clawcraft_llm::OpenAiCompatBridge;
use clawcraft_memory::AgentMemory;
use clawcraft_perception::{InventoryTracker, ScanPolicy, WorldPerceiver};
use clawcraft_store::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let api_key = config.require_api_key()?.to_string();

    info!(
        host = %config.game.host,
        port = config.game.port,
        username = %config.game.username,
        "Starting clawcraft"
    );

    // The protocol adapter for a live server is out of tree; this build
    // drives the bundled simulated world.
    let sim = Arc::new(SimClient::demo_world());
    if !config.bot.auto_eat {
        sim.drop_capability(clawcraft_core::bot::Capability::AutoEat);
    }
    if !config.bot.auto_armor {
        sim.drop_capability(clawcraft_core::bot::Capability::ArmorManager);
    }
    let client: Arc<dyn BotClient> = sim;

    let storage: Arc<dyn Storage> = Arc::new(SqliteStore::open(&config.storage.path).await?);
    let perceiver = Arc::new(WorldPerceiver::new(client.clone(), ScanPolicy::default()));
    let tracker = Arc::new(InventoryTracker::new(client.clone()));
    let dispatcher = Arc::new(Dispatcher::new(
        clawcraft_tools::default_registry(),
        ToolContext::new(client.clone()),
    ));

    let bridge = match config.llm.provider.as_str() {
        "openrouter" => OpenAiCompatBridge::openrouter(&api_key, &config.llm.model),
        "ollama" => OpenAiCompatBridge::ollama(config.llm.base_url.as_deref(), &config.llm.model),
        _ => match &config.llm.base_url {
            Some(base_url) => OpenAiCompatBridge::new(
                config.llm.provider.clone(),
                base_url,
                &api_key,
                &config.llm.model,
            ),
            None => OpenAiCompatBridge::openai(&api_key, &config.llm.model),
        },
    }
    .with_max_tool_iterations(config.llm.max_tool_iterations);

    let memory = AgentMemory::new(config.memory.max_tokens, config.memory.keep_messages);

    let runner = Arc::new(AgentRunner::new(
        client,
        perceiver,
        tracker,
        memory,
        Arc::new(bridge),
        dispatcher,
        storage,
        Box::new(SpeedrunStrategy),
        RunnerConfig {
            chat_options: ChatOptions {
                temperature: Some(config.llm.temperature),
                max_tokens: Some(config.llm.max_tokens),
                top_p: Some(config.llm.top_p),
                ..ChatOptions::default()
            },
            ..RunnerConfig::default()
        },
    ));

    let loop_handle = tokio::spawn(runner.clone().run());

    wait_for_shutdown().await;
    info!("Shutdown signal received, stopping agent");

    runner.stop();
    let _ = loop_handle.await;

    let stats = runner.stats();
    info!(
        cycles = stats.cycles_completed,
        tools = stats.tools_executed,
        "clawcraft stopped cleanly"
    );
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
