//! A session with the timer and notification plugins attached. Ask the
//! model to set a reminder and watch the scheduler fire it.
//!
//! ```sh
//! export YE_AGENT_API_KEY=...
//! cargo run --example timer_session -- "remind me in 1 minute to stretch"
//! ```

use std::sync::Arc;
use ye_agent::plugins::{NotificationPlugin, PluginRegistry, TimerPlugin};
use ye_agent::prelude::*;
use ye_agent::AgentSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let instruction = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Remind me in 1 minute to stretch.".to_string());

    let config = LlmConfig::from_env(
        "https://api.minimax.io/anthropic",
        "MiniMax-M2",
        Dialect::Blocks,
    )?;
    let client = Arc::new(LlmClient::new(config)?);

    let timer = Arc::new(TimerPlugin::new());
    timer.set_callback(|task| async move {
        println!("⏰ timer fired: {}", task.reason);
    });
    timer.initialise().await?;

    let registry = Arc::new(PluginRegistry::new());
    registry.register(timer.clone());
    registry.register(Arc::new(NotificationPlugin::default()));

    let sessions = SessionManager::new(
        client,
        vec![],
        "You are a helpful assistant. Use your timer tags when the user asks for reminders.",
        AgentSettings::default(),
    )
    .with_plugins(registry.clone(), "cli");

    sessions.create("demo", "./workspace/demo", vec![]).await?;
    let answer = sessions.dispatch("demo", None, instruction).await?;
    println!("{answer}");

    // Keep the process alive long enough for the scheduler to fire.
    println!("waiting for timers (ctrl-c to exit)...");
    tokio::signal::ctrl_c().await?;
    registry.shutdown_all().await;

    Ok(())
}
