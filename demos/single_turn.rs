//! Minimal single-session run against a live backend.
//!
//! ```sh
//! export YE_AGENT_API_KEY=...
//! cargo run --example single_turn -- "What is in my workspace?"
//! ```

use std::sync::Arc;
use ye_agent::{AgentSettings, Dialect, LlmClient, LlmConfig, SessionManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let instruction = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Introduce yourself in one sentence.".to_string());

    let config = LlmConfig::from_env(
        "https://api.minimax.io/anthropic",
        "MiniMax-M2",
        Dialect::Blocks,
    )?;
    let client = Arc::new(LlmClient::new(config)?);

    let sessions = SessionManager::new(
        client,
        vec![],
        "You are a helpful assistant working inside a sandboxed workspace.",
        AgentSettings::default(),
    );

    sessions.create("demo", "./workspace/demo", vec![]).await?;
    let answer = sessions.dispatch("demo", None, instruction).await?;
    println!("{answer}");

    Ok(())
}
