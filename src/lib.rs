//! # ye-agent
//!
//! An LLM-backed autonomous agent runtime: given a user instruction, the
//! runtime drives a bounded reason-act loop in which a language model
//! proposes tool invocations, the runtime executes those tools against a
//! sandboxed workspace, feeds the results back, and repeats until the model
//! emits a terminal answer or the step budget is exhausted.
//!
//! ## Key Features
//!
//! - **Agent Loop**: bounded reason-act controller with tool dispatch,
//!   error containment and cooperative cancellation
//! - **Context Management**: dual-signal token accounting and rolling
//!   summarisation that preserves every original user turn
//! - **Two Wire Dialects**: block-style and chat-completions backends
//!   normalised into one internal message shape
//! - **Sessions**: isolated, cancellable, concurrent conversations, each
//!   bound to its own working directory and tool instances
//! - **Plugin Pipeline**: prompt extensions upstream of each model call and
//!   reply handlers that turn in-text tags into side effects (timers,
//!   notifications, shell scripts)
//! - **Retry Logic**: exponential backoff with jitter for transient faults
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ye_agent::{
//!     AgentSettings, Dialect, LlmClient, LlmConfig, SessionManager,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LlmConfig::builder()
//!         .api_key(std::env::var("YE_AGENT_API_KEY")?)
//!         .api_base("https://api.example.com/anthropic")
//!         .model("m2-large")
//!         .dialect(Dialect::Blocks)
//!         .build()?;
//!     let client = Arc::new(LlmClient::new(config)?);
//!
//!     let sessions = SessionManager::new(
//!         client,
//!         vec![],
//!         "You are a helpful assistant.",
//!         AgentSettings::default(),
//!     );
//!
//!     sessions.create("demo", "./workspace/demo", vec![]).await?;
//!     let answer = sessions.dispatch("demo", None, "What is 2+2?").await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// The reason-act agent loop: step budget, tool dispatch, error
/// containment, cancellation and terminal-answer detection.
mod agent;

/// Model client normalising two wire dialects (block-style and
/// chat-completions) into one internal response shape.
mod client;

/// Validated model-backend configuration and dialect selection.
mod config;

/// Conversation context: message history, token accounting and rolling
/// summarisation.
mod context;

/// Error types and conversions used across all public APIs.
mod error;

/// Per-run append-only trace of requests, responses and tool invocations.
mod logger;

/// Session manager: isolated concurrent conversations keyed by id.
mod session;

/// Tool definition system with schema normalisation and async handlers.
mod tools;

/// Core message, tool-call and response types.
mod types;

/// Workspace path sandbox and the per-session file tools.
mod workspace;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

/// Plugin and reply-handler pipeline, including the built-in timer,
/// notification and shell-script plugins.
pub mod plugins;

/// Retry utilities with exponential backoff and jitter. Public so callers
/// can wrap their own operations.
pub mod retry;

// --- Agent ---

pub use agent::{Agent, AgentSettings, PluginIdentity, CANCELLED_MESSAGE};

// --- Model client ---

pub use client::{ChatModel, LlmClient};

// --- Configuration ---

pub use config::{Dialect, LlmConfig, LlmConfigBuilder};

// --- Context ---

pub use context::{ContextManager, SUMMARY_MARKER};

// --- Errors ---

pub use error::{Error, Result};

// --- Run trace ---

pub use logger::RunLogger;

// --- Sessions ---

pub use session::{McpServerConfig, SessionManager, SessionState};

// --- Tools & workspace ---

pub use tools::{tool, Tool, ToolBuilder, ToolHandler};
pub use workspace::{edit_file_tool, file_tools, read_file_tool, write_file_tool, WorkspaceRoot};

// --- Core types ---

pub use types::{
    Content, ContentBlock, FunctionCall, LlmResponse, Message, MessageRole, ToolCall, ToolResult,
    ToolSpec, Usage, RAW_ARGUMENTS_KEY,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Convenience module containing the most commonly used types and
/// functions. Import with `use ye_agent::prelude::*;`.
pub mod prelude {
    pub use crate::plugins::{Plugin, PluginContext, PluginMetadata, PluginRegistry, ReplyHandler};
    pub use crate::{
        tool, Agent, AgentSettings, ChatModel, Content, Dialect, Error, LlmClient, LlmConfig,
        LlmResponse, Message, MessageRole, Result, SessionManager, Tool, ToolCall, ToolResult,
        ToolSpec, WorkspaceRoot,
    };
}
