//! The reason-act agent loop
//!
//! [`Agent`] drives a bounded loop: the model proposes tool invocations,
//! the runtime executes them against the workspace, feeds the results back,
//! and repeats until the model emits a terminal answer (no tool calls) or
//! the step budget runs out.
//!
//! Error containment is deliberate and local:
//!
//! - model transport faults go through the retry policy; exhaustion or a
//!   non-retryable fault ends the run with a distinguished message, the
//!   session stays alive;
//! - any failure inside a tool — unknown name, malformed arguments, or an
//!   error from `execute` — becomes a failed tool message for that one
//!   call, and the loop continues;
//! - cancellation is cooperative: the flag is polled at the top of each
//!   step and again when the model call returns, and the run ends without
//!   leaving a dangling assistant turn with unanswered tool calls.

use crate::client::ChatModel;
use crate::context::ContextManager;
use crate::logger::RunLogger;
use crate::plugins::{PluginContext, PluginRegistry};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::tools::Tool;
use crate::types::{Message, ToolResult, RAW_ARGUMENTS_KEY};
use crate::Error;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Terminal message returned when a run is cancelled.
pub const CANCELLED_MESSAGE: &str = "Run cancelled.";

/// Tunable agent parameters.
#[derive(Clone)]
pub struct AgentSettings {
    /// Step budget; each loop iteration (one model call plus its tool
    /// executions) consumes one step.
    pub max_steps: u32,

    /// Token limit that triggers context summarisation.
    pub token_limit: u64,

    /// Retry policy applied to model calls.
    pub retry: RetryConfig,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 50,
            token_limit: 80_000,
            retry: RetryConfig::default(),
        }
    }
}

/// Identity handed to plugins along with the conversation.
#[derive(Debug, Clone, Default)]
pub struct PluginIdentity {
    pub platform: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

/// The reason-act controller for one conversation.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: HashMap<String, Arc<Tool>>,
    context: ContextManager,
    logger: RunLogger,
    settings: AgentSettings,
    workspace_dir: PathBuf,
    cancel_flag: Arc<AtomicBool>,
    plugins: Option<Arc<PluginRegistry>>,
    identity: PluginIdentity,
}

impl Agent {
    /// Create an agent bound to a tool list and a workspace directory.
    ///
    /// The workspace directory is created if missing, and a note naming it
    /// is appended to the system prompt unless one is already present.
    pub fn new(
        model: Arc<dyn ChatModel>,
        system_prompt: impl Into<String>,
        tools: Vec<Arc<Tool>>,
        workspace_dir: impl Into<PathBuf>,
        settings: AgentSettings,
    ) -> crate::Result<Self> {
        let workspace_dir = workspace_dir.into();
        std::fs::create_dir_all(&workspace_dir).map_err(|e| {
            Error::config(format!(
                "cannot create workspace {}: {e}",
                workspace_dir.display()
            ))
        })?;

        let mut system_prompt = system_prompt.into();
        if !system_prompt.contains("Current Workspace") {
            system_prompt.push_str(&format!(
                "\n\n## Current Workspace\nYou are currently working in: `{}`\n\
                 All relative paths will be resolved relative to this directory.",
                workspace_dir.display()
            ));
        }

        let specs = tools.iter().map(|t| t.spec()).collect();
        let tools: HashMap<String, Arc<Tool>> = tools
            .into_iter()
            .map(|t| (t.name().to_string(), t))
            .collect();

        Ok(Self {
            context: ContextManager::new(system_prompt, model.clone(), specs, settings.token_limit),
            logger: RunLogger::new(&workspace_dir),
            model,
            tools,
            settings,
            workspace_dir,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            plugins: None,
            identity: PluginIdentity::default(),
        })
    }

    /// Attach a plugin registry. Prompt extensions are applied before each
    /// model call and the reply-handler chain runs over every response.
    pub fn set_plugins(&mut self, registry: Arc<PluginRegistry>, identity: PluginIdentity) {
        self.plugins = Some(registry);
        self.identity = identity;
    }

    /// Record which user the next run acts for (handed to plugins).
    pub fn set_user(&mut self, user_id: Option<String>) {
        self.identity.user_id = user_id;
    }

    /// The flag observed at every suspension point. Raising it cancels the
    /// run cooperatively.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }

    /// The agent's workspace directory.
    pub fn workspace_dir(&self) -> &std::path::Path {
        &self.workspace_dir
    }

    /// Append a user message to the conversation.
    pub fn append_user_message(&mut self, text: impl Into<String>) {
        self.context.append_user(text.into());
    }

    /// A stable copy of the conversation history.
    pub fn history(&self) -> Vec<Message> {
        self.context.history_snapshot()
    }

    fn cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    fn plugin_context(&self) -> PluginContext {
        PluginContext {
            messages: self.context.history_snapshot(),
            platform: self.identity.platform.clone(),
            user_id: self.identity.user_id.clone(),
            session_id: self.identity.session_id.clone(),
            config: serde_json::Value::Null,
            extra: serde_json::Map::new(),
        }
    }

    /// Execute the loop until a terminal answer, cancellation, a model
    /// failure, or step budget exhaustion. The returned string is what the
    /// user sees either way.
    pub async fn run(&mut self) -> String {
        self.logger.start_run();
        if let Some(path) = self.logger.log_file_path() {
            log::debug!("run log: {}", path.display());
        }

        for step in 0..self.settings.max_steps {
            if self.cancelled() {
                return CANCELLED_MESSAGE.to_string();
            }

            // Compact history before the call so the request fits the window
            if let Err(e) = self.context.maybe_summarise().await {
                log::warn!("summarisation failed: {e}");
            }

            log::debug!("step {}/{}", step + 1, self.settings.max_steps);

            // Plugin prompt extensions apply to the outgoing request only,
            // never to stored history.
            let call_messages = self.messages_with_extensions().await;
            let (_, tools) = self.context.context();
            let tools = tools.to_vec();

            self.logger.log_request(&call_messages, &tools);

            let model = self.model.clone();
            let response = retry_with_backoff(&self.settings.retry, || {
                let model = model.clone();
                let call_messages = call_messages.clone();
                let tools = tools.clone();
                async move { model.generate(&call_messages, &tools).await }
            })
            .await;

            let response = match response {
                Ok(response) => response,
                Err(Error::RetriesExhausted {
                    attempts,
                    last_cause,
                }) => {
                    return format!("LLM call failed after {attempts} retries: {last_cause}");
                }
                Err(e) => return format!("LLM call failed: {e}"),
            };

            // The model call is a suspension point; bail out before the
            // assistant turn lands so no tool calls are left unanswered.
            if self.cancelled() {
                return CANCELLED_MESSAGE.to_string();
            }

            self.context.update_api_tokens(response.usage);
            self.logger.log_response(&response);
            self.context.append_assistant(&response);

            // Reply handlers rewrite text and trigger side effects; they
            // never touch tool_calls.
            let output_text = match &self.plugins {
                Some(registry) => {
                    registry
                        .apply_reply_handlers(response.content.clone(), &self.plugin_context())
                        .await
                }
                None => response.content.clone(),
            };

            if response.is_terminal() {
                return output_text;
            }

            for tool_call in response.tool_calls.as_deref().unwrap_or_default() {
                let name = &tool_call.function.name;
                let arguments = &tool_call.function.arguments;

                let result = match self.tools.get(name) {
                    None => ToolResult::fail(format!("Unknown tool: {name}")),
                    Some(tool) => {
                        if !valid_arguments(arguments) {
                            ToolResult::fail(format!(
                                "Invalid arguments for {name}: expected a JSON object"
                            ))
                        } else {
                            match tool.execute(arguments.clone()).await {
                                Ok(result) => result,
                                Err(e) => {
                                    ToolResult::fail(format!("Tool execution failed: {e}"))
                                }
                            }
                        }
                    }
                };

                self.logger.log_tool_result(name, arguments, &result);
                self.context.append_tool(&result, &tool_call.id, name);
            }
        }

        format!(
            "Task couldn't be completed after {} steps.",
            self.settings.max_steps
        )
    }

    /// History with the enabled plugins' prompt extensions appended to the
    /// system message, for the outgoing request only.
    async fn messages_with_extensions(&self) -> Vec<Message> {
        let (messages, _) = self.context.context();
        let mut messages = messages.to_vec();

        if let Some(registry) = &self.plugins {
            let extensions = registry.prompt_extensions(&self.plugin_context()).await;
            if !extensions.is_empty() {
                if let Some(system) = messages.first_mut() {
                    let base = system.content.as_text();
                    system.content = format!("{base}\n\n{extensions}").into();
                }
            }
        }
        messages
    }
}

/// Tool arguments must be a JSON object, and arguments preserved verbatim
/// from unparseable wire JSON are a protocol violation for that call.
fn valid_arguments(arguments: &serde_json::Value) -> bool {
    match arguments.as_object() {
        Some(map) => !(map.len() == 1 && map.contains_key(RAW_ARGUMENTS_KEY)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_arguments() {
        assert!(valid_arguments(&json!({})));
        assert!(valid_arguments(&json!({"expr": "2+2"})));
        assert!(!valid_arguments(&json!("not an object")));
        assert!(!valid_arguments(&json!([1, 2])));
        assert!(!valid_arguments(&json!({RAW_ARGUMENTS_KEY: "{broken"})));
        // a real parameter named like the marker is still fine alongside others
        assert!(valid_arguments(&json!({RAW_ARGUMENTS_KEY: "x", "other": 1})));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = AgentSettings::default();
        assert_eq!(settings.max_steps, 50);
        assert_eq!(settings.token_limit, 80_000);
        assert_eq!(settings.retry.max_attempts, 3);
    }
}
