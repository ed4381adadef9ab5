//! Session management
//!
//! [`SessionManager`] keeps a table of isolated, concurrent conversations.
//! Each session owns its working directory, its own workspace-bound tool
//! instances, its own agent (and therefore message history) and a cancel
//! flag. Stateless tools are shared across sessions by reference; the only
//! other shared object is the model client.
//!
//! The table mutex guards table mutations only — it is never held across a
//! running agent loop. At-most-one active run per session is enforced by
//! the per-session agent mutex: concurrent dispatches to the same session
//! queue up, while different sessions run in parallel.

use crate::agent::{Agent, AgentSettings, PluginIdentity};
use crate::client::ChatModel;
use crate::plugins::PluginRegistry;
use crate::tools::Tool;
use crate::workspace::{file_tools, WorkspaceRoot};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Configuration for an external tool server attached to a session. The
/// servers themselves are external collaborators; the runtime only carries
/// their configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("session_id", &self.session_id)
            .field("cwd", &self.cwd)
            .field("mcp_servers", &self.mcp_servers)
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// State for a single live session.
pub struct SessionState {
    pub session_id: String,
    pub cwd: String,
    /// The session's agent; the mutex serialises runs.
    pub agent: Mutex<Agent>,
    pub mcp_servers: Vec<McpServerConfig>,
    cancel_flag: Arc<AtomicBool>,
    completed: AtomicBool,
}

impl SessionState {
    /// Raise the session's cancel flag. The agent loop observes it at its
    /// next suspension point; in-flight tool executions run to completion.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    /// Mark the session completed. Further dispatches are refused.
    pub fn complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

/// Keyed table of live conversations.
pub struct SessionManager {
    model: Arc<dyn ChatModel>,
    shared_tools: Vec<Arc<Tool>>,
    system_prompt: String,
    settings: AgentSettings,
    plugins: Option<Arc<PluginRegistry>>,
    platform: String,
    sessions: Mutex<HashMap<String, Arc<SessionState>>>,
}

impl SessionManager {
    /// Create a manager. `shared_tools` are stateless tools reused by
    /// reference across sessions; workspace-bound file tools are
    /// constructed per session against its working directory.
    pub fn new(
        model: Arc<dyn ChatModel>,
        shared_tools: Vec<Arc<Tool>>,
        system_prompt: impl Into<String>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            model,
            shared_tools,
            system_prompt: system_prompt.into(),
            settings,
            plugins: None,
            platform: "session".to_string(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a plugin registry handed to every session's agent.
    pub fn with_plugins(mut self, registry: Arc<PluginRegistry>, platform: impl Into<String>) -> Self {
        self.plugins = Some(registry);
        self.platform = platform.into();
        self
    }

    /// Create a new session bound to `cwd`. Fails if the id is already
    /// live.
    pub async fn create(
        &self,
        session_id: impl Into<String>,
        cwd: impl Into<String>,
        mcp_servers: Vec<McpServerConfig>,
    ) -> Result<Arc<SessionState>> {
        let session_id = session_id.into();
        let cwd = cwd.into();

        {
            let sessions = self.sessions.lock().await;
            if sessions.contains_key(&session_id) {
                return Err(Error::SessionExists(session_id));
            }
        }

        // Build outside the table lock: workspace setup touches the
        // filesystem and must not block other sessions.
        let root = Arc::new(WorkspaceRoot::new(&cwd)?);
        let mut session_tools = self.shared_tools.clone();
        session_tools.extend(file_tools(&root).into_iter().map(Arc::new));

        let mut agent = Agent::new(
            self.model.clone(),
            self.system_prompt.clone(),
            session_tools,
            &cwd,
            self.settings.clone(),
        )?;
        if let Some(registry) = &self.plugins {
            agent.set_plugins(
                registry.clone(),
                PluginIdentity {
                    platform: self.platform.clone(),
                    user_id: None,
                    session_id: Some(session_id.clone()),
                },
            );
        }

        let state = Arc::new(SessionState {
            session_id: session_id.clone(),
            cwd,
            cancel_flag: agent.cancel_flag(),
            agent: Mutex::new(agent),
            mcp_servers,
            completed: AtomicBool::new(false),
        });

        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session_id) {
            return Err(Error::SessionExists(session_id));
        }
        sessions.insert(session_id, state.clone());
        Ok(state)
    }

    /// Look up a session.
    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionState>> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Raise the session's cancel flag and drop it from the table. Any
    /// in-flight run observes the flag at its next suspension point.
    pub async fn remove(&self, session_id: &str) {
        let removed = self.sessions.lock().await.remove(session_id);
        if let Some(session) = removed {
            session.cancel();
        }
    }

    /// Raise the cancel flag without removing the session.
    pub async fn cancel(&self, session_id: &str) {
        if let Some(session) = self.get(session_id).await {
            session.cancel();
        }
    }

    /// Mark a session completed; later dispatches are refused with a
    /// distinct status.
    pub async fn complete(&self, session_id: &str) -> Result<()> {
        match self.get(session_id).await {
            Some(session) => {
                session.complete();
                Ok(())
            }
            None => Err(Error::UnknownSession(session_id.to_string())),
        }
    }

    /// The logical session endpoint: append one user message and run the
    /// loop to its terminal answer.
    ///
    /// Unknown sessions and completed sessions are refused with distinct
    /// errors. Runs on the same session are serialised; different sessions
    /// proceed in parallel.
    pub async fn dispatch(
        &self,
        session_id: &str,
        user_id: Option<String>,
        message: impl Into<String>,
    ) -> Result<String> {
        let session = self
            .get(session_id)
            .await
            .ok_or_else(|| Error::UnknownSession(session_id.to_string()))?;

        if session.is_completed() {
            return Err(Error::SessionCompleted(session_id.to_string()));
        }

        let mut agent = session.agent.lock().await;
        agent.set_user(user_id);
        agent.append_user_message(message.into());
        Ok(agent.run().await)
    }

    /// Ids of all live sessions.
    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }
}
