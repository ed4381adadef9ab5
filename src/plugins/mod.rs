//! Plugin and reply-handler pipeline
//!
//! Plugins straddle the agent loop: upstream of each model call they
//! contribute **prompt extensions** that are appended to the base system
//! prompt, and downstream they contribute **reply handlers** that rewrite
//! the assistant's text output and trigger side effects (timers,
//! notifications, shell scripts) from in-text tags.
//!
//! The registry is flat and keyed by plugin id: handlers carry their
//! plugin's id, not a back-pointer, and all dispatch goes through the
//! registry. Hot reload is supported at the surface level only — a plugin
//! can be replaced by re-registering its id — with no runtime code
//! replacement.

mod notify;
mod shell;
mod timer;

pub use notify::{NotificationBackend, NotificationConfig, NotificationPlugin};
pub use shell::ShellPlugin;
pub use timer::{RepeatStrategy, TimerPlugin, TimerStorage, TimerTask};

use crate::types::Message;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

// ============================================================================
// METADATA & CONTEXT
// ============================================================================

/// How a plugin is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    /// In-process Rust plugin.
    Native,
    /// External `.sh` script spoken to over stdin/stdout JSON.
    Shell,
    /// External `.ps1` script spoken to over stdin/stdout JSON.
    PowerShell,
}

/// Stable plugin metadata.
#[derive(Debug, Clone)]
pub struct PluginMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub kind: PluginKind,
    /// Initial enabled state; the registry tracks the live state.
    pub enabled: bool,
    pub dependencies: Vec<String>,
    pub config: Value,
}

impl PluginMetadata {
    /// Metadata with the usual defaults (native, enabled, no deps).
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: description.into(),
            author: String::new(),
            kind: PluginKind::Native,
            enabled: true,
            dependencies: Vec::new(),
            config: Value::Null,
        }
    }
}

/// Context passed to plugins during prompt extension and reply handling.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    /// Conversation history (or the recent portion of it).
    pub messages: Vec<Message>,
    /// Platform identifier (e.g. "cli", "web", "discord").
    pub platform: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    /// Runtime configuration exposed to plugins.
    pub config: Value,
    /// Additional context data.
    pub extra: serde_json::Map<String, Value>,
}

impl PluginContext {
    /// The last `count` messages of the history.
    pub fn recent_messages(&self, count: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(count);
        &self.messages[start..]
    }

    /// Role-prefixed preview of the recent history, each message truncated
    /// to 100 characters. Used as timer context snapshots.
    pub fn message_summary(&self) -> String {
        self.recent_messages(5)
            .iter()
            .map(|msg| {
                let role = format!("{:?}", msg.role).to_lowercase();
                let content = msg.content.as_text();
                let preview: String = if content.chars().count() > 100 {
                    format!("{}...", content.chars().take(100).collect::<String>())
                } else {
                    content
                };
                format!("[{role}]: {preview}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// TRAITS
// ============================================================================

/// A plugin: stable metadata, a lifecycle, a prompt contribution and zero
/// or more reply handlers.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable metadata for this plugin.
    fn metadata(&self) -> &PluginMetadata;

    /// Initialise plugin resources. Called once when the plugin is loaded.
    async fn initialise(&self) -> Result<()>;

    /// Release plugin resources. Called on unload or process shutdown.
    async fn shutdown(&self) -> Result<()>;

    /// Text appended to the base system prompt before each model call.
    /// Empty string contributes nothing.
    async fn prompt_extension(&self, context: &PluginContext) -> String;

    /// Additional context data exposed to the model or other plugins.
    async fn context_extension(&self, _context: &PluginContext) -> serde_json::Map<String, Value> {
        serde_json::Map::new()
    }

    /// Reply handlers contributed by this plugin.
    fn reply_handlers(&self) -> Vec<Arc<dyn ReplyHandler>> {
        Vec::new()
    }
}

/// A reply handler rewrites assistant text output and may trigger side
/// effects. Handlers run in ascending priority order; returning
/// `continue_ = false` skips the remaining handlers.
#[async_trait]
pub trait ReplyHandler: Send + Sync {
    /// Id of the owning plugin (dispatch goes through the registry, never
    /// through back-pointers).
    fn plugin_id(&self) -> &str;

    /// Handler priority; lower runs earlier.
    fn priority(&self) -> i32 {
        100
    }

    /// Process the reply text. Returns the (possibly rewritten) text and
    /// whether the chain should continue.
    async fn handle(&self, text: &str, context: &PluginContext) -> (String, bool);
}

// ============================================================================
// REGISTRY
// ============================================================================

struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    enabled: bool,
}

/// Flat registry of plugins keyed by id.
///
/// Registration order is preserved for prompt-extension concatenation;
/// reply handlers are re-sorted by priority on every dispatch so replaced
/// plugins slot in correctly.
#[derive(Default)]
pub struct PluginRegistry {
    entries: Mutex<Vec<PluginEntry>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. An existing plugin with the same id is replaced.
    pub fn register(&self, plugin: Arc<dyn Plugin>) {
        let id = plugin.metadata().id.clone();
        let enabled = plugin.metadata().enabled;
        let mut entries = self.entries.lock().expect("plugin registry poisoned");
        if let Some(existing) = entries.iter_mut().find(|e| e.plugin.metadata().id == id) {
            log::info!("replacing plugin: {id}");
            existing.plugin = plugin;
            existing.enabled = enabled;
        } else {
            log::info!("registered plugin: {id}");
            entries.push(PluginEntry { plugin, enabled });
        }
    }

    /// Remove a plugin by id. Returns whether it was present.
    pub fn unregister(&self, plugin_id: &str) -> bool {
        let mut entries = self.entries.lock().expect("plugin registry poisoned");
        let before = entries.len();
        entries.retain(|e| e.plugin.metadata().id != plugin_id);
        before != entries.len()
    }

    /// Look up a plugin by id.
    pub fn get(&self, plugin_id: &str) -> Option<Arc<dyn Plugin>> {
        self.entries
            .lock()
            .expect("plugin registry poisoned")
            .iter()
            .find(|e| e.plugin.metadata().id == plugin_id)
            .map(|e| e.plugin.clone())
    }

    /// All registered plugins, in registration order.
    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.entries
            .lock()
            .expect("plugin registry poisoned")
            .iter()
            .map(|e| e.plugin.clone())
            .collect()
    }

    fn set_enabled(&self, plugin_id: &str, enabled: bool) -> bool {
        let mut entries = self.entries.lock().expect("plugin registry poisoned");
        match entries.iter_mut().find(|e| e.plugin.metadata().id == plugin_id) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Enable a plugin. Returns whether it exists.
    pub fn enable(&self, plugin_id: &str) -> bool {
        self.set_enabled(plugin_id, true)
    }

    /// Disable a plugin (its extensions and handlers stop running).
    pub fn disable(&self, plugin_id: &str) -> bool {
        self.set_enabled(plugin_id, false)
    }

    fn enabled_plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.entries
            .lock()
            .expect("plugin registry poisoned")
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.plugin.clone())
            .collect()
    }

    /// Concatenated prompt extensions of all enabled plugins, blank-line
    /// separated, in registration order. Empty when nothing contributes.
    pub async fn prompt_extensions(&self, context: &PluginContext) -> String {
        let mut parts = Vec::new();
        for plugin in self.enabled_plugins() {
            let extension = plugin.prompt_extension(context).await;
            if !extension.trim().is_empty() {
                parts.push(extension.trim().to_string());
            }
        }
        parts.join("\n\n")
    }

    /// Reply handlers of all enabled plugins, sorted ascending by priority.
    pub fn reply_handlers(&self) -> Vec<Arc<dyn ReplyHandler>> {
        let mut handlers: Vec<Arc<dyn ReplyHandler>> = self
            .enabled_plugins()
            .iter()
            .flat_map(|p| p.reply_handlers())
            .collect();
        handlers.sort_by_key(|h| h.priority());
        handlers
    }

    /// Run the reply-handler chain over assistant text. A handler returning
    /// `continue_ = false` short-circuits the rest of the chain.
    pub async fn apply_reply_handlers(&self, text: String, context: &PluginContext) -> String {
        let mut current = text;
        for handler in self.reply_handlers() {
            let (rewritten, continue_) = handler.handle(&current, context).await;
            current = rewritten;
            if !continue_ {
                break;
            }
        }
        current
    }

    /// Shut down every registered plugin (process teardown).
    pub async fn shutdown_all(&self) {
        for plugin in self.plugins() {
            if let Err(e) = plugin.shutdown().await {
                log::warn!("plugin {} shutdown failed: {e}", plugin.metadata().id);
            }
        }
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock().expect("plugin registry poisoned");
        f.debug_struct("PluginRegistry")
            .field("plugins", &format!("{} registered", entries.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TagPlugin {
        metadata: PluginMetadata,
        extension: String,
        handlers: Vec<Arc<dyn ReplyHandler>>,
    }

    #[async_trait]
    impl Plugin for TagPlugin {
        fn metadata(&self) -> &PluginMetadata {
            &self.metadata
        }

        async fn initialise(&self) -> Result<()> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<()> {
            Ok(())
        }

        async fn prompt_extension(&self, _context: &PluginContext) -> String {
            self.extension.clone()
        }

        fn reply_handlers(&self) -> Vec<Arc<dyn ReplyHandler>> {
            self.handlers.clone()
        }
    }

    struct SuffixHandler {
        plugin_id: String,
        suffix: String,
        priority: i32,
        continue_: bool,
    }

    #[async_trait]
    impl ReplyHandler for SuffixHandler {
        fn plugin_id(&self) -> &str {
            &self.plugin_id
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn handle(&self, text: &str, _context: &PluginContext) -> (String, bool) {
            (format!("{text}{}", self.suffix), self.continue_)
        }
    }

    fn plugin(id: &str, extension: &str, handlers: Vec<Arc<dyn ReplyHandler>>) -> Arc<TagPlugin> {
        Arc::new(TagPlugin {
            metadata: PluginMetadata::new(id, id, "1.0.0", "test plugin"),
            extension: extension.into(),
            handlers,
        })
    }

    fn suffix(id: &str, suffix: &str, priority: i32, continue_: bool) -> Arc<dyn ReplyHandler> {
        Arc::new(SuffixHandler {
            plugin_id: id.into(),
            suffix: suffix.into(),
            priority,
            continue_,
        })
    }

    #[tokio::test]
    async fn test_prompt_extensions_concatenate_in_order() {
        let registry = PluginRegistry::new();
        registry.register(plugin("a", "## A", vec![]));
        registry.register(plugin("b", "", vec![]));
        registry.register(plugin("c", "## C", vec![]));

        let joined = registry.prompt_extensions(&PluginContext::default()).await;
        assert_eq!(joined, "## A\n\n## C");
    }

    #[tokio::test]
    async fn test_disabled_plugin_contributes_nothing() {
        let registry = PluginRegistry::new();
        registry.register(plugin("a", "## A", vec![suffix("a", "!", 10, true)]));
        assert!(registry.disable("a"));

        let joined = registry.prompt_extensions(&PluginContext::default()).await;
        assert!(joined.is_empty());
        assert!(registry.reply_handlers().is_empty());

        assert!(registry.enable("a"));
        assert_eq!(registry.reply_handlers().len(), 1);
    }

    #[tokio::test]
    async fn test_handlers_run_in_priority_order() {
        let registry = PluginRegistry::new();
        registry.register(plugin("late", "", vec![suffix("late", "2", 60, true)]));
        registry.register(plugin("early", "", vec![suffix("early", "1", 50, true)]));

        let out = registry
            .apply_reply_handlers("x".into(), &PluginContext::default())
            .await;
        assert_eq!(out, "x12");
    }

    #[tokio::test]
    async fn test_chain_short_circuits() {
        let registry = PluginRegistry::new();
        registry.register(plugin("stop", "", vec![suffix("stop", "1", 10, false)]));
        registry.register(plugin("never", "", vec![suffix("never", "2", 20, true)]));

        let out = registry
            .apply_reply_handlers("x".into(), &PluginContext::default())
            .await;
        assert_eq!(out, "x1");
    }

    #[test]
    fn test_register_replaces_by_id() {
        let registry = PluginRegistry::new();
        registry.register(plugin("a", "old", vec![]));
        registry.register(plugin("a", "new", vec![]));

        assert_eq!(registry.plugins().len(), 1);
        let ext =
            tokio_test::block_on(registry.prompt_extensions(&PluginContext::default()));
        assert_eq!(ext, "new");
    }

    #[test]
    fn test_unregister() {
        let registry = PluginRegistry::new();
        registry.register(plugin("a", "x", vec![]));
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn test_message_summary_truncates() {
        let long = "y".repeat(250);
        let context = PluginContext {
            messages: vec![Message::user(long)],
            ..Default::default()
        };
        let summary = context.message_summary();
        assert!(summary.starts_with("[user]:"));
        assert!(summary.ends_with("..."));
        assert!(summary.len() < 130);
    }
}
