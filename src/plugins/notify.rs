//! Notification plugin: desktop notifications driven by in-text tags
//!
//! The model requests a desktop notification with
//! `<notify title="..." message="..." />`; a reply handler at priority 60
//! dispatches it to a platform backend (`notify-send` on Linux,
//! `osascript` on macOS, a PowerShell toast on Windows) and replaces the
//! tag with a success or failure glyph.

use super::{Plugin, PluginContext, PluginMetadata, ReplyHandler};
use crate::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tokio::process::Command;

const PLUGIN_ID: &str = "notification";

/// Notification configuration.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// A platform notification backend.
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    /// Deliver one notification. Returns whether delivery succeeded.
    async fn send(&self, title: &str, message: &str) -> bool;
}

/// `notify-send`-based backend for Linux desktops.
struct LinuxBackend;

#[async_trait]
impl NotificationBackend for LinuxBackend {
    async fn send(&self, title: &str, message: &str) -> bool {
        let result = Command::new("notify-send")
            .arg(title)
            .arg(message)
            .args(["-u", "normal", "-i", "dialog-information"])
            .output()
            .await;
        match result {
            Ok(output) => output.status.success(),
            Err(e) => {
                log::warn!("notify-send failed: {e}");
                false
            }
        }
    }
}

/// `osascript`-based backend for macOS.
struct MacOsBackend;

#[async_trait]
impl NotificationBackend for MacOsBackend {
    async fn send(&self, title: &str, message: &str) -> bool {
        // Quotes inside the AppleScript string literal would terminate it
        let title = title.replace('"', "\\\"");
        let message = message.replace('"', "\\\"");
        let script = format!(r#"display notification "{message}" with title "{title}""#);
        let result = Command::new("osascript").args(["-e", &script]).output().await;
        match result {
            Ok(output) => output.status.success(),
            Err(e) => {
                log::warn!("osascript failed: {e}");
                false
            }
        }
    }
}

/// PowerShell toast backend for Windows.
struct WindowsBackend;

#[async_trait]
impl NotificationBackend for WindowsBackend {
    async fn send(&self, title: &str, message: &str) -> bool {
        let script = format!(
            r#"[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null
[Windows.Data.Xml.Dom.XmlDocument, Windows.Data.Xml.Dom.XmlDocument, ContentType = WindowsRuntime] | Out-Null

$template = @"
<toast>
    <visual>
        <binding template="ToastText02">
            <text id="1">{title}</text>
            <text id="2">{message}</text>
        </binding>
    </visual>
</toast>
"@

$xml = New-Object Windows.Data.Xml.Dom.XmlDocument
$xml.LoadXml($template)
$toast = [Windows.UI.Notifications.ToastNotification]::new($xml)
$notifier = [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier("ye-agent")
$notifier.Show($toast)"#
        );
        let result = Command::new("powershell")
            .args(["-NoProfile", "-Command", &script])
            .output()
            .await;
        match result {
            Ok(output) => output.status.success(),
            Err(e) => {
                log::warn!("powershell toast failed: {e}");
                false
            }
        }
    }
}

/// Pick the backend for the current platform, if one exists.
fn platform_backend() -> Option<Arc<dyn NotificationBackend>> {
    match std::env::consts::OS {
        "linux" => Some(Arc::new(LinuxBackend)),
        "macos" => Some(Arc::new(MacOsBackend)),
        "windows" => Some(Arc::new(WindowsBackend)),
        other => {
            log::warn!("no notification backend for platform: {other}");
            None
        }
    }
}

fn notify_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<notify\s+title=["']([^"']+)["']\s+message=["']([^"']+)["']\s*/?>"#)
            .expect("notify pattern")
    })
}

struct NotificationReplyHandler {
    config: NotificationConfig,
    backend: Option<Arc<dyn NotificationBackend>>,
}

impl NotificationReplyHandler {
    async fn dispatch(&self, title: &str, message: &str) -> bool {
        if !self.config.enabled {
            log::debug!("notifications disabled");
            return false;
        }
        match &self.backend {
            Some(backend) => backend.send(title, message).await,
            None => false,
        }
    }
}

#[async_trait]
impl ReplyHandler for NotificationReplyHandler {
    fn plugin_id(&self) -> &str {
        PLUGIN_ID
    }

    fn priority(&self) -> i32 {
        60
    }

    async fn handle(&self, text: &str, _context: &PluginContext) -> (String, bool) {
        let mut output = text.to_string();

        for captures in notify_re().captures_iter(text) {
            let title = &captures[1];
            let message = &captures[2];
            let glyph = if self.dispatch(title, message).await {
                "🔔 notification sent"
            } else {
                "❌ notification failed"
            };
            output = output.replace(&captures[0], glyph);
        }

        (output, true)
    }
}

/// The notification plugin.
pub struct NotificationPlugin {
    metadata: PluginMetadata,
    config: NotificationConfig,
    backend: Option<Arc<dyn NotificationBackend>>,
}

impl NotificationPlugin {
    /// Create with the platform's native backend.
    pub fn new(config: NotificationConfig) -> Self {
        Self::with_backend(config, platform_backend())
    }

    /// Create with an explicit backend (tests, headless deployments).
    pub fn with_backend(
        config: NotificationConfig,
        backend: Option<Arc<dyn NotificationBackend>>,
    ) -> Self {
        Self {
            metadata: PluginMetadata::new(
                PLUGIN_ID,
                "Notification Plugin",
                "1.0.0",
                "Desktop notification support",
            ),
            config,
            backend,
        }
    }

    /// Send one notification directly, bypassing the tag grammar.
    pub async fn send_notification(&self, title: &str, message: &str) -> bool {
        if !self.config.enabled {
            return false;
        }
        match &self.backend {
            Some(backend) => backend.send(title, message).await,
            None => {
                log::warn!("no notification backend available");
                false
            }
        }
    }
}

impl Default for NotificationPlugin {
    fn default() -> Self {
        Self::new(NotificationConfig::default())
    }
}

#[async_trait]
impl Plugin for NotificationPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    async fn initialise(&self) -> Result<()> {
        log::info!(
            "notification plugin initialised (backend: {})",
            if self.backend.is_some() { "available" } else { "none" }
        );
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn prompt_extension(&self, _context: &PluginContext) -> String {
        if !self.config.enabled || self.backend.is_none() {
            return String::new();
        }
        r#"## Notifications

You can send a desktop notification with the `<notify>` tag:

<notify title="Reminder" message="Check your email" />

The tag is processed automatically and the user sees a system notification."#
            .to_string()
    }

    fn reply_handlers(&self) -> Vec<Arc<dyn ReplyHandler>> {
        vec![Arc::new(NotificationReplyHandler {
            config: self.config.clone(),
            backend: self.backend.clone(),
        })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingBackend {
        sent: Mutex<Vec<(String, String)>>,
        succeed: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NotificationBackend for RecordingBackend {
        async fn send(&self, title: &str, message: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            self.succeed
        }
    }

    fn recording(succeed: bool) -> Arc<RecordingBackend> {
        Arc::new(RecordingBackend {
            sent: Mutex::new(Vec::new()),
            succeed,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_notify_tag_success_glyph() {
        let backend = recording(true);
        let plugin =
            NotificationPlugin::with_backend(NotificationConfig::default(), Some(backend.clone()));
        let handlers = plugin.reply_handlers();

        let reply = r#"Done! <notify title="Build" message="All tests green" />"#;
        let (output, continue_) = handlers[0].handle(reply, &PluginContext::default()).await;

        assert!(continue_);
        assert_eq!(output, "Done! 🔔 notification sent");
        let sent = backend.sent.lock().unwrap();
        assert_eq!(sent[0], ("Build".to_string(), "All tests green".to_string()));
    }

    #[tokio::test]
    async fn test_notify_tag_failure_glyph() {
        let plugin = NotificationPlugin::with_backend(
            NotificationConfig::default(),
            Some(recording(false)),
        );
        let handlers = plugin.reply_handlers();

        let (output, _) = handlers[0]
            .handle(r#"<notify title="a" message="b" />"#, &PluginContext::default())
            .await;
        assert_eq!(output, "❌ notification failed");
    }

    #[tokio::test]
    async fn test_disabled_config_never_dispatches() {
        let backend = recording(true);
        let plugin = NotificationPlugin::with_backend(
            NotificationConfig { enabled: false },
            Some(backend.clone()),
        );
        let handlers = plugin.reply_handlers();

        let (output, _) = handlers[0]
            .handle(r#"<notify title="a" message="b" />"#, &PluginContext::default())
            .await;
        assert_eq!(output, "❌ notification failed");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

        // disabled plugins also contribute no prompt text
        assert!(plugin.prompt_extension(&PluginContext::default()).await.is_empty());
    }

    #[tokio::test]
    async fn test_single_quoted_attributes() {
        let backend = recording(true);
        let plugin =
            NotificationPlugin::with_backend(NotificationConfig::default(), Some(backend.clone()));
        let handlers = plugin.reply_handlers();

        let (output, _) = handlers[0]
            .handle("<NOTIFY title='T' message='M'/>", &PluginContext::default())
            .await;
        assert_eq!(output, "🔔 notification sent");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_text_without_tags_untouched() {
        let plugin =
            NotificationPlugin::with_backend(NotificationConfig::default(), Some(recording(true)));
        let handlers = plugin.reply_handlers();

        let reply = "plain answer with <other-tag/>";
        let (output, _) = handlers[0].handle(reply, &PluginContext::default()).await;
        assert_eq!(output, reply);
    }
}
