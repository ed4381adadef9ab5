//! Shell script plugins
//!
//! A shell plugin wraps a `.sh` or `.ps1` file behind the [`Plugin`]
//! surface. The contract is stdin/stdout JSON: the runtime writes
//! `{"action": A, "data": {...}}` to the script's stdin and reads a JSON
//! object from stdout whose `success` field drives acceptance. The actions
//! issued are `get_prompt` (returns `{prompt}`) and `get_context` (returns
//! `{context}`). Non-zero exit or non-JSON output degrades to an empty
//! contribution and is logged — a broken script never breaks the run.
//!
//! Scripts can override their metadata through header comments:
//!
//! ```sh
//! # PLUGIN_ID: greeter
//! # PLUGIN_NAME: Greeter
//! # PLUGIN_VERSION: 2.0.0
//! # PLUGIN_DESCRIPTION: Greets the user
//! ```

use super::{Plugin, PluginContext, PluginKind, PluginMetadata};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Wrapper turning a `.sh`/`.ps1` script into a plugin.
pub struct ShellPlugin {
    metadata: PluginMetadata,
    script_path: PathBuf,
    interpreter: &'static str,
}

impl ShellPlugin {
    /// Load a script plugin. The script must exist and carry a supported
    /// extension; metadata header comments are read immediately.
    pub fn load(script_path: impl Into<PathBuf>) -> Result<Self> {
        let script_path = script_path.into();

        let (kind, interpreter) = match script_path.extension().and_then(|e| e.to_str()) {
            Some("sh") => (PluginKind::Shell, "bash"),
            Some("ps1") => (
                PluginKind::PowerShell,
                if cfg!(windows) { "powershell" } else { "pwsh" },
            ),
            other => {
                return Err(Error::invalid_input(format!(
                    "unsupported script type: {other:?}"
                )));
            }
        };

        if !script_path.exists() {
            return Err(Error::invalid_input(format!(
                "script not found: {}",
                script_path.display()
            )));
        }

        let stem = script_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("script")
            .to_string();
        let mut metadata = PluginMetadata::new(
            format!("shell_{stem}"),
            stem.replace('_', " "),
            "1.0.0",
            format!("Shell plugin: {}", script_path.display()),
        );
        metadata.kind = kind;

        apply_header_metadata(&script_path, &mut metadata);

        Ok(Self {
            metadata,
            script_path,
            interpreter,
        })
    }

    /// Run the script with one action. Always returns an object; failures
    /// are reported as `{"success": false, "error": ...}`.
    pub async fn execute_script(&self, action: &str, data: Value) -> Value {
        let input = json!({ "action": action, "data": data });

        let spawn = Command::new(self.interpreter)
            .arg(&self.script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawn {
            Ok(child) => child,
            Err(e) => {
                log::warn!("cannot spawn {}: {e}", self.script_path.display());
                return json!({"success": false, "error": e.to_string()});
            }
        };

        if let Some(stdin) = child.stdin.as_mut() {
            let payload = input.to_string();
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                log::warn!("cannot write to {}: {e}", self.script_path.display());
                return json!({"success": false, "error": e.to_string()});
            }
        }
        // Close stdin so scripts reading to EOF terminate
        drop(child.stdin.take());

        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(e) => {
                log::warn!("script {} failed: {e}", self.script_path.display());
                return json!({"success": false, "error": e.to_string()});
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            log::warn!("script {} exited non-zero: {stderr}", self.script_path.display());
            return json!({"success": false, "error": stderr});
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        match serde_json::from_str::<Value>(&stdout) {
            Ok(value) => value,
            // Non-JSON output is wrapped rather than rejected
            Err(_) => json!({"success": true, "output": stdout}),
        }
    }
}

/// Read `# PLUGIN_KEY: value` header comments into the metadata.
fn apply_header_metadata(path: &std::path::Path, metadata: &mut PluginMetadata) {
    let Ok(content) = std::fs::read_to_string(path) else {
        log::warn!("could not read metadata from {}", path.display());
        return;
    };

    for line in content.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('#') else {
            continue;
        };
        let Some((key, value)) = rest.trim().split_once(':') else {
            continue;
        };
        let Some(key) = key.trim().strip_prefix("PLUGIN_") else {
            continue;
        };
        let value = value.trim().to_string();

        match key.to_lowercase().as_str() {
            "id" => metadata.id = value,
            "name" => metadata.name = value,
            "version" => metadata.version = value,
            "description" => metadata.description = value,
            _ => {}
        }
    }
}

#[async_trait]
impl Plugin for ShellPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    async fn initialise(&self) -> Result<()> {
        if !self.script_path.exists() {
            return Err(Error::invalid_input(format!(
                "script not found: {}",
                self.script_path.display()
            )));
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn prompt_extension(&self, context: &PluginContext) -> String {
        let data = json!({
            "platform": context.platform,
            "user_id": context.user_id,
            "session_id": context.session_id,
        });
        let result = self.execute_script("get_prompt", data).await;
        if result.get("success").and_then(Value::as_bool) == Some(true) {
            result
                .get("prompt")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        } else {
            String::new()
        }
    }

    async fn context_extension(&self, context: &PluginContext) -> serde_json::Map<String, Value> {
        let data = json!({
            "platform": context.platform,
            "user_id": context.user_id,
            "session_id": context.session_id,
        });
        let result = self.execute_script("get_context", data).await;
        if result.get("success").and_then(Value::as_bool) == Some(true) {
            result
                .get("context")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default()
        } else {
            serde_json::Map::new()
        }
    }
}
