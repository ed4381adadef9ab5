//! Workspace sandbox and file tools
//!
//! Every file-touching tool is constructed against a [`WorkspaceRoot`]: all
//! path arguments are resolved relative to that root and canonicalised, and
//! any path whose canonical form is not a descendant of the root is
//! rejected. File tools are therefore not shareable across sessions — the
//! session manager re-instantiates them against each session's working
//! directory.

use crate::tools::{tool, Tool};
use crate::types::ToolResult;
use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// A canonicalised workspace root that confines path resolution.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    /// Create (if needed) and canonicalise the workspace root.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::config(format!("cannot create workspace {}: {e}", root.display())))?;
        let root = root
            .canonicalize()
            .map_err(|e| Error::config(format!("cannot canonicalise workspace {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    /// The canonical root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied path against the root.
    ///
    /// The argument is joined to the root, normalised lexically (so `..`
    /// cannot climb out), and — for the portion that already exists on disk
    /// — canonicalised so symlinks cannot escape either. Any result outside
    /// the root is an [`Error::Sandbox`].
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let candidate = self.root.join(path);

        // Lexical normalisation: fold out `.` and `..` without touching disk
        let mut normalized = PathBuf::new();
        for component in candidate.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(Error::sandbox(path.to_string()));
                    }
                }
                other => normalized.push(other),
            }
        }

        if !normalized.starts_with(&self.root) {
            return Err(Error::sandbox(path.to_string()));
        }

        // Canonicalise the existing prefix so a symlink inside the
        // workspace cannot point resolution outside it.
        let mut existing = normalized.clone();
        let mut tail = Vec::new();
        while !existing.exists() {
            match existing.file_name() {
                Some(name) => {
                    tail.push(name.to_os_string());
                    existing.pop();
                }
                None => break,
            }
        }
        let mut resolved = existing
            .canonicalize()
            .map_err(|e| Error::sandbox(format!("{path}: {e}")))?;
        for part in tail.iter().rev() {
            resolved.push(part);
        }

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(Error::sandbox(path.to_string()))
        }
    }
}

/// Build the standard file tool set bound to one workspace root.
///
/// These are the tools the session manager reconstructs per session.
pub fn file_tools(root: &Arc<WorkspaceRoot>) -> Vec<Tool> {
    vec![
        read_file_tool(root.clone()),
        write_file_tool(root.clone()),
        edit_file_tool(root.clone()),
    ]
}

fn str_arg(args: &serde_json::Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// `read_file {path}` — read a UTF-8 file inside the workspace.
pub fn read_file_tool(root: Arc<WorkspaceRoot>) -> Tool {
    tool("read_file", "Read a text file from the workspace. Paths are relative to the workspace root.")
        .param("path", "string")
        .build(move |args| {
            let root = root.clone();
            async move {
                let Some(path) = str_arg(&args, "path") else {
                    return Ok(ToolResult::fail("missing required parameter: path"));
                };
                let resolved = match root.resolve(&path) {
                    Ok(p) => p,
                    Err(e) => return Ok(ToolResult::fail(e.to_string())),
                };
                match tokio::fs::read_to_string(&resolved).await {
                    Ok(content) => Ok(ToolResult::ok(content)),
                    Err(e) => Ok(ToolResult::fail(format!("cannot read {path}: {e}"))),
                }
            }
        })
}

/// `write_file {path, content}` — create or overwrite a file inside the
/// workspace, creating parent directories on demand.
pub fn write_file_tool(root: Arc<WorkspaceRoot>) -> Tool {
    tool("write_file", "Write a text file into the workspace, creating parent directories as needed.")
        .param("path", "string")
        .param("content", "string")
        .build(move |args| {
            let root = root.clone();
            async move {
                let Some(path) = str_arg(&args, "path") else {
                    return Ok(ToolResult::fail("missing required parameter: path"));
                };
                let Some(content) = str_arg(&args, "content") else {
                    return Ok(ToolResult::fail("missing required parameter: content"));
                };
                let resolved = match root.resolve(&path) {
                    Ok(p) => p,
                    Err(e) => return Ok(ToolResult::fail(e.to_string())),
                };
                if let Some(parent) = resolved.parent() {
                    if let Err(e) = tokio::fs::create_dir_all(parent).await {
                        return Ok(ToolResult::fail(format!("cannot create {path}: {e}")));
                    }
                }
                match tokio::fs::write(&resolved, content.as_bytes()).await {
                    Ok(()) => Ok(ToolResult::ok(format!(
                        "Wrote {} bytes to {path}",
                        content.len()
                    ))),
                    Err(e) => Ok(ToolResult::fail(format!("cannot write {path}: {e}"))),
                }
            }
        })
}

/// `edit_file {path, old_string, new_string}` — replace one exact
/// occurrence of `old_string`. The needle must exist and be unique.
pub fn edit_file_tool(root: Arc<WorkspaceRoot>) -> Tool {
    tool("edit_file", "Replace an exact string in a workspace file. The old string must occur exactly once.")
        .param("path", "string")
        .param("old_string", "string")
        .param("new_string", "string")
        .build(move |args| {
            let root = root.clone();
            async move {
                let (Some(path), Some(old), Some(new)) = (
                    str_arg(&args, "path"),
                    str_arg(&args, "old_string"),
                    str_arg(&args, "new_string"),
                ) else {
                    return Ok(ToolResult::fail(
                        "missing required parameters: path, old_string, new_string",
                    ));
                };
                let resolved = match root.resolve(&path) {
                    Ok(p) => p,
                    Err(e) => return Ok(ToolResult::fail(e.to_string())),
                };
                let content = match tokio::fs::read_to_string(&resolved).await {
                    Ok(c) => c,
                    Err(e) => return Ok(ToolResult::fail(format!("cannot read {path}: {e}"))),
                };

                let occurrences = content.matches(&old).count();
                if occurrences == 0 {
                    return Ok(ToolResult::fail(format!("old_string not found in {path}")));
                }
                if occurrences > 1 {
                    return Ok(ToolResult::fail(format!(
                        "old_string occurs {occurrences} times in {path}; it must be unique"
                    )));
                }

                let updated = content.replacen(&old, &new, 1);
                match tokio::fs::write(&resolved, updated.as_bytes()).await {
                    Ok(()) => Ok(ToolResult::ok(format!("Edited {path}"))),
                    Err(e) => Ok(ToolResult::fail(format!("cannot write {path}: {e}"))),
                }
            }
        })
}
