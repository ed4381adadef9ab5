//! # Tool System
//!
//! A tool exposes a name, a JSON-shaped argument schema and an async
//! `execute` handler producing a [`ToolResult`]. Tools are registered with
//! an agent, advertised to the model as a [`ToolSpec`], and invoked by name
//! when the model emits tool calls.
//!
//! ## Architecture Overview
//!
//! 1. **Tool Definition** - The [`Tool`] struct contains metadata (name,
//!    description, schema) and an async handler function.
//! 2. **Schema Flexibility** - Simple type notation, extended properties
//!    and full JSON Schema are all accepted and normalized to
//!    `{type:"object", properties, required}`.
//! 3. **Async Execution** - Handlers run behind a pinned, boxed future so
//!    heterogeneous closures can live in one registry.
//!
//! Well-behaved handlers do not fail: they report problems through
//! `ToolResult::fail`. A handler that does return `Err` (or a malformed
//! argument shape) is contained by the agent loop and converted into a
//! failed result for that one call.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use ye_agent::{tool, ToolResult};
//!
//! let calc = tool("calc", "Evaluate an arithmetic expression")
//!     .param("expr", "string")
//!     .build(|args| async move {
//!         let expr = args["expr"].as_str().unwrap_or_default();
//!         // evaluate...
//!         Ok(ToolResult::ok(format!("evaluated {expr}")))
//!     });
//! ```

use crate::types::{ToolResult, ToolSpec};
use crate::Result;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for tool handler functions.
///
/// `Arc` lets a tool be shared between the agent's registry and concurrent
/// sessions; `Pin<Box<dyn Future>>` erases the concrete future type so
/// handlers of any shape fit one collection; `Send + Sync` keeps tools
/// usable from multi-threaded runtimes.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<ToolResult>> + Send>> + Send + Sync>;

/// A named, schema-described, asynchronously callable unit of side effect.
///
/// Tools are immutable once created: metadata and handler never change,
/// which makes cloning cheap (the handler is shared through the `Arc`) and
/// concurrent use safe. Tools that capture per-workspace state (see the
/// `workspace` module) must be re-instantiated per session; stateless tools
/// may be shared across sessions by reference.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    input_schema: Value,
    handler: ToolHandler,
}

impl Tool {
    /// Create a new tool.
    ///
    /// `input_schema` may be simple type notation
    /// (`{"expr": "string"}`), extended properties
    /// (`{"expr": {"type": "string", "optional": true}}`) or a full JSON
    /// Schema; all are normalized to the canonical
    /// `{type:"object", properties, required}` shape.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: normalize_schema(input_schema),
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Execute the tool with the provided arguments.
    pub async fn execute(&self, arguments: Value) -> Result<ToolResult> {
        (self.handler)(arguments).await
    }

    /// The canonical `{name, description, input_schema}` shape advertised to
    /// model backends.
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }

    /// Returns the tool's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tool's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns a reference to the tool's input schema.
    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

/// The handler field is omitted: closures have no useful debug form.
impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Starts building a tool with the given name and description.
///
/// Shorthand entry point for [`ToolBuilder`].
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder {
        name: name.into(),
        description: description.into(),
        properties: serde_json::Map::new(),
    }
}

/// Builder for tools with parameter-by-parameter schema construction.
#[derive(Debug)]
pub struct ToolBuilder {
    name: String,
    description: String,
    properties: serde_json::Map<String, Value>,
}

impl ToolBuilder {
    /// Add a required parameter with a simple type (`"string"`, `"number"`,
    /// `"integer"`, `"boolean"`, `"array"`, `"object"`).
    pub fn param(mut self, name: impl Into<String>, type_str: impl Into<String>) -> Self {
        self.properties
            .insert(name.into(), Value::String(type_str.into()));
        self
    }

    /// Add a parameter with an explicit property schema (may carry
    /// `description`, `optional`, `default`, ...).
    pub fn param_schema(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Finish the build with the given async handler.
    pub fn build<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult>> + Send + 'static,
    {
        Tool::new(
            self.name,
            self.description,
            Value::Object(self.properties),
            handler,
        )
    }
}

/// Normalize the accepted schema formats to
/// `{type:"object", properties, required}`.
///
/// - Full JSON Schema (has `type` and `properties`) passes through.
/// - Simple type notation (`{"x": "string"}`) expands each entry via
///   [`type_to_json_schema`]; simple-notation parameters are always
///   required.
/// - Extended property objects keep their schema; the non-standard
///   `optional`/`required` markers are stripped and folded into the
///   `required` array. Parameters with a `default` are optional unless
///   explicitly marked required.
fn normalize_schema(schema: Value) -> Value {
    if let Value::Object(obj) = &schema {
        if obj.contains_key("type") && obj.contains_key("properties") {
            return schema;
        }

        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for (param_name, param_type) in obj {
            if let Some(type_str) = param_type.as_str() {
                properties.insert(param_name.clone(), type_to_json_schema(type_str));
                required.push(param_name.clone());
            } else if param_type.is_object() {
                let mut prop = param_type.clone();
                let prop_obj = prop.as_object_mut().expect("checked is_object above");

                let is_optional = prop_obj
                    .remove("optional")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let is_required = prop_obj.remove("required").and_then(|v| v.as_bool());
                let has_default = prop_obj.contains_key("default");

                properties.insert(param_name.clone(), prop);

                if is_required == Some(true) {
                    required.push(param_name.clone());
                } else if is_optional || is_required == Some(false) {
                    // explicitly optional
                } else if !has_default {
                    required.push(param_name.clone());
                }
            }
        }

        return serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        });
    }

    // Not an object at all: accept anything
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": [],
    })
}

/// Map a friendly type string to a JSON Schema type object. Unknown strings
/// default to `"string"` rather than failing tool creation.
fn type_to_json_schema(type_str: &str) -> Value {
    let json_type = match type_str {
        "string" | "str" => "string",
        "number" | "float" | "f32" | "f64" => "number",
        "integer" | "int" | "i32" | "i64" | "u32" | "u64" => "integer",
        "boolean" | "bool" => "boolean",
        "array" | "list" | "vec" => "array",
        "object" | "dict" | "map" => "object",
        _ => "string",
    };
    serde_json::json!({ "type": json_type })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_tool_execute() {
        let echo = Tool::new(
            "echo",
            "Echo the input back",
            json!({"text": "string"}),
            |args| async move {
                let text = args["text"].as_str().unwrap_or_default().to_string();
                Ok(ToolResult::ok(text))
            },
        );

        let result = echo.execute(json!({"text": "hello"})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.content, "hello");
    }

    #[test]
    fn test_simple_notation_schema() {
        let t = tool("calc", "Calculator")
            .param("expr", "string")
            .param("precision", "integer")
            .build(|_| async { Ok(ToolResult::ok("")) });

        let schema = t.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["expr"]["type"], "string");
        assert_eq!(schema["properties"]["precision"]["type"], "integer");
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 2);
    }

    #[test]
    fn test_extended_schema_optional_params() {
        let t = tool("search", "Search")
            .param_schema("query", json!({"type": "string", "description": "what to find"}))
            .param_schema("limit", json!({"type": "integer", "optional": true}))
            .param_schema("offset", json!({"type": "integer", "default": 0}))
            .build(|_| async { Ok(ToolResult::ok("")) });

        let schema = t.input_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(required, vec!["query"]);
        // non-standard markers are stripped
        assert!(schema["properties"]["limit"].get("optional").is_none());
    }

    #[test]
    fn test_full_schema_passthrough() {
        let full = json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"],
        });
        let t = Tool::new("read", "Read a file", full.clone(), |_| async {
            Ok(ToolResult::ok(""))
        });
        assert_eq!(*t.input_schema(), full);
    }

    #[test]
    fn test_spec_shape() {
        let t = tool("notify", "Send a note")
            .param("message", "string")
            .build(|_| async { Ok(ToolResult::ok("")) });
        let spec = t.spec();
        assert_eq!(spec.name, "notify");
        assert_eq!(spec.description, "Send a note");
        assert_eq!(spec.input_schema["type"], "object");
    }

    #[test]
    fn test_debug_omits_handler() {
        let t = tool("x", "y").build(|_| async { Ok(ToolResult::ok("")) });
        let debug = format!("{t:?}");
        assert!(debug.contains("\"x\""));
        assert!(!debug.contains("handler"));
    }
}
