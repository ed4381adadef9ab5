//! # Configuration for the model backend
//!
//! This module defines the wire dialect selection and the validated client
//! configuration. Two dialects are supported interchangeably:
//!
//! - **Block-style** (`Dialect::Blocks`): chat with typed content blocks,
//!   system prompt carried out-of-band, POST `{api_base}/v1/messages`.
//! - **Chat-completions** (`Dialect::ChatCompletions`): one flat message
//!   list, tool arguments JSON-string encoded, POST
//!   `{api_base}/chat/completions`.
//!
//! ## Environment Variables
//!
//! - `YE_AGENT_API_KEY`: API key
//! - `YE_AGENT_API_BASE`: override the endpoint base URL
//! - `YE_AGENT_MODEL`: override the model name
//! - `YE_AGENT_PROVIDER`: dialect tag (`blocks` / `chat-completions`)
//!
//! ## Examples
//!
//! ```rust,no_run
//! use ye_agent::{Dialect, LlmConfig};
//!
//! let config = LlmConfig::builder()
//!     .api_key("sk-...")
//!     .api_base("https://api.example.com/anthropic")
//!     .model("m2-large")
//!     .dialect(Dialect::Blocks)
//!     .build()
//!     .unwrap();
//! ```

use crate::Error;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// DIALECT
// ============================================================================

/// Wire dialect spoken by the model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Typed content blocks, out-of-band system prompt (`/v1/messages`).
    Blocks,

    /// Flat message list, JSON-string tool arguments (`/chat/completions`).
    ChatCompletions,
}

impl Dialect {
    /// Default `max_tokens` for this dialect. Block-style backends tolerate
    /// long generations; local chat-completions servers usually don't.
    pub fn default_max_tokens(&self) -> u32 {
        match self {
            Dialect::Blocks => 16384,
            Dialect::ChatCompletions => 2048,
        }
    }
}

impl FromStr for Dialect {
    type Err = Error;

    /// Parse a dialect tag, case-insensitively, accepting the naming
    /// variations that show up in configuration files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blocks" | "block" | "messages" | "anthropic" => Ok(Dialect::Blocks),
            "chat-completions" | "chat_completions" | "completions" | "openai"
            | "openai-compatible" => Ok(Dialect::ChatCompletions),
            _ => Err(Error::config(format!("Unknown provider tag: {s}"))),
        }
    }
}

// ============================================================================
// CLIENT CONFIGURATION
// ============================================================================

/// Validated configuration for an [`LlmClient`](crate::LlmClient).
#[derive(Clone)]
pub struct LlmConfig {
    api_key: String,
    api_base: String,
    model: String,
    dialect: Dialect,
    max_tokens: u32,
    timeout: Duration,
}

/// Debug output masks the API key so configs are safe to log.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"***")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("dialect", &self.dialect)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LlmConfig {
    /// Creates a new builder.
    pub fn builder() -> LlmConfigBuilder {
        LlmConfigBuilder::default()
    }

    /// Build a config from `YE_AGENT_*` environment variables.
    ///
    /// `YE_AGENT_API_KEY` is required; `YE_AGENT_API_BASE`, `YE_AGENT_MODEL`
    /// and `YE_AGENT_PROVIDER` fall back to the supplied defaults.
    pub fn from_env(
        default_base: &str,
        default_model: &str,
        default_dialect: Dialect,
    ) -> crate::Result<Self> {
        let api_key = env::var("YE_AGENT_API_KEY")
            .map_err(|_| Error::config("YE_AGENT_API_KEY is not set"))?;

        let mut builder = Self::builder()
            .api_key(api_key)
            .api_base(env::var("YE_AGENT_API_BASE").unwrap_or_else(|_| default_base.to_string()))
            .model(env::var("YE_AGENT_MODEL").unwrap_or_else(|_| default_model.to_string()));

        builder = match env::var("YE_AGENT_PROVIDER") {
            Ok(tag) => builder.dialect(tag.parse()?),
            Err(_) => builder.dialect(default_dialect),
        };

        builder.build()
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Transport-level timeout applied to each HTTP request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Builder for [`LlmConfig`] with validation.
///
/// Required fields: `api_key`, `api_base`, `model`. A missing credential or
/// malformed base URL is a configuration error, which is fatal at session
/// creation time.
#[derive(Default)]
pub struct LlmConfigBuilder {
    api_key: Option<String>,
    api_base: Option<String>,
    model: Option<String>,
    dialect: Option<Dialect>,
    max_tokens: Option<u32>,
    timeout: Option<Duration>,
}

impl LlmConfigBuilder {
    /// Sets the API key (required).
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the endpoint base URL (required). Must start with `http://` or
    /// `https://`; the dialect-specific path is appended per request.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// Sets the model identifier (required).
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the wire dialect. Defaults to [`Dialect::Blocks`].
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Sets the generation cap. Defaults to the dialect's value.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Sets the per-request HTTP timeout. Defaults to 120 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validates and builds the final [`LlmConfig`].
    pub fn build(self) -> crate::Result<LlmConfig> {
        let api_key = self
            .api_key
            .ok_or_else(|| Error::config("api_key is required"))?;
        if api_key.trim().is_empty() {
            return Err(Error::config("api_key cannot be empty"));
        }

        let api_base = self
            .api_base
            .ok_or_else(|| Error::config("api_base is required"))?;
        if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
            return Err(Error::config(
                "api_base must start with http:// or https://",
            ));
        }

        let model = self
            .model
            .ok_or_else(|| Error::config("model is required"))?;
        if model.trim().is_empty() {
            return Err(Error::config("model cannot be empty or whitespace"));
        }

        let dialect = self.dialect.unwrap_or(Dialect::Blocks);

        let max_tokens = self.max_tokens.unwrap_or_else(|| dialect.default_max_tokens());
        if max_tokens == 0 {
            return Err(Error::config("max_tokens must be greater than 0"));
        }

        Ok(LlmConfig {
            api_key,
            // Trailing slashes would double up when the path is appended
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            dialect,
            max_tokens,
            timeout: self.timeout.unwrap_or(Duration::from_secs(120)),
        })
    }
}
