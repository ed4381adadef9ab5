//! Error types for the agent runtime

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the runtime
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration (fatal at session creation)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error reported by the model backend. `code` carries the HTTP status
    /// or provider soft code when one was present and drives retryability:
    /// 4xx auth/quota/model faults are fatal single-turn failures, 5xx and
    /// soft envelope codes are transient. `hint` carries a human-readable
    /// remediation note (e.g. for auth, balance or unsupported-model codes)
    /// and is appended to the rendered message.
    #[error("API error{}: {message}{}",
        .code.map(|c| format!(" (code {c})")).unwrap_or_default(),
        .hint.as_ref().map(|h| format!("; {h}")).unwrap_or_default())]
    Api {
        code: Option<i64>,
        message: String,
        hint: Option<String>,
    },

    /// All retry attempts failed; carries the attempt count and the final cause
    #[error("retries exhausted after {attempts} attempts: {last_cause}")]
    RetriesExhausted {
        attempts: u32,
        last_cause: Box<Error>,
    },

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A path resolved outside its workspace root
    #[error("Path escapes workspace root: {0}")]
    Sandbox(String),

    /// The run was cancelled cooperatively
    #[error("Run cancelled")]
    Cancelled,

    /// Session id is not known to the session manager
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// Session id is already live
    #[error("Session already exists: {0}")]
    SessionExists(String),

    /// Session was marked completed and refuses new runs
    #[error("Session completed: {0}")]
    SessionCompleted(String),

    /// Timeout error
    #[error("Request timeout")]
    Timeout,

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error without a provider code
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api {
            code: None,
            message: msg.into(),
            hint: None,
        }
    }

    /// Create a new API error carrying a provider status code
    pub fn api_code(code: i64, msg: impl Into<String>, hint: Option<String>) -> Self {
        Error::Api {
            code: Some(code),
            message: msg.into(),
            hint,
        }
    }

    /// Create a new tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new sandbox violation error
    pub fn sandbox(msg: impl Into<String>) -> Self {
        Error::Sandbox(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Whether this error should be retried by the retry policy.
    ///
    /// Transport faults (network errors, timeouts, JSON decode failures and
    /// soft provider error envelopes) are transient. API faults carrying an
    /// HTTP 4xx status — auth, quota, unsupported model — are fatal for the
    /// turn and never retried, as are the provider's balance (1008) and
    /// unsupported-model (2013) soft codes. Configuration, input, sandbox
    /// and session errors are not retryable either.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::Timeout => true,
            Error::Json(_) => true,
            Error::Api { code, .. } => match code {
                // HTTP 4xx: the request itself is rejected, retrying
                // cannot help
                Some(c) if (400..500).contains(c) => false,
                // provider soft codes for balance and unsupported model
                Some(1008) | Some(2013) => false,
                // HTTP 5xx, other soft codes, and unclassified envelopes
                _ => true,
            },
            Error::Config(_) => false,
            Error::InvalidInput(_) => false,
            Error::Sandbox(_) => false,
            Error::Cancelled => false,
            Error::RetriesExhausted { .. } => false,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_config() {
        let err = Error::config("missing api key");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Invalid configuration: missing api key");
    }

    #[test]
    fn test_error_api_plain() {
        let err = Error::api("500 Internal Server Error");
        assert!(matches!(err, Error::Api { code: None, .. }));
        assert_eq!(err.to_string(), "API error: 500 Internal Server Error");
    }

    #[test]
    fn test_error_api_with_code_and_hint() {
        let err = Error::api_code(1008, "insufficient balance", Some("recharge".into()));
        assert_eq!(
            err.to_string(),
            "API error (code 1008): insufficient balance; recharge"
        );

        let err = Error::api_code(500, "internal error", None);
        assert_eq!(err.to_string(), "API error (code 500): internal error");
    }

    #[test]
    fn test_error_retries_exhausted_display() {
        let err = Error::RetriesExhausted {
            attempts: 3,
            last_cause: Box::new(Error::timeout()),
        };
        assert_eq!(
            err.to_string(),
            "retries exhausted after 3 attempts: Request timeout"
        );
    }

    #[test]
    fn test_error_tool() {
        let err = Error::tool("Tool not found");
        assert!(matches!(err, Error::Tool(_)));
        assert_eq!(err.to_string(), "Tool execution error: Tool not found");
    }

    #[test]
    fn test_error_sandbox() {
        let err = Error::sandbox("../outside");
        assert_eq!(err.to_string(), "Path escapes workspace root: ../outside");
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::timeout().is_retryable());
        assert!(Error::api("connection reset").is_retryable());
        assert!(
            Error::Json(serde_json::from_str::<serde_json::Value>("nope").unwrap_err())
                .is_retryable()
        );
        assert!(!Error::config("bad provider").is_retryable());
        assert!(!Error::invalid_input("bad input").is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(
            !Error::RetriesExhausted {
                attempts: 2,
                last_cause: Box::new(Error::timeout()),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_api_retryability_follows_status_code() {
        // server-side faults are transient
        for status in [500, 502, 503, 504] {
            assert!(
                Error::api_code(status, "server error", None).is_retryable(),
                "expected {status} to be retryable"
            );
        }

        // client-side faults (auth, quota, bad model) are fatal for the turn
        for status in [400, 401, 403, 404, 429] {
            assert!(
                !Error::api_code(status, "client error", None).is_retryable(),
                "expected {status} to be fatal"
            );
        }

        // provider soft codes: balance and unsupported model are fatal,
        // anything else transient
        assert!(!Error::api_code(1008, "no balance", None).is_retryable());
        assert!(!Error::api_code(2013, "bad model", None).is_retryable());
        assert!(Error::api_code(1039, "rate surge", None).is_retryable());

        // envelopes without a code stay retryable
        assert!(Error::api("malformed envelope").is_retryable());
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn _returns_result() -> Result<i32> {
            Ok(42)
        }

        fn _returns_error() -> Result<i32> {
            Err(Error::timeout())
        }
    }
}
