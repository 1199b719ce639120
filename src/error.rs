//! Error types for the roundtable gateway.
//!
//! Every failure carries a stable machine-readable code (see
//! [`GatewayError::code`]) and optional structured context. Callers of the
//! gateway never see these values directly: the dispatch layer renders them
//! into `❌`-prefixed strings via [`GatewayError::user_message`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Gateway error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or contradictory startup configuration, or an operation
    /// against a kind this server instance does not enable.
    #[error("{message}")]
    Configuration {
        message: String,
        context: BTreeMap<String, String>,
    },

    /// The probed external tool is missing or misconfigured.
    #[error("{agent} CLI not available: {reason}")]
    AgentNotAvailable { agent: String, reason: String },

    /// The spawned process failed or produced an error event.
    #[error("{agent} execution failed: {message}")]
    AgentExecution { agent: String, message: String },

    /// Failure while consuming a process's output.
    #[error("streaming error: {message}")]
    Streaming { message: String },

    /// The working directory is missing or not a directory.
    #[error("{reason}: {}", path.display())]
    PathValidation {
        path: PathBuf,
        reason: String,
        context: BTreeMap<String, String>,
    },

    /// An operation exceeded its allotted time.
    #[error("operation '{operation}' timed out after {}s", timeout.as_secs())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// Explicit marker for failures a retry wrapper should attempt again.
    #[error("{message}")]
    Retryable { message: String, code: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error with context.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GatewayError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// A kind that the resolved enabled-set does not contain.
    pub fn not_enabled(agent: &str) -> Self {
        Self::Configuration {
            message: format!("{agent} subagent is not enabled in this server instance"),
            context: BTreeMap::from([("agent".to_owned(), agent.to_owned())]),
        }
    }

    pub fn not_available(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AgentNotAvailable {
            agent: agent.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AgentExecution {
            agent: agent.into(),
            message: message.into(),
        }
    }

    pub fn path(path: impl Into<PathBuf>, reason: impl Into<String>, agent: &str) -> Self {
        Self::PathValidation {
            path: path.into(),
            reason: reason.into(),
            context: BTreeMap::from([("agent".to_owned(), agent.to_owned())]),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable {
            message: message.into(),
            code: "RETRYABLE".to_owned(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &str {
        match self {
            Self::Configuration { .. } => "CONFIG_ERROR",
            Self::AgentNotAvailable { .. } => "AGENT_NOT_AVAILABLE",
            Self::AgentExecution { .. } => "AGENT_EXECUTION_ERROR",
            Self::Streaming { .. } => "STREAMING_ERROR",
            Self::PathValidation { .. } => "PATH_ERROR",
            Self::Timeout { .. } => "TIMEOUT_ERROR",
            Self::Retryable { code, .. } => code,
            Self::Json(_) => "JSON_ERROR",
            Self::Io { .. } => "IO_ERROR",
        }
    }

    /// Structured context attached to this failure.
    pub fn context(&self) -> BTreeMap<String, String> {
        match self {
            Self::Configuration { context, .. } | Self::PathValidation { context, .. } => {
                context.clone()
            }
            Self::AgentNotAvailable { agent, .. } | Self::AgentExecution { agent, .. } => {
                BTreeMap::from([("agent".to_owned(), agent.clone())])
            }
            Self::Timeout { operation, timeout } => BTreeMap::from([
                ("operation".to_owned(), operation.clone()),
                ("timeout".to_owned(), timeout.as_secs().to_string()),
            ]),
            Self::Io { path, .. } => {
                BTreeMap::from([("path".to_owned(), path.display().to_string())])
            }
            Self::Streaming { .. } | Self::Retryable { .. } | Self::Json(_) => BTreeMap::new(),
        }
    }

    /// Whether the default retry predicate should attempt this again.
    ///
    /// Availability, path and configuration failures are final.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Retryable { .. } | Self::Timeout { .. } | Self::Streaming { .. }
        )
    }

    /// `[CODE] message`, the form used in log lines.
    pub fn tagged(&self) -> String {
        format!("[{}] {self}", self.code())
    }

    /// Render for the RPC caller: always starts with `❌`.
    pub fn user_message(&self, include_context: bool) -> String {
        let mut message = format!("❌ {self}");
        let context = self.context();
        if include_context && !context.is_empty() {
            let pairs: Vec<String> = context.iter().map(|(k, v)| format!("{k}={v}")).collect();
            message.push_str(&format!(" ({})", pairs.join(", ")));
        }
        message
    }
}

/// Convenience result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
