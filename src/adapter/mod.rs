//! Adapters, one per external command-line assistant.
//!
//! Every tool is driven through the same [`Agent`] contract:
//!
//! ```text
//! check_availability()          → AvailabilityResult (never fails)
//! execute_with_streaming(req)   → lazy MessageStream (never fails; ends in
//!                                 exhaustion or one terminal ERROR message)
//! get_session_id / set_session_id (no-ops for stateless tools)
//! ```
//!
//! The built-in implementation is [`CliAdapter`], a single execution engine
//! parameterized by a [`CliDescriptor`] from the descriptor table.

pub mod cli;
pub mod descriptor;
pub mod kind;

use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;

pub use cli::CliAdapter;
pub use descriptor::{CliDescriptor, Invocation, map_model};
pub use kind::AgentKind;

use crate::error::{GatewayError, GatewayResult};
use crate::message::Message;

/// Lazy, single-pass sequence of normalized messages.
pub type MessageStream = Pin<Box<dyn Stream<Item = Message> + Send>>;

/// Everything an adapter needs to run one task.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub instruction: String,
    /// Absolute, pre-validated working directory.
    pub project_path: PathBuf,
    pub session_id: Option<String>,
    pub model: Option<String>,
    /// Accepted for interface parity; no current tool consumes image payloads.
    pub images: Vec<serde_json::Value>,
    pub is_initial_prompt: bool,
    /// Kill the process and emit an ERROR message once this elapses.
    pub timeout: Option<Duration>,
}

impl ExecutionRequest {
    pub fn new(instruction: impl Into<String>, project_path: impl Into<PathBuf>) -> Self {
        Self {
            instruction: instruction.into(),
            project_path: project_path.into(),
            session_id: None,
            model: None,
            images: Vec::new(),
            is_initial_prompt: false,
            timeout: None,
        }
    }

    pub fn project_id(&self) -> String {
        self.project_path.display().to_string()
    }
}

/// Why a probe reported the tool as unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailure {
    /// Executable not found on `PATH`.
    NotFound,
    /// Probe exited with a non-zero status.
    ExitStatus,
    /// Spawning the probe failed.
    Spawn,
    /// Probe did not finish within the carried time bound.
    TimedOut(Duration),
}

/// Outcome of one availability probe. Produced fresh on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityResult {
    pub available: bool,
    /// One-line human status, `✅`/`❌` prefixed.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip)]
    pub failure: Option<ProbeFailure>,
}

impl AvailabilityResult {
    pub fn available(kind: AgentKind, version: Option<String>) -> Self {
        Self {
            available: true,
            status: format!("✅ {} CLI Available", kind.display_name()),
            error: None,
            version,
            failure: None,
        }
    }

    pub fn unavailable(kind: AgentKind, failure: ProbeFailure, error: impl Into<String>) -> Self {
        let error = error.into();
        let verb = match failure {
            ProbeFailure::ExitStatus => "failed",
            ProbeFailure::NotFound | ProbeFailure::Spawn | ProbeFailure::TimedOut(_) => "error",
        };
        Self {
            available: false,
            status: format!("❌ {} CLI {verb}: {error}", kind.display_name()),
            error: Some(error),
            version: None,
            failure: Some(failure),
        }
    }

    /// Reason text suitable for embedding in a failure response.
    pub fn reason(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }

    /// Convert into the error taxonomy: timeouts are retryable, everything
    /// else is a final "not available".
    pub fn into_result(self, kind: AgentKind) -> GatewayResult<Self> {
        match self.failure {
            _ if self.available => Ok(self),
            Some(ProbeFailure::TimedOut(bound)) => Err(GatewayError::timeout(
                format!("{kind} availability probe"),
                bound,
            )),
            _ => Err(GatewayError::not_available(kind.display_name(), self.reason())),
        }
    }
}

/// Invocation contract shared by all external tools.
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Run the tool's lightweight probe. Never fails: every problem is
    /// captured in the returned value.
    async fn check_availability(&self) -> AvailabilityResult;

    /// Start the task. The returned stream does nothing until polled.
    fn execute_with_streaming(&self, request: ExecutionRequest) -> MessageStream;

    /// Last-known session for `project_id`; stateless tools return `None`.
    fn get_session_id(&self, _project_id: &str) -> Option<String> {
        None
    }

    /// Remember `session_id` for `project_id`; stateless tools ignore it.
    fn set_session_id(&self, _project_id: &str, _session_id: &str) {}
}
