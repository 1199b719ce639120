//! Gateway: the one place where requests meet adapters.
//!
//! Per call the gateway gates on the enabled-set, resolves the working
//! directory, probes the tool, streams the execution while forwarding
//! progress, and reduces the messages into a single string. Every failure is
//! rendered here into a `❌` string; nothing propagates past
//! [`Gateway::run_subagent`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, error, info};

use crate::adapter::{AgentKind, ExecutionRequest};
use crate::config::ServerConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::metrics::MetricsCollector;
use crate::reducer::{Flow, ResponseReducer};
use crate::registry::AdapterRegistry;
use crate::retry::retry_async;

const MISSING_DIR: &str = "Project directory does not exist";

/// Receiver for incremental progress. Delivery is best effort: sinks must
/// not block the stream on a slow consumer.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report_progress(&self, current: u64, total: Option<u64>, message: &str);

    async fn error(&self, message: &str);
}

/// Sink for callers that do not observe progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn report_progress(&self, _current: u64, _total: Option<u64>, _message: &str) {}

    async fn error(&self, _message: &str) {}
}

/// Parameters of one `<kind>_subagent` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubagentRequest {
    pub instruction: String,
    /// Blank or absent means the configured working directory, else the
    /// process cwd.
    pub project_path: Option<String>,
    pub session_id: Option<String>,
    pub model: Option<String>,
    pub is_initial_prompt: bool,
    /// Overrides the configured execution timeout for this call.
    pub timeout: Option<Duration>,
}

impl SubagentRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct Gateway {
    config: ServerConfig,
    registry: Arc<AdapterRegistry>,
    metrics: Arc<MetricsCollector>,
}

impl Gateway {
    pub fn new(
        config: ServerConfig,
        registry: Arc<AdapterRegistry>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            config,
            registry,
            metrics,
        }
    }

    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Gate every subagent call on the enabled set.
    ///
    /// # Errors
    ///
    /// `CONFIG_ERROR` when `kind` is not enabled in this server instance.
    pub fn ensure_enabled(&self, kind: AgentKind) -> GatewayResult<()> {
        if self.config.is_enabled(kind) {
            Ok(())
        } else {
            Err(GatewayError::not_enabled(kind.display_name()))
        }
    }

    /// Absolute, existing directory for `raw`.
    ///
    /// # Errors
    ///
    /// `PATH_ERROR` when the directory is missing or not a directory; an I/O
    /// error when the current directory cannot be determined.
    pub fn resolve_project_path(&self, raw: Option<&str>, kind: AgentKind) -> GatewayResult<PathBuf> {
        let candidate = match raw.map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => match &self.config.working_dir {
                Some(dir) => dir.clone(),
                None => std::env::current_dir().map_err(|source| GatewayError::Io {
                    path: PathBuf::from("."),
                    source,
                })?,
            },
        };
        let absolute = std::path::absolute(&candidate).map_err(|source| GatewayError::Io {
            path: candidate.clone(),
            source,
        })?;
        validate_directory(&absolute, kind)?;
        debug!(agent = %kind, path = %absolute.display(), "resolved project path");
        Ok(absolute)
    }

    /// `check_<kind>_availability`: the probe's status line, or a `❌` string.
    pub async fn check_availability(&self, kind: AgentKind) -> String {
        if let Err(e) = self.ensure_enabled(kind) {
            return e.user_message(false);
        }
        info!(agent = %kind, "checking availability");
        let result = self.registry.get(kind).check_availability().await;
        debug!(agent = %kind, available = result.available, status = %result.status, "availability result");
        result.status
    }

    /// `<kind>_subagent` without progress reporting.
    pub async fn subagent(&self, kind: AgentKind, request: SubagentRequest) -> String {
        self.run_subagent(kind, request, &NoProgress).await
    }

    /// `<kind>_subagent`: run one task end to end.
    pub async fn run_subagent(
        &self,
        kind: AgentKind,
        request: SubagentRequest,
        progress: &dyn ProgressSink,
    ) -> String {
        match self.execute(kind, request, progress).await {
            Ok(text) => text,
            Err(e) => {
                error!(agent = %kind, error = %e.tagged(), context = ?e.context(), "subagent call failed");
                let message = e.user_message(false);
                if !matches!(
                    e,
                    GatewayError::Configuration { .. } | GatewayError::PathValidation { .. }
                ) {
                    progress.error(&message).await;
                }
                message
            }
        }
    }

    async fn execute(
        &self,
        kind: AgentKind,
        request: SubagentRequest,
        progress: &dyn ProgressSink,
    ) -> GatewayResult<String> {
        self.ensure_enabled(kind)?;
        let project_path = self.resolve_project_path(request.project_path.as_deref(), kind)?;

        let agent = self.registry.get(kind);
        retry_async(&self.config.probe_retry, GatewayError::is_retryable, || {
            let agent = Arc::clone(&agent);
            async move { agent.check_availability().await.into_result(kind) }
        })
        .await?;

        let name = kind.display_name();
        info!(
            agent = %kind,
            model = request.model.as_deref().unwrap_or("default"),
            path = %project_path.display(),
            "subagent execution started"
        );
        debug!(agent = %kind, instruction = %request.instruction, "instruction");

        let tracker = self.metrics.track(kind, request.session_id.as_deref());
        let mut stream = agent.execute_with_streaming(ExecutionRequest {
            instruction: request.instruction,
            project_path,
            session_id: request.session_id,
            model: request.model,
            images: Vec::new(),
            is_initial_prompt: request.is_initial_prompt,
            timeout: request.timeout.or(self.config.execution_timeout),
        });

        let mut reducer = ResponseReducer::new(name, self.config.verbose);
        let mut count: u64 = 0;
        while let Some(message) = stream.next().await {
            count += 1;
            let line = format!("{name} #{count}: {} => {}", message.message_type, message.content);
            debug!(agent = %kind, progress = %line, "progress");
            progress.report_progress(count, None, &line).await;
            if reducer.push(&message) == Flow::Stop {
                break;
            }
        }
        drop(stream);

        let reduction = reducer.finish();
        info!(
            agent = %kind,
            messages = reduction.message_count,
            tool_uses = reduction.tool_uses,
            success = reduction.is_success(),
            "subagent execution completed"
        );
        tracker.finish(reduction.error.clone(), reduction.message_count, reduction.tool_uses);

        if let Some(err) = &reduction.error {
            error!(agent = %kind, error = %err, "agent reported an error");
            progress.error(&reduction.text).await;
        }
        Ok(reduction.text)
    }
}

fn validate_directory(path: &Path, kind: AgentKind) -> GatewayResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => {
            let mut err = GatewayError::path(path, MISSING_DIR, kind.as_str());
            if let GatewayError::PathValidation { context, .. } = &mut err {
                context.insert("detail".to_owned(), "not a directory".to_owned());
            }
            Err(err)
        }
        Err(_) => Err(GatewayError::path(path, MISSING_DIR, kind.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(config: ServerConfig) -> Gateway {
        Gateway::new(
            config,
            Arc::new(AdapterRegistry::new()),
            Arc::new(MetricsCollector::disabled()),
        )
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let gw = gateway(ServerConfig::default());
        let err = gw
            .resolve_project_path(Some("/definitely/not/here"), AgentKind::Codex)
            .expect_err("missing");
        assert_eq!(
            err.user_message(false),
            "❌ Project directory does not exist: /definitely/not/here"
        );
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("f.txt");
        std::fs::write(&file, "x").expect("write");
        let gw = gateway(ServerConfig::default());
        let err = gw
            .resolve_project_path(file.to_str(), AgentKind::Qwen)
            .expect_err("file");
        assert_eq!(err.code(), "PATH_ERROR");
        assert!(err.to_string().starts_with(MISSING_DIR));
        assert_eq!(
            err.context().get("detail").map(String::as_str),
            Some("not a directory")
        );
    }

    #[test]
    fn test_blank_path_uses_working_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gw = gateway(ServerConfig {
            working_dir: Some(dir.path().to_path_buf()),
            ..ServerConfig::default()
        });
        let resolved = gw.resolve_project_path(Some("   "), AgentKind::Codex).expect("dir");
        assert_eq!(resolved, dir.path());
        assert!(resolved.is_absolute());
    }

    #[test]
    fn test_missing_working_dir_is_rejected_too() {
        let gw = gateway(ServerConfig {
            working_dir: Some(PathBuf::from("/no/such/working/dir")),
            ..ServerConfig::default()
        });
        assert!(gw.resolve_project_path(None, AgentKind::Codex).is_err());
    }

    #[test]
    fn test_absent_path_falls_back_to_cwd() {
        let gw = gateway(ServerConfig::default());
        let resolved = gw.resolve_project_path(None, AgentKind::Codex).expect("cwd");
        assert_eq!(resolved, std::env::current_dir().expect("cwd"));
    }

    #[tokio::test]
    async fn test_disabled_kind_check_is_refused() {
        let gw = gateway(ServerConfig {
            enabled: vec![AgentKind::Codex],
            ..ServerConfig::default()
        });
        assert_eq!(
            gw.check_availability(AgentKind::Gemini).await,
            "❌ Gemini subagent is not enabled in this server instance"
        );
    }
}
