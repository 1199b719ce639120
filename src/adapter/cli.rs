//! The shared execution engine for command-line tools.
//!
//! Lifecycle of one task: build argv from the descriptor, spawn with the
//! project directory as cwd, turn each non-empty stdout line into a message,
//! then inspect the exit status. stderr is drained concurrently so a chatty
//! tool cannot stall on a full pipe. Nothing here returns an error to the
//! caller: spawn, read and exit failures all end the stream with one ERROR
//! message.

use std::collections::HashMap;
use std::future::Future;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::descriptor::{CliDescriptor, Invocation, map_model};
use super::{Agent, AgentKind, AvailabilityResult, ExecutionRequest, MessageStream, ProbeFailure};
use crate::message::Message;

/// Adapter for one external tool, driven by its descriptor.
#[derive(Debug)]
pub struct CliAdapter {
    descriptor: CliDescriptor,
    /// Project path → last session id; `None` for stateless tools.
    sessions: Option<Mutex<HashMap<String, String>>>,
}

impl CliAdapter {
    pub fn new(descriptor: CliDescriptor) -> Self {
        let sessions = descriptor.sessions.then(|| Mutex::new(HashMap::new()));
        Self {
            descriptor,
            sessions,
        }
    }

    /// Adapter with the built-in descriptor for `kind`.
    pub fn for_kind(kind: AgentKind) -> Self {
        Self::new(CliDescriptor::for_kind(kind))
    }

    pub const fn descriptor(&self) -> &CliDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl Agent for CliAdapter {
    fn kind(&self) -> AgentKind {
        self.descriptor.kind
    }

    async fn check_availability(&self) -> AvailabilityResult {
        probe(&self.descriptor).await
    }

    fn execute_with_streaming(&self, request: ExecutionRequest) -> MessageStream {
        let project_id = request.project_id();
        let resume = if self.descriptor.sessions && !request.is_initial_prompt {
            request
                .session_id
                .clone()
                .or_else(|| self.get_session_id(&project_id))
        } else {
            None
        };
        if let Some(session_id) = request.session_id.as_deref() {
            self.set_session_id(&project_id, session_id);
        }
        Box::pin(run(self.descriptor.clone(), request, resume))
    }

    fn get_session_id(&self, project_id: &str) -> Option<String> {
        let sessions = self.sessions.as_ref()?;
        let map = sessions.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(project_id).cloned()
    }

    fn set_session_id(&self, project_id: &str, session_id: &str) {
        if let Some(sessions) = &self.sessions {
            let mut map = sessions.lock().unwrap_or_else(PoisonError::into_inner);
            map.insert(project_id.to_owned(), session_id.to_owned());
        }
    }
}

/// Run the descriptor's probe command with a bounded wait.
async fn probe(descriptor: &CliDescriptor) -> AvailabilityResult {
    let kind = descriptor.kind;
    if let Err(e) = which::which(&descriptor.program) {
        debug!(agent = %kind, program = descriptor.program, error = %e, "probe executable not found");
        return AvailabilityResult::unavailable(
            kind,
            ProbeFailure::NotFound,
            format!("`{}` not found on PATH", descriptor.program),
        );
    }

    let output = Command::new(&descriptor.program)
        .args(&descriptor.probe_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(descriptor.probe_timeout, output).await {
        Err(_) => AvailabilityResult::unavailable(
            kind,
            ProbeFailure::TimedOut(descriptor.probe_timeout),
            format!(
                "probe did not finish within {}s",
                descriptor.probe_timeout.as_secs()
            ),
        ),
        Ok(Err(e)) => AvailabilityResult::unavailable(kind, ProbeFailure::Spawn, e.to_string()),
        Ok(Ok(out)) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout)
                .lines()
                .map(str::trim)
                .find(|l| l.to_ascii_lowercase().contains("version"))
                .map(str::to_owned);
            AvailabilityResult::available(kind, version)
        }
        Ok(Ok(out)) => {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_owned();
            let reason = if stderr.is_empty() {
                format!("probe exited with {}", out.status)
            } else {
                stderr
            };
            AvailabilityResult::unavailable(kind, ProbeFailure::ExitStatus, reason)
        }
    }
}

/// Await `fut`, giving up at `deadline` if one is set.
async fn until<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}

fn run(
    descriptor: CliDescriptor,
    request: ExecutionRequest,
    resume: Option<String>,
) -> impl Stream<Item = Message> + Send + 'static {
    async_stream::stream! {
        let kind = descriptor.kind;
        let name = kind.display_name();
        let project = request.project_id();
        let session = request.session_id.as_deref();
        let model = map_model(kind, request.model.as_deref());
        let args = (descriptor.build_args)(&Invocation {
            instruction: &request.instruction,
            project_path: &request.project_path,
            model: model.as_deref(),
            resume: resume.as_deref(),
        });

        info!(agent = %kind, program = descriptor.program, cwd = project, "spawning agent");
        debug!(agent = %kind, ?args, "agent argv");

        let spawned = Command::new(&descriptor.program)
            .args(&args)
            .current_dir(&request.project_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(agent = %kind, error = %e, "spawn failed");
                yield Message::error(&project, format!("Execution error: {e}"), session);
                return;
            }
        };

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = BufReader::new(stderr).read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).trim().to_owned()
            })
        });

        // A bound too far out to represent is no bound at all.
        let deadline = request.timeout.and_then(|t| Instant::now().checked_add(t));
        let mut timed_out = false;

        if let Some(stdout) = child.stdout.take() {
            let mut segments = BufReader::new(stdout).split(b'\n');
            loop {
                let Some(next) = until(deadline, segments.next_segment()).await else {
                    timed_out = true;
                    break;
                };
                match next {
                    Ok(Some(bytes)) => {
                        let line = String::from_utf8_lossy(&bytes);
                        let line = line.trim();
                        if !line.is_empty() {
                            yield Message::assistant(&project, descriptor.line_type, line, session);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = child.kill().await;
                        yield Message::error(&project, format!("Execution error: failed to read {name} output: {e}"), session);
                        return;
                    }
                }
            }
        }

        let status = if timed_out {
            None
        } else {
            until(deadline, child.wait()).await
        };

        let status = match status {
            None => {
                let _ = child.kill().await;
                let secs = request.timeout.map_or(0, |t| t.as_secs());
                warn!(agent = %kind, timeout_secs = secs, "agent timed out, process killed");
                yield Message::error(&project, format!("{name} CLI timed out after {secs}s"), session);
                return;
            }
            Some(Err(e)) => {
                yield Message::error(&project, format!("Execution error: {e}"), session);
                return;
            }
            Some(Ok(status)) => status,
        };

        if !status.success() {
            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            let detail = if stderr.is_empty() {
                format!("process exited with {status}")
            } else {
                stderr
            };
            warn!(agent = %kind, %status, "agent exited unsuccessfully");
            yield Message::error(&project, format!("{name} CLI error: {detail}"), session);
        } else {
            debug!(agent = %kind, "agent exited successfully");
        }
    }
}
