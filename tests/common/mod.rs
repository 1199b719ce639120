//! Stub agents and sinks shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use roundtable_mcp::adapter::{AvailabilityResult, ProbeFailure};
use roundtable_mcp::config::ServerConfig;
use roundtable_mcp::metrics::MetricsCollector;
use roundtable_mcp::registry::AdapterRegistry;
use roundtable_mcp::{
    Agent, AgentKind, ExecutionRequest, Gateway, Message, MessageStream, MessageType, ProgressSink,
};

/// Scripted agent: fixed probe outcomes, fixed message sequence.
pub struct StubAgent {
    kind: AgentKind,
    /// Probe outcomes consumed in order; the last one repeats.
    probes: Mutex<Vec<Option<ProbeFailure>>>,
    script: Vec<(MessageType, String)>,
    pub probe_calls: AtomicUsize,
    pub executions: AtomicUsize,
    /// Messages actually pulled from the stream.
    pub pulled: Arc<AtomicUsize>,
    pub last_request: Mutex<Option<ExecutionRequest>>,
}

impl StubAgent {
    pub fn new(kind: AgentKind, script: &[(MessageType, &str)]) -> Self {
        Self {
            kind,
            probes: Mutex::new(vec![None]),
            script: script.iter().map(|(t, c)| (*t, (*c).to_owned())).collect(),
            probe_calls: AtomicUsize::new(0),
            executions: AtomicUsize::new(0),
            pulled: Arc::new(AtomicUsize::new(0)),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_probes(self, probes: Vec<Option<ProbeFailure>>) -> Self {
        *self.probes.lock().expect("lock") = probes;
        self
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn check_availability(&self) -> AvailabilityResult {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = {
            let mut probes = self.probes.lock().expect("lock");
            if probes.len() > 1 {
                probes.remove(0)
            } else {
                probes.first().copied().flatten()
            }
        };
        match outcome {
            None => AvailabilityResult::available(self.kind, Some("1.0.0".to_owned())),
            Some(failure) => AvailabilityResult::unavailable(self.kind, failure, "missing"),
        }
    }

    fn execute_with_streaming(&self, request: ExecutionRequest) -> MessageStream {
        use futures::StreamExt;

        self.executions.fetch_add(1, Ordering::SeqCst);
        let project = request.project_id();
        let session = request.session_id.clone();
        *self.last_request.lock().expect("lock") = Some(request);
        let messages: Vec<Message> = self
            .script
            .iter()
            .map(|(t, c)| Message::assistant(project.clone(), *t, c.clone(), session.as_deref()))
            .collect();
        let pulled = Arc::clone(&self.pulled);
        Box::pin(futures::stream::iter(messages).inspect(move |_| {
            pulled.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Registry whose every kind resolves to `stub`.
pub fn registry_with(stub: &Arc<StubAgent>) -> Arc<AdapterRegistry> {
    let stub = Arc::clone(stub);
    Arc::new(AdapterRegistry::with_factory(move |_| {
        Arc::clone(&stub) as Arc<dyn Agent>
    }))
}

pub fn gateway_with(stub: &Arc<StubAgent>, config: ServerConfig) -> Gateway {
    Gateway::new(
        config,
        registry_with(stub),
        Arc::new(MetricsCollector::disabled()),
    )
}

/// Progress sink that remembers everything.
#[derive(Default)]
pub struct RecordingSink {
    pub progress: Mutex<Vec<(u64, Option<u64>, String)>>,
    pub errors: Mutex<Vec<String>>,
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn report_progress(&self, current: u64, total: Option<u64>, message: &str) {
        self.progress
            .lock()
            .expect("lock")
            .push((current, total, message.to_owned()));
    }

    async fn error(&self, message: &str) {
        self.errors.lock().expect("lock").push(message.to_owned());
    }
}
