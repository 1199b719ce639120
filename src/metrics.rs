//! Optional execution metrics, disabled by default.
//!
//! Each finished invocation appends one JSON object to
//! `~/.roundtable/metrics.jsonl` and is kept in memory for [`MetricsCollector::stats`].

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapter::AgentKind;
use crate::availability::state_dir;
use crate::util::atomic::atomic_write_json;

/// One finished invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetric {
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub success: bool,
    pub error: Option<String>,
    pub message_count: usize,
    pub tool_uses: usize,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentStats {
    pub count: usize,
    pub success: usize,
    pub failed: usize,
    pub avg_duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsStats {
    pub total_executions: usize,
    pub successful: usize,
    pub failed: usize,
    pub avg_duration: f64,
    pub by_agent: BTreeMap<String, AgentStats>,
}

#[derive(Debug)]
pub struct MetricsCollector {
    enabled: bool,
    storage_path: PathBuf,
    metrics: Mutex<Vec<ExecutionMetric>>,
}

impl MetricsCollector {
    pub fn new(enabled: bool, storage_path: Option<PathBuf>) -> Self {
        let storage_path = storage_path
            .or_else(|| state_dir().map(|d| d.join("metrics.jsonl")))
            .unwrap_or_else(|| PathBuf::from("metrics.jsonl"));
        if enabled {
            info!(path = %storage_path.display(), "metrics collection enabled");
        }
        Self {
            enabled,
            storage_path,
            metrics: Mutex::new(Vec::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, None)
    }

    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Start timing one invocation. Nothing is recorded until
    /// [`ExecutionTracker::finish`].
    pub fn track(&self, agent: AgentKind, session_id: Option<&str>) -> ExecutionTracker<'_> {
        ExecutionTracker {
            collector: self,
            agent,
            session_id: session_id.map(str::to_owned),
            timestamp: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Keep `metric` and append it to the JSONL file. A write failure is
    /// logged, never propagated.
    pub fn record(&self, metric: ExecutionMetric) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.append(&metric) {
            warn!(path = %self.storage_path.display(), error = %e, "failed to write metric");
        }
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(metric);
    }

    fn append(&self, metric: &ExecutionMetric) -> Result<()> {
        if let Some(parent) = self.storage_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(metric)?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.storage_path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<ExecutionMetric> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Aggregates over everything recorded by this process, `None` if empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> Option<MetricsStats> {
        let metrics = self.snapshot();
        if metrics.is_empty() {
            return None;
        }

        let mut by_agent: BTreeMap<String, (AgentStats, f64)> = BTreeMap::new();
        for m in &metrics {
            let (entry, total) = by_agent.entry(m.agent.clone()).or_default();
            entry.count += 1;
            if m.success {
                entry.success += 1;
            } else {
                entry.failed += 1;
            }
            *total += m.duration_seconds;
        }

        let successful = metrics.iter().filter(|m| m.success).count();
        let total: f64 = metrics.iter().map(|m| m.duration_seconds).sum();
        Some(MetricsStats {
            total_executions: metrics.len(),
            successful,
            failed: metrics.len() - successful,
            avg_duration: total / metrics.len() as f64,
            by_agent: by_agent
                .into_iter()
                .map(|(agent, (mut stats, total))| {
                    stats.avg_duration = total / stats.count as f64;
                    (agent, stats)
                })
                .collect(),
        })
    }

    /// Write `{"metrics": [...], "stats": {...}}` to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written. A disabled collector
    /// writes nothing and succeeds.
    pub fn export_json(&self, path: &Path) -> Result<()> {
        if !self.enabled {
            warn!("metrics not enabled, nothing to export");
            return Ok(());
        }
        let body = serde_json::json!({
            "metrics": self.snapshot(),
            "stats": self.stats().unwrap_or_default(),
        });
        atomic_write_json(path, &body)?;
        info!(path = %path.display(), "metrics exported");
        Ok(())
    }
}

/// Timer for one invocation.
#[derive(Debug)]
pub struct ExecutionTracker<'a> {
    collector: &'a MetricsCollector,
    agent: AgentKind,
    session_id: Option<String>,
    timestamp: DateTime<Utc>,
    started: Instant,
}

impl ExecutionTracker<'_> {
    pub fn finish(self, error: Option<String>, message_count: usize, tool_uses: usize) {
        self.collector.record(ExecutionMetric {
            agent: self.agent.as_str().to_owned(),
            timestamp: self.timestamp,
            duration_seconds: self.started.elapsed().as_secs_f64(),
            success: error.is_none(),
            error,
            message_count,
            tool_uses,
            session_id: self.session_id,
        });
    }
}
