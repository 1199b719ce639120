//! On-disk availability cache.
//!
//! `~/.roundtable/availability_check.json` maps each kind name to whether its
//! probe last succeeded. It is read once at startup and written only by the
//! `--check` refresh.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::adapter::{AgentKind, AvailabilityResult};
use crate::registry::AdapterRegistry;
use crate::util::atomic::atomic_write_json;

/// Directory holding all per-user gateway state.
pub fn state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".roundtable"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityCache {
    path: PathBuf,
}

/// One probed kind in a refresh report.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub kind: AgentKind,
    pub result: AvailabilityResult,
}

impl AvailabilityCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache at the default location, if a home directory exists.
    pub fn default_location() -> Option<Self> {
        state_dir().map(|dir| Self::new(dir.join("availability_check.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw cache contents. A missing or unreadable cache is `None`; a corrupt
    /// one is logged and treated as missing.
    pub fn load(&self) -> Option<BTreeMap<String, bool>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no availability cache");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Some(map),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt availability cache");
                None
            }
        }
    }

    /// Kinds the cache marks available, in declaration order. Unknown names
    /// in the file are skipped. A cache that marks nothing available yields
    /// `None`, the same as a missing one.
    pub fn available_kinds(&self) -> Option<Vec<AgentKind>> {
        let map = self.load()?;
        let kinds: Vec<AgentKind> = AgentKind::ALL
            .into_iter()
            .filter(|kind| map.get(kind.as_str()).copied().unwrap_or(false))
            .collect();
        if kinds.is_empty() {
            debug!(path = %self.path.display(), "availability cache lists no available CLIs");
            return None;
        }
        Some(kinds)
    }

    /// Persist `kind → available` for every entry in `reports`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be written.
    pub fn save(&self, reports: &[ProbeReport]) -> Result<()> {
        let map: BTreeMap<&str, bool> = reports
            .iter()
            .map(|r| (r.kind.as_str(), r.result.available))
            .collect();
        atomic_write_json(&self.path, &map)
            .with_context(|| format!("failed to save availability cache {}", self.path.display()))?;
        info!(path = %self.path.display(), "availability cache saved");
        Ok(())
    }

    /// Probe every kind concurrently and persist the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error only if the cache cannot be written; probe failures
    /// are part of the report.
    pub async fn refresh(&self, registry: &AdapterRegistry) -> Result<Vec<ProbeReport>> {
        let probes = AgentKind::ALL.into_iter().map(|kind| {
            let agent = registry.get(kind);
            async move {
                let result = agent.check_availability().await;
                debug!(agent = %kind, available = result.available, "probe finished");
                ProbeReport { kind, result }
            }
        });
        let reports = join_all(probes).await;
        self.save(&reports)?;
        Ok(reports)
    }
}

/// Human-readable `--check` report.
pub fn render_report(reports: &[ProbeReport]) -> String {
    let available = reports.iter().filter(|r| r.result.available).count();
    let mut lines = vec!["Checking CLI availability...".to_owned()];
    lines.extend(reports.iter().map(|r| format!("  {}: {}", r.kind, r.result.status)));
    lines.push(format!("{available}/{} CLIs available", reports.len()));
    lines.join("\n")
}
