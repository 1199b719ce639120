//! roundtable-mcp -- MCP server exposing coding CLIs as subagents.
//!
//! Usage: roundtable-mcp [--agents codex,gemini] [--working-dir <path>] [--check]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use roundtable_mcp::availability::{AvailabilityCache, render_report};
use roundtable_mcp::config::{CliOverrides, ENV_DEBUG, EnvVars, ServerConfig};
use roundtable_mcp::metrics::MetricsCollector;
use roundtable_mcp::registry::AdapterRegistry;
use roundtable_mcp::tools::ToolRouter;
use roundtable_mcp::{Gateway, logging, run_mcp_server};

#[derive(Debug, Parser)]
#[command(name = "roundtable-mcp", version, about)]
struct Args {
    /// Probe every CLI, write the availability cache and exit.
    #[arg(long)]
    check: bool,

    /// Comma-separated kinds to enable (overrides CLI_MCP_SUBAGENTS).
    #[arg(long, value_name = "LIST")]
    agents: Option<String>,

    /// Default project directory for calls without `project_path`.
    #[arg(long, value_name = "DIR")]
    working_dir: Option<PathBuf>,

    /// Debug-level logging and a log file under ~/.roundtable/logs.
    #[arg(long)]
    debug: bool,

    /// Return full summaries instead of the last response.
    #[arg(long)]
    verbose: bool,

    /// Record execution metrics to ~/.roundtable/metrics.jsonl.
    #[arg(long)]
    metrics: bool,

    /// Default execution timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            agents: self.agents.clone(),
            working_dir: self.working_dir.clone(),
            debug: self.debug,
            verbose: self.verbose,
            metrics: self.metrics,
            timeout_secs: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvVars::from_process();

    let debug = args.debug || env.flag(ENV_DEBUG, true);
    let _logging = logging::init(debug, logging::default_log_dir().as_deref())?;

    let cache = AvailabilityCache::default_location();
    let registry = Arc::new(AdapterRegistry::new());

    if args.check {
        let cache = cache.context("cannot locate home directory for the availability cache")?;
        let reports = cache.refresh(&registry).await?;
        println!("{}", render_report(&reports));
        println!("Availability saved to {}", cache.path().display());
        return Ok(());
    }

    let resolution = ServerConfig::resolve(&env, &args.overrides(), cache.as_ref())
        .map_err(|e| anyhow::anyhow!(e.tagged()))?;
    if !resolution.rejected.is_empty() {
        warn!(rejected = ?resolution.rejected, "unknown agents in override list");
    }
    let config = resolution.config;
    info!(
        agents = ?config.enabled.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
        working_dir = ?config.working_dir,
        verbose = config.verbose,
        "configuration loaded"
    );

    let metrics = Arc::new(MetricsCollector::new(config.metrics_enabled, None));
    let gateway = Gateway::new(config, registry, metrics);
    run_mcp_server(ToolRouter::new(Arc::new(gateway))).await
}
