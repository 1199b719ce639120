//! Startup configuration.
//!
//! Inputs are gathered once: an [`EnvVars`] snapshot of the process
//! environment, the parsed command line ([`CliOverrides`]) and, if needed,
//! the availability cache. [`ServerConfig::resolve`] folds them into one
//! immutable value. Command-line values beat environment values.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::adapter::AgentKind;
use crate::availability::AvailabilityCache;
use crate::error::{GatewayError, GatewayResult};
use crate::retry::RetryPolicy;

pub const ENV_SUBAGENTS: &str = "CLI_MCP_SUBAGENTS";
pub const ENV_IGNORE_AVAILABILITY: &str = "CLI_MCP_IGNORE_AVAILABILITY";
pub const ENV_WORKING_DIR: &str = "CLI_MCP_WORKING_DIR";
pub const ENV_DEBUG: &str = "CLI_MCP_DEBUG";
pub const ENV_VERBOSE: &str = "CLI_MCP_VERBOSE";
pub const ENV_METRICS: &str = "CLI_MCP_METRICS";
pub const ENV_TIMEOUT: &str = "CLI_MCP_TIMEOUT";

/// Upper bound for any execution timeout, in seconds (one day).
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

const ALL_VARS: [&str; 7] = [
    ENV_SUBAGENTS,
    ENV_IGNORE_AVAILABILITY,
    ENV_WORKING_DIR,
    ENV_DEBUG,
    ENV_VERBOSE,
    ENV_METRICS,
    ENV_TIMEOUT,
];

/// Snapshot of the `CLI_MCP_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    vars: BTreeMap<String, String>,
}

impl EnvVars {
    pub fn from_process() -> Self {
        Self::from_pairs(
            ALL_VARS
                .iter()
                .filter_map(|name| std::env::var(name).ok().map(|v| (*name, v))),
        )
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `name`, `None` when unset or blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn flag(&self, name: &str, default: bool) -> bool {
        self.get(name).map_or(default, parse_bool)
    }
}

/// `true`, `1`, `yes`, `on` (any case) are true; everything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Values taken from the command line. `None`/`false` defer to the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub agents: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub debug: bool,
    pub verbose: bool,
    pub metrics: bool,
    pub timeout_secs: Option<u64>,
}

/// Where the enabled-set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnabledSource {
    Override,
    IgnoreAvailability,
    Cache,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Enabled kinds in declaration order, no duplicates.
    pub enabled: Vec<AgentKind>,
    pub working_dir: Option<PathBuf>,
    pub debug: bool,
    pub verbose: bool,
    pub metrics_enabled: bool,
    /// Default per-invocation execution limit.
    pub execution_timeout: Option<Duration>,
    /// Retry policy for availability probes.
    pub probe_retry: RetryPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: AgentKind::ALL.to_vec(),
            working_dir: None,
            debug: false,
            verbose: false,
            metrics_enabled: false,
            execution_timeout: None,
            probe_retry: RetryPolicy::fixed(2, Duration::from_secs(1)),
        }
    }
}

/// Result of [`ServerConfig::resolve`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub config: ServerConfig,
    pub source: EnabledSource,
    /// Override names that matched no known kind.
    pub rejected: Vec<String>,
}

impl ServerConfig {
    pub fn is_enabled(&self, kind: AgentKind) -> bool {
        self.enabled.contains(&kind)
    }

    /// Build the configuration.
    ///
    /// Enabled-set priority: explicit list (`--agents`, then
    /// `CLI_MCP_SUBAGENTS`), the ignore-availability flag (default on), the
    /// availability cache, and finally every kind.
    ///
    /// # Errors
    ///
    /// A malformed timeout value.
    pub fn resolve(
        env: &EnvVars,
        cli: &CliOverrides,
        cache: Option<&AvailabilityCache>,
    ) -> GatewayResult<Resolution> {
        let override_list = cli
            .agents
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| env.get(ENV_SUBAGENTS));

        let mut rejected = Vec::new();
        let (enabled, source) = if let Some(list) = override_list {
            let (kinds, bad) = parse_agent_list(list);
            if !bad.is_empty() {
                warn!(invalid = ?bad, "ignoring unknown agent names");
            }
            rejected = bad;
            (kinds, EnabledSource::Override)
        } else if env.flag(ENV_IGNORE_AVAILABILITY, true) {
            (AgentKind::ALL.to_vec(), EnabledSource::IgnoreAvailability)
        } else if let Some(kinds) = cache.and_then(AvailabilityCache::available_kinds) {
            (kinds, EnabledSource::Cache)
        } else {
            warn!("no usable availability cache; enabling all agents (run with --check to refresh)");
            (AgentKind::ALL.to_vec(), EnabledSource::Fallback)
        };

        let execution_timeout = match cli.timeout_secs {
            Some(secs) => Some(timeout_from_secs(secs)?),
            None => env
                .get(ENV_TIMEOUT)
                .map(|raw| {
                    raw.parse::<u64>()
                        .map_err(|e| {
                            GatewayError::configuration(format!(
                                "invalid {ENV_TIMEOUT} value '{raw}': {e}"
                            ))
                        })
                        .and_then(timeout_from_secs)
                })
                .transpose()?,
        };

        let config = Self {
            enabled,
            working_dir: cli
                .working_dir
                .clone()
                .or_else(|| env.get(ENV_WORKING_DIR).map(PathBuf::from)),
            debug: cli.debug || env.flag(ENV_DEBUG, true),
            verbose: cli.verbose || env.flag(ENV_VERBOSE, false),
            metrics_enabled: cli.metrics || env.flag(ENV_METRICS, false),
            execution_timeout,
            ..Self::default()
        };

        info!(
            enabled = ?config.enabled.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            source = ?source,
            "resolved enabled agents"
        );
        Ok(Resolution {
            config,
            source,
            rejected,
        })
    }
}

fn timeout_from_secs(secs: u64) -> GatewayResult<Duration> {
    if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
        return Err(GatewayError::configuration(format!(
            "execution timeout must be between 1 and {MAX_TIMEOUT_SECS} seconds"
        )));
    }
    Ok(Duration::from_secs(secs))
}

/// Split a comma list into known kinds (declaration order, deduplicated) and
/// rejected names.
pub fn parse_agent_list(list: &str) -> (Vec<AgentKind>, Vec<String>) {
    let mut rejected = Vec::new();
    let mut picked = [false; AgentKind::COUNT];
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match name.parse::<AgentKind>() {
            Ok(kind) => picked[kind.index()] = true,
            Err(e) => rejected.push(e.0),
        }
    }
    let kinds = AgentKind::ALL
        .into_iter()
        .filter(|k| picked[k.index()])
        .collect();
    (kinds, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvVars {
        EnvVars::from_pairs(pairs.iter().copied())
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_override_drops_unknown_names() {
        let r = ServerConfig::resolve(
            &env(&[(ENV_SUBAGENTS, "codex,bogus,qwen")]),
            &CliOverrides::default(),
            None,
        )
        .expect("resolve");
        assert_eq!(r.config.enabled, vec![AgentKind::Codex, AgentKind::Qwen]);
        assert_eq!(r.rejected, vec!["bogus".to_owned()]);
        assert_eq!(r.source, EnabledSource::Override);
        assert!(logs_contain("ignoring unknown agent names"));
        assert!(logs_contain("bogus"));
    }

    #[test]
    fn test_cli_agents_beat_env() {
        let cli = CliOverrides {
            agents: Some(" Gemini , kiro ".to_owned()),
            ..CliOverrides::default()
        };
        let r = ServerConfig::resolve(&env(&[(ENV_SUBAGENTS, "codex")]), &cli, None)
            .expect("resolve");
        assert_eq!(r.config.enabled, vec![AgentKind::Gemini, AgentKind::Kiro]);
    }

    #[test]
    fn test_blank_override_falls_through() {
        let r = ServerConfig::resolve(&env(&[(ENV_SUBAGENTS, "  ")]), &CliOverrides::default(), None)
            .expect("resolve");
        assert_eq!(r.source, EnabledSource::IgnoreAvailability);
        assert_eq!(r.config.enabled.len(), AgentKind::COUNT);
    }

    #[test]
    fn test_cache_used_when_availability_respected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"codex": true, "claude": false, "rovo": true}"#).expect("write");
        let cache = AvailabilityCache::new(path);

        let r = ServerConfig::resolve(
            &env(&[(ENV_IGNORE_AVAILABILITY, "false")]),
            &CliOverrides::default(),
            Some(&cache),
        )
        .expect("resolve");
        assert_eq!(r.source, EnabledSource::Cache);
        assert_eq!(r.config.enabled, vec![AgentKind::Codex, AgentKind::Rovo]);
    }

    #[test]
    fn test_missing_cache_enables_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = AvailabilityCache::new(dir.path().join("absent.json"));
        let r = ServerConfig::resolve(
            &env(&[(ENV_IGNORE_AVAILABILITY, "0")]),
            &CliOverrides::default(),
            Some(&cache),
        )
        .expect("resolve");
        assert_eq!(r.source, EnabledSource::Fallback);
        assert_eq!(r.config.enabled, AgentKind::ALL.to_vec());
    }

    #[test]
    fn test_cache_with_nothing_available_enables_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        for body in ["{}", r#"{"codex": false, "claude": false}"#] {
            let path = dir.path().join("cache.json");
            std::fs::write(&path, body).expect("write");
            let cache = AvailabilityCache::new(path);
            let r = ServerConfig::resolve(
                &env(&[(ENV_IGNORE_AVAILABILITY, "false")]),
                &CliOverrides::default(),
                Some(&cache),
            )
            .expect("resolve");
            assert_eq!(r.source, EnabledSource::Fallback, "{body}");
            assert_eq!(r.config.enabled, AgentKind::ALL.to_vec());
        }
    }

    #[test]
    fn test_flags_and_timeout() {
        let r = ServerConfig::resolve(
            &env(&[
                (ENV_DEBUG, "off"),
                (ENV_VERBOSE, "YES"),
                (ENV_METRICS, "1"),
                (ENV_TIMEOUT, "90"),
                (ENV_WORKING_DIR, "/srv/work"),
            ]),
            &CliOverrides::default(),
            None,
        )
        .expect("resolve");
        assert!(!r.config.debug);
        assert!(r.config.verbose);
        assert!(r.config.metrics_enabled);
        assert_eq!(r.config.execution_timeout, Some(Duration::from_secs(90)));
        assert_eq!(r.config.working_dir, Some(PathBuf::from("/srv/work")));
    }

    #[test]
    fn test_cli_values_win() {
        let cli = CliOverrides {
            working_dir: Some(PathBuf::from("/cli")),
            debug: true,
            timeout_secs: Some(5),
            ..CliOverrides::default()
        };
        let r = ServerConfig::resolve(
            &env(&[(ENV_DEBUG, "false"), (ENV_TIMEOUT, "90"), (ENV_WORKING_DIR, "/env")]),
            &cli,
            None,
        )
        .expect("resolve");
        assert!(r.config.debug);
        assert_eq!(r.config.execution_timeout, Some(Duration::from_secs(5)));
        assert_eq!(r.config.working_dir, Some(PathBuf::from("/cli")));
    }

    #[test]
    fn test_bad_timeout_is_configuration_error() {
        let err = ServerConfig::resolve(
            &env(&[(ENV_TIMEOUT, "soon")]),
            &CliOverrides::default(),
            None,
        )
        .expect_err("invalid");
        assert_eq!(err.code(), "CONFIG_ERROR");

        let zero = CliOverrides {
            timeout_secs: Some(0),
            ..CliOverrides::default()
        };
        assert!(ServerConfig::resolve(&EnvVars::default(), &zero, None).is_err());

        let huge = CliOverrides {
            timeout_secs: Some(u64::MAX),
            ..CliOverrides::default()
        };
        let err = ServerConfig::resolve(&EnvVars::default(), &huge, None).expect_err("too large");
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(
            ServerConfig::resolve(&env(&[(ENV_TIMEOUT, "86401")]), &CliOverrides::default(), None)
                .is_err()
        );
        let max = ServerConfig::resolve(&env(&[(ENV_TIMEOUT, "86400")]), &CliOverrides::default(), None)
            .expect("at the cap");
        assert_eq!(max.config.execution_timeout, Some(Duration::from_secs(MAX_TIMEOUT_SECS)));
    }

    #[test]
    fn test_parse_bool_forms() {
        for yes in ["true", "TRUE", "1", "yes", "On"] {
            assert!(parse_bool(yes), "{yes}");
        }
        for no in ["false", "0", "no", "off", "maybe"] {
            assert!(!parse_bool(no), "{no}");
        }
    }

    #[test]
    fn test_duplicate_override_names_collapse() {
        let (kinds, rejected) = parse_agent_list("qwen,codex,QWEN,,");
        assert_eq!(kinds, vec![AgentKind::Codex, AgentKind::Qwen]);
        assert!(rejected.is_empty());
    }
}
