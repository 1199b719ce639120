//! Per-kind tool surface: `check_<kind>_availability` and `<kind>_subagent`.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::adapter::AgentKind;
use crate::config::MAX_TIMEOUT_SECS;
use crate::gateway::SubagentRequest;
use crate::server::ToolDefinition;

const CHECK_PREFIX: &str = "check_";
const CHECK_SUFFIX: &str = "_availability";
const SUBAGENT_SUFFIX: &str = "_subagent";

/// One gateway operation addressed by tool name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOp {
    CheckAvailability(AgentKind),
    Subagent(AgentKind),
}

impl ToolOp {
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(kind) = name
            .strip_prefix(CHECK_PREFIX)
            .and_then(|rest| rest.strip_suffix(CHECK_SUFFIX))
        {
            return kind.parse().ok().map(Self::CheckAvailability);
        }
        name.strip_suffix(SUBAGENT_SUFFIX)
            .and_then(|kind| kind.parse().ok())
            .map(Self::Subagent)
    }

    pub fn name(self) -> String {
        match self {
            Self::CheckAvailability(kind) => format!("{CHECK_PREFIX}{kind}{CHECK_SUFFIX}"),
            Self::Subagent(kind) => format!("{kind}{SUBAGENT_SUFFIX}"),
        }
    }
}

/// Arguments of `<kind>_subagent`.
#[derive(Debug, Deserialize)]
pub struct SubagentParams {
    pub instruction: String,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub is_initial_prompt: bool,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl SubagentParams {
    /// Parse and validate raw tool arguments.
    ///
    /// # Errors
    ///
    /// Missing or mistyped fields, a blank instruction, or a timeout outside
    /// `1..=MAX_TIMEOUT_SECS`.
    pub fn from_arguments(arguments: serde_json::Value) -> Result<SubagentRequest> {
        let arguments = if arguments.is_null() {
            serde_json::json!({})
        } else {
            arguments
        };
        let params: Self =
            serde_json::from_value(arguments).context("invalid subagent parameters")?;
        if params.instruction.trim().is_empty() {
            bail!("instruction must not be empty");
        }
        let timeout = match params.timeout_seconds {
            Some(secs @ 1..=MAX_TIMEOUT_SECS) => Some(Duration::from_secs(secs)),
            Some(_) => bail!("timeout_seconds must be between 1 and {MAX_TIMEOUT_SECS}"),
            None => None,
        };
        Ok(SubagentRequest {
            instruction: params.instruction,
            project_path: params.project_path,
            session_id: params.session_id,
            model: params.model,
            is_initial_prompt: params.is_initial_prompt,
            timeout,
        })
    }
}

pub fn check_definition(kind: AgentKind) -> ToolDefinition {
    ToolDefinition {
        name: ToolOp::CheckAvailability(kind).name(),
        description: format!(
            "Check if {} CLI is available and configured properly. Returns a status message.",
            kind.display_name()
        ),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {}
        }),
    }
}

pub fn subagent_definition(kind: AgentKind) -> ToolDefinition {
    let name = kind.display_name();
    ToolDefinition {
        name: ToolOp::Subagent(kind).name(),
        description: format!(
            "Delegate a coding task to the {name} CLI. The agent runs in the project \
             directory and its output is summarized into a single response. \
             Progress is reported per output line."
        ),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "instruction": {
                    "type": "string",
                    "description": format!("Task for {name} to execute")
                },
                "project_path": {
                    "type": "string",
                    "description": "Working directory (default: server working directory or cwd)"
                },
                "session_id": {
                    "type": "string",
                    "description": "Session to continue, for tools that support sessions"
                },
                "model": {
                    "type": "string",
                    "description": "Model name or alias understood by the tool"
                },
                "is_initial_prompt": {
                    "type": "boolean",
                    "description": "Start a fresh session instead of resuming",
                    "default": false
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Kill the agent process after this many seconds",
                    "minimum": 1,
                    "maximum": MAX_TIMEOUT_SECS
                }
            },
            "required": ["instruction"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_round_trip() {
        for kind in AgentKind::ALL {
            for op in [ToolOp::CheckAvailability(kind), ToolOp::Subagent(kind)] {
                assert_eq!(ToolOp::parse(&op.name()), Some(op));
            }
        }
        assert_eq!(ToolOp::parse("check_codex_availability"), Some(ToolOp::CheckAvailability(AgentKind::Codex)));
        assert_eq!(ToolOp::parse("rovo_subagent"), Some(ToolOp::Subagent(AgentKind::Rovo)));
        assert_eq!(ToolOp::parse("bogus_subagent"), None);
        assert_eq!(ToolOp::parse("read"), None);
    }

    #[test]
    fn test_params_defaults() {
        let req = SubagentParams::from_arguments(serde_json::json!({"instruction": "fix it"}))
            .expect("parse");
        assert_eq!(req.instruction, "fix it");
        assert!(req.project_path.is_none());
        assert!(!req.is_initial_prompt);
        assert!(req.timeout.is_none());
    }

    #[test]
    fn test_params_full() {
        let req = SubagentParams::from_arguments(serde_json::json!({
            "instruction": "go",
            "project_path": "/tmp",
            "session_id": "s1",
            "model": "opus-4.1",
            "is_initial_prompt": true,
            "timeout_seconds": 30
        }))
        .expect("parse");
        assert_eq!(req.project_path.as_deref(), Some("/tmp"));
        assert_eq!(req.session_id.as_deref(), Some("s1"));
        assert_eq!(req.model.as_deref(), Some("opus-4.1"));
        assert!(req.is_initial_prompt);
        assert_eq!(req.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_params_rejected() {
        assert!(SubagentParams::from_arguments(serde_json::Value::Null).is_err());
        assert!(SubagentParams::from_arguments(serde_json::json!({"instruction": "  "})).is_err());
        assert!(SubagentParams::from_arguments(serde_json::json!({"instruction": 5})).is_err());
        assert!(
            SubagentParams::from_arguments(serde_json::json!({"instruction": "x", "timeout_seconds": 0}))
                .is_err()
        );
    }

    #[test]
    fn test_timeout_upper_bound() {
        let err = SubagentParams::from_arguments(
            serde_json::json!({"instruction": "x", "timeout_seconds": u64::MAX}),
        )
        .expect_err("above the cap");
        assert!(err.to_string().contains("between 1 and 86400"));
        let at_cap = SubagentParams::from_arguments(
            serde_json::json!({"instruction": "x", "timeout_seconds": MAX_TIMEOUT_SECS}),
        )
        .expect("at the cap");
        assert_eq!(at_cap.timeout, Some(Duration::from_secs(MAX_TIMEOUT_SECS)));
        let def = subagent_definition(AgentKind::Codex);
        assert_eq!(def.input_schema["properties"]["timeout_seconds"]["maximum"], MAX_TIMEOUT_SECS);
    }

    #[test]
    fn test_schema_requires_instruction() {
        let def = subagent_definition(AgentKind::Claude);
        assert_eq!(def.name, "claude_subagent");
        assert_eq!(def.input_schema["required"][0], "instruction");
        assert!(def.description.contains("Claude Code"));
    }
}
