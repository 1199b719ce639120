//! Tool router: maps MCP tool names onto gateway operations.
//!
//! Every kind exposes two tools, `check_<kind>_availability` and
//! `<kind>_subagent`, so the router serves 28 tools. Gateway outcomes
//! (including `❌` failures) are ordinary text results; only an unknown
//! tool or malformed arguments produce `is_error` results. The enabled gate
//! runs before argument parsing, so a disabled kind always answers with the
//! same text whatever arguments it was given.

pub mod subagent;

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::adapter::AgentKind;
use crate::gateway::{Gateway, ProgressSink};
use crate::server::{ToolCallResult, ToolDefinition};

pub use subagent::{SubagentParams, ToolOp};

/// Tool router that dispatches MCP tool calls to the gateway.
#[derive(Debug, Clone)]
pub struct ToolRouter {
    gateway: Arc<Gateway>,
}

impl ToolRouter {
    pub const fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// All tool definitions, two per kind in declaration order.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        AgentKind::ALL
            .into_iter()
            .flat_map(|kind| {
                [
                    subagent::check_definition(kind),
                    subagent::subagent_definition(kind),
                ]
            })
            .collect()
    }

    /// Call a tool by name with the given JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments of an enabled subagent tool are
    /// malformed.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
        progress: &dyn ProgressSink,
    ) -> Result<ToolCallResult> {
        debug!(tool = name, "dispatching tool call");

        let text = match ToolOp::parse(name) {
            Some(ToolOp::CheckAvailability(kind)) => self.gateway.check_availability(kind).await,
            Some(ToolOp::Subagent(kind)) => match self.gateway.ensure_enabled(kind) {
                Err(e) => {
                    debug!(agent = %kind, "subagent call for disabled agent");
                    e.user_message(false)
                }
                Ok(()) => {
                    let request = SubagentParams::from_arguments(arguments)?;
                    self.gateway.run_subagent(kind, request, progress).await
                }
            },
            None => return Ok(ToolCallResult::error(format!("Unknown tool: {name}"))),
        };
        Ok(ToolCallResult::text(text))
    }
}
