//! `roundtable-mcp`: one MCP server in front of fourteen coding CLIs.
//!
//! Each supported command-line assistant (Codex, Claude Code, Cursor,
//! Gemini, …) is exposed as two MCP tools over stdio (JSON-RPC 2.0,
//! newline-delimited): `check_<kind>_availability` and `<kind>_subagent`.
//! A subagent call spawns the tool in the project directory, turns each
//! output line into a [`Message`], forwards it as progress and reduces the
//! stream into a single text response.
//!
//! # Architecture
//!
//! ```text
//! stdin (JSON-RPC) → server → ToolRouter → Gateway ─┬→ AdapterRegistry → CliAdapter → child process
//!                                                   ├→ ResponseReducer
//!                                                   └→ MetricsCollector (optional)
//! stdout (JSON-RPC) ←───────────── results + progress notifications
//! ```

pub mod adapter;
pub mod availability;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod message;
pub mod metrics;
pub mod reducer;
pub mod registry;
pub mod retry;
pub mod server;
pub mod tools;
pub mod util;

pub use adapter::{Agent, AgentKind, ExecutionRequest, MessageStream};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{Gateway, NoProgress, ProgressSink, SubagentRequest};
pub use message::{Message, MessageType, Role};
pub use server::run_mcp_server;
