//! MCP Server — stdio transport, JSON-RPC 2.0, newline-delimited.
//!
//! Implements the Model Context Protocol (spec 2025-06-18) server over
//! stdin/stdout. Requests are read one per line; responses and
//! notifications are funneled through a single writer task so concurrent
//! tool calls never interleave bytes on stdout.
//!
//! Protocol flow:
//! 1. Client sends `initialize` → server responds with capabilities
//! 2. Client sends `notifications/initialized`
//! 3. Client sends `tools/list` → server returns tool definitions
//! 4. Client sends `tools/call` → server runs the tool in its own task,
//!    emitting `notifications/progress` when a progress token was supplied
//! 5. Client closes stdin → server waits for in-flight calls, then exits

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::gateway::ProgressSink;
use crate::tools::ToolRouter;

/// Maximum size of a single JSON-RPC line (10 MiB).
const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "roundtable-mcp";

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 types
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Server-initiated JSON-RPC notification.
#[derive(Debug, Serialize)]
struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
}

// ---------------------------------------------------------------------------
// MCP protocol types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfo {
    name: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct ServerCapabilities {
    tools: ToolsCapability,
    logging: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolsCapability {
    list_changed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResult {
    protocol_version: String,
    capabilities: ServerCapabilities,
    server_info: ServerInfo,
}

/// MCP tool definition for tools/list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolsListResult {
    tools: Vec<ToolDefinition>,
}

#[derive(Debug, Default, Deserialize)]
struct RequestMeta {
    #[serde(rename = "progressToken")]
    progress_token: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
    #[serde(rename = "_meta", default)]
    meta: RequestMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelledParams {
    request_id: serde_json::Value,
    #[serde(default)]
    reason: Option<String>,
}

/// MCP content item in tools/call response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// MCP tools/call result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ContentItem>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem {
                content_type: "text".to_owned(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound channel and progress sink
// ---------------------------------------------------------------------------

/// Serialized lines waiting for the writer task.
type Outbox = mpsc::UnboundedSender<String>;

fn send(outbox: &Outbox, value: &impl Serialize) {
    match serde_json::to_string(value) {
        Ok(line) => {
            if outbox.send(line).is_err() {
                debug!("writer closed, dropping outbound message");
            }
        }
        Err(e) => error!(error = %e, "failed to serialize outbound message"),
    }
}

fn notify(outbox: &Outbox, method: &str, params: serde_json::Value) {
    send(
        outbox,
        &JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        },
    );
}

/// Progress sink bound to one `tools/call`.
struct McpProgress {
    token: Option<serde_json::Value>,
    outbox: Outbox,
}

#[async_trait]
impl ProgressSink for McpProgress {
    async fn report_progress(&self, current: u64, total: Option<u64>, message: &str) {
        let Some(token) = &self.token else {
            return;
        };
        let mut params = serde_json::json!({
            "progressToken": token,
            "progress": current,
            "message": message,
        });
        if let Some(total) = total {
            params["total"] = total.into();
        }
        notify(&self.outbox, "notifications/progress", params);
    }

    async fn error(&self, message: &str) {
        notify(
            &self.outbox,
            "notifications/message",
            serde_json::json!({
                "level": "error",
                "logger": SERVER_NAME,
                "data": message,
            }),
        );
    }
}

// ---------------------------------------------------------------------------
// Server main loop
// ---------------------------------------------------------------------------

/// Run the MCP server on the process's stdin/stdout.
///
/// # Errors
///
/// Returns an error if stdin/stdout I/O fails fatally.
pub async fn run_mcp_server(router: ToolRouter) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(router, stdin, tokio::io::stdout()).await
}

/// Serve MCP over an arbitrary line-oriented transport.
///
/// Returns after `reader` reaches EOF and every in-flight tool call has
/// finished and been written.
///
/// # Errors
///
/// Returns an error if reading or writing fails fatally.
pub async fn serve<R, W>(router: ToolRouter, mut reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    info!(tools = router.list_tools().len(), "roundtable MCP server starting");

    let router = Arc::new(router);
    let (outbox, inbox) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_loop(writer, inbox));
    let in_flight: Arc<Mutex<HashMap<String, AbortHandle>>> = Arc::default();
    let mut calls = JoinSet::new();
    let mut line_buf = String::new();

    loop {
        line_buf.clear();
        let frame = read_line_limited(&mut reader, &mut line_buf, MAX_LINE_BYTES)
            .await
            .context("failed to read from stdin")?;
        match frame {
            Frame::Eof => {
                info!("stdin closed, shutting down");
                break;
            }
            Frame::Oversized => {
                warn!(max_bytes = MAX_LINE_BYTES, "request line too long");
                send(
                    &outbox,
                    &error_response(None, -32700, &format!("parse error: line exceeds {MAX_LINE_BYTES} bytes")),
                );
                continue;
            }
            Frame::Line => {}
        }

        let trimmed = line_buf.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!(raw = trimmed, "received request");

        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "invalid JSON-RPC request");
                send(&outbox, &error_response(None, -32700, &format!("parse error: {e}")));
                continue;
            }
        };

        if request.jsonrpc != "2.0" {
            warn!(version = request.jsonrpc, "invalid JSON-RPC version (expected \"2.0\")");
            send(
                &outbox,
                &error_response(
                    request.id.clone(),
                    -32600,
                    &format!(
                        "invalid request: jsonrpc version must be \"2.0\", got \"{}\"",
                        request.jsonrpc
                    ),
                ),
            );
            continue;
        }

        let Some(id) = request.id.clone() else {
            handle_notification(&request, &in_flight);
            continue;
        };
        let JsonRpcRequest { method, params, .. } = request;

        match method.as_str() {
            "initialize" => send(&outbox, &handle_initialize(id)),
            "ping" => send(&outbox, &success_response(Some(id), &serde_json::json!({}))),
            "tools/list" => send(
                &outbox,
                &success_response(Some(id), &ToolsListResult { tools: router.list_tools() }),
            ),
            "tools/call" => {
                let key = id.to_string();
                let router = Arc::clone(&router);
                let outbox = outbox.clone();
                let registry = Arc::clone(&in_flight);
                let done_key = key.clone();
                // Registered before the task can deregister itself.
                let mut pending = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
                let handle = calls.spawn(async move {
                    let response = handle_tools_call(&router, id, params, &outbox).await;
                    registry
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&done_key);
                    send(&outbox, &response);
                });
                pending.insert(key, handle);
            }
            method => {
                warn!(method, "unknown method");
                send(
                    &outbox,
                    &error_response(Some(id), -32601, &format!("method not found: {method}")),
                );
            }
        }

        // Reap finished calls so the set does not grow without bound.
        while let Some(joined) = calls.try_join_next() {
            log_join(joined);
        }
    }

    while let Some(joined) = calls.join_next().await {
        log_join(joined);
    }
    drop(outbox);
    writer_task
        .await
        .context("writer task panicked")?
        .context("failed to write to stdout")?;

    info!("roundtable MCP server stopped");
    Ok(())
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => debug!("tool call cancelled"),
        Err(e) => error!(error = %e, "tool call task failed"),
    }
}

fn handle_notification(req: &JsonRpcRequest, in_flight: &Mutex<HashMap<String, AbortHandle>>) {
    match req.method.as_str() {
        "notifications/initialized" => info!("client initialized"),
        "notifications/cancelled" => match serde_json::from_value::<CancelledParams>(req.params.clone()) {
            Ok(params) => {
                let key = params.request_id.to_string();
                let handle = in_flight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&key);
                if let Some(handle) = handle {
                    info!(request_id = %key, reason = params.reason.as_deref().unwrap_or(""), "cancelling tool call");
                    handle.abort();
                } else {
                    debug!(request_id = %key, "cancel for unknown or finished request");
                }
            }
            Err(e) => warn!(error = %e, "invalid cancel notification"),
        },
        method => debug!(method, "notification ignored"),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn handle_initialize(id: serde_json::Value) -> JsonRpcResponse {
    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_owned(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
            logging: serde_json::json!({}),
        },
        server_info: ServerInfo {
            name: SERVER_NAME.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        },
    };
    success_response(Some(id), &result)
}

async fn handle_tools_call(
    router: &ToolRouter,
    id: serde_json::Value,
    params: serde_json::Value,
    outbox: &Outbox,
) -> JsonRpcResponse {
    let params: ToolCallParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => {
            return error_response(Some(id), -32602, &format!("invalid tools/call params: {e}"));
        }
    };

    let progress = McpProgress {
        token: params.meta.progress_token,
        outbox: outbox.clone(),
    };
    match router.call_tool(&params.name, params.arguments, &progress).await {
        Ok(result) => success_response(Some(id), &result),
        Err(e) => {
            error!(tool = params.name, error = %format!("{e:#}"), "tool call failed");
            success_response(Some(id), &ToolCallResult::error(format!("Error: {e:#}")))
        }
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn success_response(id: Option<serde_json::Value>, result: &impl Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(v) => JsonRpcResponse {
            jsonrpc: "2.0".to_owned(),
            id,
            result: Some(v),
            error: None,
        },
        Err(e) => {
            error!(error = %e, "failed to serialize success response");
            error_response(id, -32603, &format!("internal error: failed to serialize result: {e}"))
        }
    }
}

fn error_response(id: Option<serde_json::Value>, code: i64, message: &str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_owned(),
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_owned(),
            data: None,
        }),
    }
}

/// Drain the outbox, one line per message, flushing after each.
async fn write_loop<W>(mut out: W, mut inbox: mpsc::UnboundedReceiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = inbox.recv().await {
        debug!(response = line, "sending");
        out.write_all(line.as_bytes())
            .await
            .context("failed to write to stdout")?;
        out.write_all(b"\n")
            .await
            .context("failed to write newline to stdout")?;
        out.flush().await.context("failed to flush stdout")?;
    }
    out.shutdown().await.context("failed to close stdout")?;
    Ok(())
}

/// Outcome of reading one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Eof,
    Line,
    /// The line exceeded the limit and was discarded.
    Oversized,
}

/// Read a line from `reader` into `buf`, stopping at newline or `max_bytes`.
///
/// An oversized line is consumed through its newline and discarded. Invalid
/// UTF-8 is replaced so the JSON parser reports it.
async fn read_line_limited<R>(reader: &mut R, buf: &mut String, max_bytes: usize) -> Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let mut bytes = Vec::new();
    let mut oversized = false;
    loop {
        let available = reader.fill_buf().await.context("stdin fill_buf failed")?;
        if available.is_empty() {
            break;
        }
        let (consumed, found_newline) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        if !oversized && bytes.len() + consumed > max_bytes {
            oversized = true;
            bytes.clear();
        }
        if !oversized {
            bytes.extend_from_slice(&available[..consumed]);
        }
        reader.consume(consumed);
        if found_newline {
            break;
        }
    }

    if oversized {
        return Ok(Frame::Oversized);
    }
    if bytes.is_empty() {
        return Ok(Frame::Eof);
    }
    buf.push_str(&String::from_utf8_lossy(&bytes));
    Ok(Frame::Line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_line_limited_frames() {
        let mut reader = tokio::io::BufReader::new(&b"{\"a\":1}\nsecond"[..]);
        let mut buf = String::new();
        assert_eq!(
            read_line_limited(&mut reader, &mut buf, 1024).await.expect("read"),
            Frame::Line
        );
        assert_eq!(buf, "{\"a\":1}\n");

        buf.clear();
        assert_eq!(
            read_line_limited(&mut reader, &mut buf, 1024).await.expect("read"),
            Frame::Line
        );
        assert_eq!(buf, "second");

        buf.clear();
        assert_eq!(
            read_line_limited(&mut reader, &mut buf, 1024).await.expect("read"),
            Frame::Eof
        );
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped() {
        let input = format!("{}\nok\n", "x".repeat(64));
        let mut reader = tokio::io::BufReader::with_capacity(8, input.as_bytes());
        let mut buf = String::new();
        assert_eq!(
            read_line_limited(&mut reader, &mut buf, 16).await.expect("read"),
            Frame::Oversized
        );
        assert!(buf.is_empty());
        assert_eq!(
            read_line_limited(&mut reader, &mut buf, 16).await.expect("read"),
            Frame::Line
        );
        assert_eq!(buf, "ok\n");
    }

    #[test]
    fn test_tool_call_result_serialization() {
        let ok = serde_json::to_value(ToolCallResult::text("hi")).expect("json");
        assert_eq!(ok, serde_json::json!({"content": [{"type": "text", "text": "hi"}]}));
        let err = serde_json::to_value(ToolCallResult::error("bad")).expect("json");
        assert_eq!(err["isError"], true);
    }
}
