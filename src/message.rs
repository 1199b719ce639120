//! Normalized event model.
//!
//! Every line an external tool prints (and every failure while running it)
//! becomes one [`Message`]. Messages are immutable and live only for the
//! duration of a single invocation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session id used when the caller does not supply one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Semantic origin of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Assistant,
    User,
    System,
    Tool,
}

/// Classification tag consumed by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Assistant,
    ToolUse,
    ToolResult,
    Error,
    /// Terminal summary event some tools emit after their assistant output.
    Result,
    System,
}

impl MessageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Assistant => "assistant",
            Self::ToolUse => "tool_use",
            Self::ToolResult => "tool_result",
            Self::Error => "error",
            Self::Result => "result",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event emitted while an external tool runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Working directory the invocation ran in (absolute path).
    pub project_id: String,
    pub role: Role,
    pub message_type: MessageType,
    pub content: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        project_id: impl Into<String>,
        role: Role,
        message_type: MessageType,
        content: impl Into<String>,
        session_id: Option<&str>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            role,
            message_type,
            content: content.into(),
            session_id: session_id.unwrap_or(DEFAULT_SESSION_ID).to_owned(),
            created_at: Utc::now(),
        }
    }

    /// Assistant-authored line of output.
    pub fn assistant(
        project_id: impl Into<String>,
        message_type: MessageType,
        content: impl Into<String>,
        session_id: Option<&str>,
    ) -> Self {
        Self::new(project_id, Role::Assistant, message_type, content, session_id)
    }

    /// Terminal failure event.
    pub fn error(project_id: impl Into<String>, content: impl Into<String>, session_id: Option<&str>) -> Self {
        Self::new(project_id, Role::Assistant, MessageType::Error, content, session_id)
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.message_type, MessageType::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_id() {
        let msg = Message::assistant("/tmp/p", MessageType::Text, "hi", None);
        assert_eq!(msg.session_id, DEFAULT_SESSION_ID);
        assert_eq!(msg.role, Role::Assistant);
        assert!(!msg.is_error());
    }

    #[test]
    fn test_error_constructor() {
        let msg = Message::error("/tmp/p", "boom", Some("s-1"));
        assert!(msg.is_error());
        assert_eq!(msg.session_id, "s-1");
    }

    #[test]
    fn test_type_wire_names() {
        let json = serde_json::to_string(&MessageType::ToolResult).expect("serialize");
        assert_eq!(json, "\"tool_result\"");
        assert_eq!(MessageType::ToolUse.to_string(), "tool_use");
    }
}
