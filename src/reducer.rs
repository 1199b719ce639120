//! Response reducer: folds one invocation's message stream into one string.
//!
//! Classification is a total match on [`MessageType`]:
//!
//! | type                          | effect                                   |
//! |-------------------------------|------------------------------------------|
//! | `Error`                       | stop, return a `❌` failure              |
//! | `ToolUse`                     | recorded verbatim under tool activity    |
//! | `ToolResult`                  | recorded as `Tool result: …`             |
//! | `Result`                      | kept aside; used only if nothing else    |
//! | `Text`, `Assistant`, `System` | trimmed, non-empty → assistant responses |
//!
//! The same reducer serves every adapter.

use crate::message::{Message, MessageType};

/// Whether the reducer still accepts messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// An ERROR message was seen; the caller must stop feeding messages.
    Stop,
}

/// Final outcome of one reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub text: String,
    /// Error content when the stream ended in an ERROR message.
    pub error: Option<String>,
    pub message_count: usize,
    pub tool_uses: usize,
}

impl Reduction {
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ResponseReducer {
    agent: String,
    verbose: bool,
    agent_responses: Vec<String>,
    tool_uses: Vec<String>,
    result: Option<String>,
    error: Option<String>,
    message_count: usize,
}

impl ResponseReducer {
    /// `agent` is the display name used in headings and failure text.
    pub fn new(agent: impl Into<String>, verbose: bool) -> Self {
        Self {
            agent: agent.into(),
            verbose,
            agent_responses: Vec::new(),
            tool_uses: Vec::new(),
            result: None,
            error: None,
            message_count: 0,
        }
    }

    /// Fold one message. Messages pushed after [`Flow::Stop`] are ignored.
    pub fn push(&mut self, message: &Message) -> Flow {
        if self.error.is_some() {
            return Flow::Stop;
        }
        self.message_count += 1;
        match message.message_type {
            MessageType::Error => {
                self.error = Some(message.content.clone());
                return Flow::Stop;
            }
            MessageType::ToolUse => self.tool_uses.push(message.content.clone()),
            MessageType::ToolResult => {
                self.tool_uses.push(format!("Tool result: {}", message.content));
            }
            MessageType::Result => {
                let content = message.content.trim();
                if !content.is_empty() {
                    self.result = Some(content.to_owned());
                }
            }
            MessageType::Text | MessageType::Assistant | MessageType::System => {
                let content = message.content.trim();
                if !content.is_empty() {
                    self.agent_responses.push(content.to_owned());
                }
            }
        }
        Flow::Continue
    }

    pub fn finish(self) -> Reduction {
        let tool_uses = self.tool_uses.len();
        let message_count = self.message_count;
        if let Some(error) = self.error {
            return Reduction {
                text: format!("❌ {} execution failed: {error}", self.agent),
                error: Some(error),
                message_count,
                tool_uses,
            };
        }

        let mut responses = self.agent_responses;
        if responses.is_empty() {
            responses.extend(self.result);
        }

        let summary = summarize(&self.agent, &responses, &self.tool_uses);
        let text = match responses.last() {
            Some(last) if !self.verbose => last.clone(),
            _ => summary,
        };
        Reduction {
            text,
            error: None,
            message_count,
            tool_uses,
        }
    }

    /// Reduce a complete, already-collected sequence.
    pub fn reduce<'a>(
        agent: impl Into<String>,
        verbose: bool,
        messages: impl IntoIterator<Item = &'a Message>,
    ) -> Reduction {
        let mut reducer = Self::new(agent, verbose);
        for message in messages {
            if reducer.push(message) == Flow::Stop {
                break;
            }
        }
        reducer.finish()
    }
}

fn summarize(agent: &str, responses: &[String], tool_uses: &[String]) -> String {
    let mut parts = Vec::new();
    match responses {
        [] => {}
        [only] => parts.push(format!("**{agent} Response:**\n{only}")),
        many => parts.push(format!("**{agent} Response:**\n{}", many.join("\n\n"))),
    }
    if !tool_uses.is_empty() {
        parts.push(format!("🔧 **Tools Used ({}):**", tool_uses.len()));
        parts.extend(tool_uses.iter().map(|t| format!("• {t}")));
    }
    if parts.is_empty() {
        parts.push(format!(
            "✅ {agent} task completed successfully (no detailed output captured)"
        ));
    }
    parts.join("\n\n")
}
