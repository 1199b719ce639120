//! The fourteen supported external tools.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of one external command-line assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Codex,
    Claude,
    Cursor,
    Gemini,
    Qwen,
    Kiro,
    Copilot,
    Grok,
    Kilocode,
    Crush,
    Opencode,
    Antigravity,
    Factory,
    Rovo,
}

impl AgentKind {
    pub const COUNT: usize = 14;

    /// Every known kind, in registration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Codex,
        Self::Claude,
        Self::Cursor,
        Self::Gemini,
        Self::Qwen,
        Self::Kiro,
        Self::Copilot,
        Self::Grok,
        Self::Kilocode,
        Self::Crush,
        Self::Opencode,
        Self::Antigravity,
        Self::Factory,
        Self::Rovo,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Claude => "claude",
            Self::Cursor => "cursor",
            Self::Gemini => "gemini",
            Self::Qwen => "qwen",
            Self::Kiro => "kiro",
            Self::Copilot => "copilot",
            Self::Grok => "grok",
            Self::Kilocode => "kilocode",
            Self::Crush => "crush",
            Self::Opencode => "opencode",
            Self::Antigravity => "antigravity",
            Self::Factory => "factory",
            Self::Rovo => "rovo",
        }
    }

    /// Human-readable product name used in responses and logs.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Codex => "Codex",
            Self::Claude => "Claude Code",
            Self::Cursor => "Cursor",
            Self::Gemini => "Gemini",
            Self::Qwen => "Qwen",
            Self::Kiro => "Kiro",
            Self::Copilot => "GitHub Copilot",
            Self::Grok => "Grok",
            Self::Kilocode => "Kilocode",
            Self::Crush => "Crush",
            Self::Opencode => "OpenCode",
            Self::Antigravity => "Antigravity",
            Self::Factory => "Factory/Droid",
            Self::Rovo => "Rovo Dev",
        }
    }

    /// Position in [`AgentKind::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name that does not match any known kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown agent kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for AgentKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == needle)
            .ok_or_else(|| UnknownKind(s.trim().to_owned()))
    }
}
