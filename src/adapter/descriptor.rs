//! Per-tool invocation descriptors.
//!
//! Everything that differs between the external tools lives here as data:
//! the executable, the probe arguments, how the argv for a task is built,
//! which message type stdout lines carry, and whether the tool supports
//! session continuity. The execution engine in [`super::cli`] is shared.

use std::path::Path;
use std::time::Duration;

use super::kind::AgentKind;
use crate::message::MessageType;

/// Upper bound on how long a `--help` style probe may take.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Inputs available when building the argv for one task.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub instruction: &'a str,
    pub project_path: &'a Path,
    /// Model name already translated through [`map_model`].
    pub model: Option<&'a str>,
    /// Session to resume, only set for session-capable tools.
    pub resume: Option<&'a str>,
}

/// Builds the argument list (excluding the program itself).
pub type ArgBuilder = fn(&Invocation<'_>) -> Vec<String>;

/// How one external tool is probed and invoked.
#[derive(Debug, Clone)]
pub struct CliDescriptor {
    pub kind: AgentKind,
    pub program: String,
    pub probe_args: Vec<String>,
    pub build_args: ArgBuilder,
    pub line_type: MessageType,
    pub sessions: bool,
    pub probe_timeout: Duration,
}

impl CliDescriptor {
    /// Descriptor with explicit program and argv shape.
    pub fn new(
        kind: AgentKind,
        program: impl Into<String>,
        probe_args: &[&str],
        build_args: ArgBuilder,
    ) -> Self {
        Self {
            kind,
            program: program.into(),
            probe_args: probe_args.iter().map(|s| (*s).to_owned()).collect(),
            build_args,
            line_type: MessageType::Assistant,
            sessions: false,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_line_type(mut self, line_type: MessageType) -> Self {
        self.line_type = line_type;
        self
    }

    #[must_use]
    pub const fn with_sessions(mut self) -> Self {
        self.sessions = true;
        self
    }

    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// The built-in descriptor for `kind`.
    pub fn for_kind(kind: AgentKind) -> Self {
        use AgentKind as K;
        use MessageType::Text;

        match kind {
            K::Codex => Self::new(kind, "codex", &["--help"], codex_args).with_sessions(),
            K::Claude => Self::new(kind, "claude", &["--help"], claude_args).with_sessions(),
            K::Cursor => Self::new(kind, "cursor-agent", &["--help"], cursor_args).with_sessions(),
            K::Gemini => Self::new(kind, "gemini", &["--help"], gemini_args),
            K::Qwen => Self::new(kind, "qwen", &["--help"], qwen_args).with_sessions(),
            K::Kiro => Self::new(kind, "kiro-cli", &["--help"], kiro_args),
            K::Copilot => {
                Self::new(kind, "gh", &["copilot", "--help"], copilot_args).with_line_type(Text)
            }
            K::Grok => Self::new(kind, "grok", &["--help"], grok_args).with_line_type(Text),
            K::Kilocode => {
                Self::new(kind, "kilocode", &["--help"], kilocode_args).with_sessions()
            }
            K::Crush => Self::new(kind, "crush", &["--help"], crush_args).with_line_type(Text),
            K::Opencode => {
                Self::new(kind, "opencode", &["--help"], opencode_args).with_line_type(Text)
            }
            K::Antigravity => Self::new(kind, "antigravity", &["--help"], antigravity_args),
            K::Factory => Self::new(kind, "droid", &["--help"], factory_args).with_sessions(),
            K::Rovo => {
                Self::new(kind, "acli", &["rovodev", "--help"], rovo_args).with_sessions()
            }
        }
    }
}

fn path_arg(inv: &Invocation<'_>) -> String {
    inv.project_path.display().to_string()
}

fn push_model(args: &mut Vec<String>, flag: &str, model: Option<&str>) {
    if let Some(model) = model {
        args.push(flag.to_owned());
        args.push(model.to_owned());
    }
}

fn push_resume(args: &mut Vec<String>, resume: Option<&str>) {
    if let Some(id) = resume {
        args.push("--resume".to_owned());
        args.push(id.to_owned());
    }
}

fn codex_args(inv: &Invocation<'_>) -> Vec<String> {
    let mut args = vec![
        "exec".to_owned(),
        "--skip-git-repo-check".to_owned(),
        "--full-auto".to_owned(),
        "-C".to_owned(),
        path_arg(inv),
    ];
    push_model(&mut args, "--model", inv.model);
    args.push(inv.instruction.to_owned());
    args
}

fn claude_args(inv: &Invocation<'_>) -> Vec<String> {
    let mut args = vec![
        "-p".to_owned(),
        inv.instruction.to_owned(),
        "--output-format".to_owned(),
        "text".to_owned(),
        "--permission-mode".to_owned(),
        "bypassPermissions".to_owned(),
    ];
    push_model(&mut args, "--model", inv.model);
    push_resume(&mut args, inv.resume);
    args
}

fn cursor_args(inv: &Invocation<'_>) -> Vec<String> {
    let mut args = vec![
        "-p".to_owned(),
        inv.instruction.to_owned(),
        "--output-format".to_owned(),
        "text".to_owned(),
        "--force".to_owned(),
    ];
    push_model(&mut args, "--model", inv.model);
    push_resume(&mut args, inv.resume);
    args
}

fn gemini_args(inv: &Invocation<'_>) -> Vec<String> {
    let mut args = vec!["-p".to_owned(), inv.instruction.to_owned(), "--yolo".to_owned()];
    push_model(&mut args, "--model", inv.model);
    args
}

fn qwen_args(inv: &Invocation<'_>) -> Vec<String> {
    let mut args = vec!["-p".to_owned(), inv.instruction.to_owned(), "--yolo".to_owned()];
    push_model(&mut args, "--model", inv.model);
    args
}

// Kiro has no project flag; it works in the current directory.
fn kiro_args(inv: &Invocation<'_>) -> Vec<String> {
    let mut args = vec![
        "chat".to_owned(),
        "--no-interactive".to_owned(),
        "--trust-all-tools".to_owned(),
        inv.instruction.to_owned(),
    ];
    push_model(&mut args, "--model", inv.model);
    args
}

fn copilot_args(inv: &Invocation<'_>) -> Vec<String> {
    vec![
        "copilot".to_owned(),
        "suggest".to_owned(),
        inv.instruction.to_owned(),
    ]
}

fn grok_args(inv: &Invocation<'_>) -> Vec<String> {
    vec![
        "chat".to_owned(),
        inv.instruction.to_owned(),
        "--project".to_owned(),
        path_arg(inv),
    ]
}

fn kilocode_args(inv: &Invocation<'_>) -> Vec<String> {
    vec![inv.instruction.to_owned(), "--path".to_owned(), path_arg(inv)]
}

fn crush_args(inv: &Invocation<'_>) -> Vec<String> {
    vec![inv.instruction.to_owned(), "--project".to_owned(), path_arg(inv)]
}

fn opencode_args(inv: &Invocation<'_>) -> Vec<String> {
    vec![inv.instruction.to_owned(), "--path".to_owned(), path_arg(inv)]
}

fn antigravity_args(inv: &Invocation<'_>) -> Vec<String> {
    vec!["chat".to_owned(), inv.instruction.to_owned()]
}

fn factory_args(inv: &Invocation<'_>) -> Vec<String> {
    vec!["exec".to_owned(), inv.instruction.to_owned()]
}

fn rovo_args(inv: &Invocation<'_>) -> Vec<String> {
    vec![
        "rovodev".to_owned(),
        "run".to_owned(),
        inv.instruction.to_owned(),
    ]
}

// ---------------------------------------------------------------------------
// Model-name mapping
// ---------------------------------------------------------------------------

const CODEX_MODELS: &[(&str, &str)] = &[
    ("gpt-5", "gpt-5"),
    ("gpt-5-codex", "gpt-5-codex"),
    ("gpt-4o", "gpt-4o"),
    ("gpt-4.1", "gpt-4.1"),
    ("o3", "o3"),
    ("o4-mini", "o4-mini"),
];

const CLAUDE_MODELS: &[(&str, &str)] = &[
    ("opus-4.1", "claude-opus-4-1-20250805"),
    ("opus-4", "claude-opus-4-20250514"),
    ("sonnet-4", "claude-sonnet-4-20250514"),
    ("haiku-3.5", "claude-3-5-haiku-20241022"),
];

const CURSOR_MODELS: &[(&str, &str)] = &[
    ("gpt-5", "gpt-5"),
    ("sonnet-4", "sonnet-4"),
    ("sonnet-4-thinking", "sonnet-4-thinking"),
    ("opus-4.1", "opus-4.1"),
];

const GEMINI_MODELS: &[(&str, &str)] = &[
    ("gemini-2.5-pro", "gemini-2.5-pro"),
    ("gemini-2.5-flash", "gemini-2.5-flash"),
    ("pro", "gemini-2.5-pro"),
    ("flash", "gemini-2.5-flash"),
];

const QWEN_MODELS: &[(&str, &str)] = &[("qwen-coder", "qwen-coder")];

const KIRO_MODELS: &[(&str, &str)] = &[
    ("claude-3.5-sonnet", "claude-sonnet-4"),
    ("claude-opus", "claude-opus-4"),
    ("gpt-4", "gpt-4"),
    ("gpt-5", "gpt-5"),
    ("sonnet-4", "claude-sonnet-4"),
];

/// Generic model names each tool understands, for tool descriptions.
pub fn known_models(kind: AgentKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        AgentKind::Codex => CODEX_MODELS,
        AgentKind::Claude => CLAUDE_MODELS,
        AgentKind::Cursor => CURSOR_MODELS,
        AgentKind::Gemini => GEMINI_MODELS,
        AgentKind::Qwen => QWEN_MODELS,
        AgentKind::Kiro => KIRO_MODELS,
        _ => &[],
    }
}

/// Translate a caller-facing model name into the tool's own name.
///
/// Unknown names pass through unchanged; `None` selects the tool's default
/// (Codex and Kiro pin one, the rest let the CLI decide).
pub fn map_model(kind: AgentKind, model: Option<&str>) -> Option<String> {
    let model = model.map(str::trim).filter(|m| !m.is_empty());
    let Some(model) = model else {
        return match kind {
            AgentKind::Codex => Some("gpt-5".to_owned()),
            AgentKind::Kiro => Some("claude-sonnet-4".to_owned()),
            _ => None,
        };
    };
    let mapped = known_models(kind)
        .iter()
        .find(|(generic, _)| *generic == model)
        .map_or(model, |(_, cli)| *cli);
    Some(mapped.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv<'a>(path: &'a Path, model: Option<&'a str>, resume: Option<&'a str>) -> Invocation<'a> {
        Invocation {
            instruction: "fix the bug",
            project_path: path,
            model,
            resume,
        }
    }

    #[test]
    fn test_claude_model_mapping() {
        assert_eq!(
            map_model(AgentKind::Claude, Some("opus-4.1")).as_deref(),
            Some("claude-opus-4-1-20250805")
        );
        assert_eq!(map_model(AgentKind::Claude, None), None);
    }

    #[test]
    fn test_defaults_and_passthrough() {
        assert_eq!(map_model(AgentKind::Codex, None).as_deref(), Some("gpt-5"));
        assert_eq!(map_model(AgentKind::Kiro, Some("  ")).as_deref(), Some("claude-sonnet-4"));
        assert_eq!(
            map_model(AgentKind::Gemini, Some("flash")).as_deref(),
            Some("gemini-2.5-flash")
        );
        assert_eq!(
            map_model(AgentKind::Qwen, Some("custom-model")).as_deref(),
            Some("custom-model")
        );
    }

    #[test]
    fn test_every_kind_has_descriptor() {
        let path = Path::new("/work");
        for kind in AgentKind::ALL {
            let d = CliDescriptor::for_kind(kind);
            assert_eq!(d.kind, kind);
            assert!(!d.program.is_empty());
            assert!(d.probe_args.iter().any(|a| a == "--help"));
            let args = (d.build_args)(&inv(path, None, None));
            assert!(
                args.iter().any(|a| a == "fix the bug"),
                "{kind} argv must carry the instruction"
            );
        }
    }

    #[test]
    fn test_project_flags() {
        let path = Path::new("/work");
        let grok = (CliDescriptor::for_kind(AgentKind::Grok).build_args)(&inv(path, None, None));
        assert_eq!(grok, ["chat", "fix the bug", "--project", "/work"]);
        let codex = (CliDescriptor::for_kind(AgentKind::Codex).build_args)(&inv(
            path,
            Some("gpt-5"),
            None,
        ));
        assert_eq!(
            codex,
            [
                "exec",
                "--skip-git-repo-check",
                "--full-auto",
                "-C",
                "/work",
                "--model",
                "gpt-5",
                "fix the bug"
            ]
        );
    }

    #[test]
    fn test_resume_only_where_supported() {
        let path = Path::new("/work");
        let claude = (CliDescriptor::for_kind(AgentKind::Claude).build_args)(&inv(
            path,
            None,
            Some("abc"),
        ));
        assert!(claude.windows(2).any(|w| w == ["--resume", "abc"]));
        let gemini = (CliDescriptor::for_kind(AgentKind::Gemini).build_args)(&inv(
            path,
            None,
            Some("abc"),
        ));
        assert!(!gemini.iter().any(|a| a == "--resume"));
    }

    #[test]
    fn test_line_types_and_sessions() {
        assert_eq!(
            CliDescriptor::for_kind(AgentKind::Copilot).line_type,
            MessageType::Text
        );
        assert_eq!(
            CliDescriptor::for_kind(AgentKind::Kiro).line_type,
            MessageType::Assistant
        );
        assert!(CliDescriptor::for_kind(AgentKind::Factory).sessions);
        assert!(!CliDescriptor::for_kind(AgentKind::Kiro).sessions);
    }
}
