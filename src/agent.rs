//! Agent kind table.
//!
//! Each supported coding agent maps to a fixed base command plus two
//! optional flags: one that skips interactive confirmations and one that
//! resumes a previous session from an opaque token. The table is the only
//! place agent CLI conventions live; nothing here parses agent output.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// The closed set of agents the core knows how to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    #[default]
    Claude,
    Gemini,
    Aider,
    Codex,
    #[serde(rename = "amazonq")]
    #[value(name = "amazonq")]
    AmazonQ,
    #[serde(rename = "opencode")]
    #[value(name = "opencode")]
    OpenCode,
    Custom,
}

/// Launch conventions for one agent kind.
struct AgentCommand {
    program: &'static str,
    /// Arguments always passed (e.g. `q chat`).
    base_args: &'static [&'static str],
    /// Flag appended when auto-yes is enabled.
    skip_confirm: Option<&'static str>,
    /// Flag (or subcommand) that takes the resume token as its value.
    resume: Option<&'static str>,
}

fn command_for(kind: AgentKind) -> AgentCommand {
    match kind {
        AgentKind::Claude => AgentCommand {
            program: "claude",
            base_args: &[],
            skip_confirm: Some("--dangerously-skip-permissions"),
            resume: Some("--resume"),
        },
        AgentKind::Gemini => AgentCommand {
            program: "gemini",
            base_args: &[],
            skip_confirm: Some("--yolo"),
            resume: Some("--resume"),
        },
        AgentKind::Aider => AgentCommand {
            program: "aider",
            base_args: &[],
            skip_confirm: Some("--yes-always"),
            // Aider restores from its own chat history file; there is no
            // token-taking resume flag to thread through.
            resume: None,
        },
        AgentKind::Codex => AgentCommand {
            program: "codex",
            base_args: &[],
            skip_confirm: Some("--full-auto"),
            resume: Some("resume"),
        },
        AgentKind::AmazonQ => AgentCommand {
            program: "q",
            base_args: &["chat"],
            skip_confirm: Some("--trust-all-tools"),
            resume: Some("--resume"),
        },
        AgentKind::OpenCode => AgentCommand {
            program: "opencode",
            base_args: &[],
            skip_confirm: None,
            resume: Some("--session"),
        },
        AgentKind::Custom => AgentCommand {
            program: "",
            base_args: &[],
            skip_confirm: None,
            resume: None,
        },
    }
}

impl AgentKind {
    pub const ALL: [AgentKind; 7] = [
        AgentKind::Claude,
        AgentKind::Gemini,
        AgentKind::Aider,
        AgentKind::Codex,
        AgentKind::AmazonQ,
        AgentKind::OpenCode,
        AgentKind::Custom,
    ];

    /// Stable lowercase label, matching the registry JSON encoding.
    pub fn label(&self) -> &'static str {
        match self {
            AgentKind::Claude => "claude",
            AgentKind::Gemini => "gemini",
            AgentKind::Aider => "aider",
            AgentKind::Codex => "codex",
            AgentKind::AmazonQ => "amazonq",
            AgentKind::OpenCode => "opencode",
            AgentKind::Custom => "custom",
        }
    }

    pub fn parse(name: &str) -> Result<AgentKind> {
        AgentKind::ALL
            .iter()
            .copied()
            .find(|k| k.label() == name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown agent kind '{name}'")))
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Build the full command line (program first) to launch an agent.
///
/// `custom_command` is required for [`AgentKind::Custom`] and split on
/// whitespace; shell quoting is not interpreted. `program_overrides` maps
/// agent labels to replacement binaries (from `config.toml`).
pub fn build_command(
    kind: AgentKind,
    custom_command: Option<&str>,
    auto_yes: bool,
    resume_token: Option<&str>,
    program_overrides: &HashMap<String, String>,
) -> Result<Vec<String>> {
    if kind == AgentKind::Custom {
        let raw = custom_command
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                Error::InvalidInput("custom agent requires a non-empty command".to_string())
            })?;
        return Ok(raw.split_whitespace().map(str::to_string).collect());
    }

    let spec = command_for(kind);
    let program = program_overrides
        .get(kind.label())
        .cloned()
        .unwrap_or_else(|| spec.program.to_string());

    let mut cmd = vec![program];
    cmd.extend(spec.base_args.iter().map(|a| a.to_string()));

    if let (Some(token), Some(flag)) = (resume_token.filter(|t| !t.is_empty()), spec.resume) {
        cmd.push(flag.to_string());
        cmd.push(token.to_string());
    }

    if auto_yes {
        if let Some(flag) = spec.skip_confirm {
            cmd.push(flag.to_string());
        }
    }

    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_overrides() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn claude_auto_yes_uses_skip_permissions() {
        let cmd = build_command(AgentKind::Claude, None, true, None, &no_overrides()).unwrap();
        assert_eq!(cmd, vec!["claude", "--dangerously-skip-permissions"]);
    }

    #[test]
    fn claude_without_auto_yes_is_bare() {
        let cmd = build_command(AgentKind::Claude, None, false, None, &no_overrides()).unwrap();
        assert_eq!(cmd, vec!["claude"]);
    }

    #[test]
    fn claude_resume_token_threaded() {
        let cmd =
            build_command(AgentKind::Claude, None, false, Some("sess-42"), &no_overrides()).unwrap();
        assert_eq!(cmd, vec!["claude", "--resume", "sess-42"]);
    }

    #[test]
    fn empty_resume_token_ignored() {
        let cmd = build_command(AgentKind::Gemini, None, false, Some(""), &no_overrides()).unwrap();
        assert_eq!(cmd, vec!["gemini"]);
    }

    #[test]
    fn amazonq_has_chat_subcommand() {
        let cmd = build_command(AgentKind::AmazonQ, None, true, None, &no_overrides()).unwrap();
        assert_eq!(cmd, vec!["q", "chat", "--trust-all-tools"]);
    }

    #[test]
    fn codex_resume_is_positional() {
        let cmd =
            build_command(AgentKind::Codex, None, false, Some("abc"), &no_overrides()).unwrap();
        assert_eq!(cmd, vec!["codex", "resume", "abc"]);
    }

    #[test]
    fn aider_ignores_resume_token() {
        let cmd =
            build_command(AgentKind::Aider, None, true, Some("token"), &no_overrides()).unwrap();
        assert_eq!(cmd, vec!["aider", "--yes-always"]);
    }

    #[test]
    fn custom_splits_on_whitespace() {
        let cmd = build_command(
            AgentKind::Custom,
            Some("python3 repl.py --verbose"),
            true,
            Some("ignored"),
            &no_overrides(),
        )
        .unwrap();
        assert_eq!(cmd, vec!["python3", "repl.py", "--verbose"]);
    }

    #[test]
    fn custom_without_command_is_invalid() {
        let err = build_command(AgentKind::Custom, None, false, None, &no_overrides()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err =
            build_command(AgentKind::Custom, Some("  "), false, None, &no_overrides()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn program_override_applies() {
        let mut overrides = HashMap::new();
        overrides.insert("claude".to_string(), "/opt/bin/claude-dev".to_string());
        let cmd = build_command(AgentKind::Claude, None, false, None, &overrides).unwrap();
        assert_eq!(cmd, vec!["/opt/bin/claude-dev"]);
    }

    #[test]
    fn labels_round_trip_through_parse() {
        for kind in AgentKind::ALL {
            assert_eq!(AgentKind::parse(kind.label()).unwrap(), kind);
        }
        assert!(AgentKind::parse("copilot").is_err());
    }

    #[test]
    fn serde_encoding_matches_labels() {
        for kind in AgentKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.label()));
            let back: AgentKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }
}
