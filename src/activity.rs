//! Activity inference over captured pane content.
//!
//! Classifies a capture into one of three advisory states without parsing
//! any agent protocol: the signal is keyword and spinner heuristics over
//! the ANSI-stripped screen text. The classification is a pure function of
//! its input and is never persisted — tmux liveness stays authoritative.
//!
//! Waiting beats busy by design: most agents keep animating spinners while
//! a confirmation dialog is on screen, and a false "busy" during a real
//! permission prompt is far more harmful than the reverse.
//!
//! Known limitation: `esc to cancel` also appears during long-running
//! non-interactive work in some agents, which can produce a spurious
//! `WaitingForUser`.

use serde::Serialize;
use std::fmt;

use crate::agent::AgentKind;
use crate::ansi;

/// Three-state activity indicator for a managed agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    #[default]
    Idle,
    Busy,
    WaitingForUser,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Activity::Idle => "idle",
            Activity::Busy => "busy",
            Activity::WaitingForUser => "waiting",
        };
        f.write_str(label)
    }
}

/// Case-sensitive markers that the agent is generating.
const BUSY_KEYWORDS: [&str; 3] = ["esc to interrupt", "tokens", "Generating"];

/// Case-insensitive markers of a pending confirmation, shared by all agents.
const WAITING_KEYWORDS: [&str; 9] = [
    "allow once",
    "allow always",
    "yes, allow",
    "no, and tell",
    "esc to cancel",
    "do you want to proceed",
    "waiting for user",
    "waiting for tool",
    "apply this change",
];

/// Extra waiting markers painted only by the Claude TUI.
const CLAUDE_WAITING_KEYWORDS: [&str; 1] = ["? for shortcuts"];

/// Braille spinner glyphs used by every agent family we track.
const SPINNER_GLYPHS: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// How far above the input box the Claude thinking area extends.
const THINKING_LOOKBACK: usize = 15;

/// Candidate window for agents without a structured input box.
const FLAT_WINDOW: usize = 15;

/// Candidate window for Claude when no separators are visible.
const CLAUDE_FALLBACK_WINDOW: usize = 10;

/// Classify a capture. `lines` must already be ANSI-stripped, oldest first.
pub fn infer(kind: AgentKind, lines: &[String]) -> Activity {
    let candidates = candidate_lines(kind, lines);
    classify(kind, &candidates)
}

/// Select the lines worth inspecting.
///
/// The Claude TUI frames its input area between two horizontal rules; the
/// interesting text is inside that frame, or — when the frame only holds
/// the prompt — in the thinking area just above it. Other agents get a
/// flat tail window.
fn candidate_lines<'a>(kind: AgentKind, lines: &'a [String]) -> Vec<&'a str> {
    if kind != AgentKind::Claude {
        return tail_non_empty(lines, FLAT_WINDOW);
    }

    let separators: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| ansi::is_separator(l))
        .map(|(i, _)| i)
        .collect();

    match separators.len() {
        0 => tail_non_empty(lines, CLAUDE_FALLBACK_WINDOW),
        1 => {
            // Permission dialogs render below a single rule.
            let sep = separators[0];
            lines[sep + 1..]
                .iter()
                .map(String::as_str)
                .filter(|l| !l.trim().is_empty())
                .collect()
        }
        _ => {
            let top = separators[separators.len() - 2];
            let bottom = separators[separators.len() - 1];
            let mut candidates: Vec<&str> = lines[top + 1..bottom]
                .iter()
                .map(String::as_str)
                .filter(|l| !l.trim().is_empty())
                .collect();

            // Input area holds only the prompt: scan the thinking area above.
            if candidates.len() <= 1 {
                let start = top.saturating_sub(THINKING_LOOKBACK);
                candidates.extend(
                    lines[start..top]
                        .iter()
                        .map(String::as_str)
                        .filter(|l| !l.trim().is_empty())
                        .filter(|l| !ansi::is_separator(l))
                        .filter(|l| !is_box_chrome(l)),
                );
            }
            candidates
        }
    }
}

fn is_box_chrome(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('╭') || trimmed.starts_with('╰')
}

fn tail_non_empty(lines: &[String], window: usize) -> Vec<&str> {
    let mut tail: Vec<&str> = lines
        .iter()
        .rev()
        .map(String::as_str)
        .filter(|l| !l.trim().is_empty())
        .take(window)
        .collect();
    tail.reverse();
    tail
}

fn classify(kind: AgentKind, candidates: &[&str]) -> Activity {
    let waiting = |line: &str| {
        let lower = line.to_lowercase();
        if WAITING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return true;
        }
        kind == AgentKind::Claude
            && CLAUDE_WAITING_KEYWORDS
                .iter()
                .any(|k| lower.contains(&k.to_lowercase()))
    };

    if candidates.iter().any(|l| waiting(l)) {
        return Activity::WaitingForUser;
    }

    let busy = |line: &str| {
        BUSY_KEYWORDS.iter().any(|k| line.contains(k))
            || line.chars().any(|c| SPINNER_GLYPHS.contains(&c))
    };

    if candidates.iter().any(|l| busy(l)) {
        return Activity::Busy;
    }

    Activity::Idle
}
