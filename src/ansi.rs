//! ANSI stripping and separator recognition.
//!
//! Agent TUIs decorate their output heavily: color escapes, box-drawing
//! chrome, horizontal rules between the conversation and the input area.
//! Activity inference and preview trimming both work on the stripped text,
//! so the recognizers live here.

use regex::Regex;
use std::sync::LazyLock;

/// Horizontal rule characters used by the Claude-family input box.
const SEPARATOR_CHARS: [char; 2] = ['─', '━'];

/// A line counts as a separator once it carries more than this many rule
/// characters.
pub const SEPARATOR_THRESHOLD: usize = 20;

/// Strip ANSI escape sequences from captured pane output.
pub fn strip_ansi(input: &str) -> String {
    // Matches CSI sequences (ESC [ ... final byte), OSC sequences (ESC ] ... ST),
    // and simple two-byte escapes (ESC + one char).
    static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[^\[\]]").unwrap()
    });
    ANSI_RE.replace_all(input, "").to_string()
}

/// Count horizontal-rule characters in an already-stripped line.
pub fn separator_chars(line: &str) -> usize {
    line.chars().filter(|c| SEPARATOR_CHARS.contains(c)).count()
}

/// True if the stripped line is a horizontal rule with the given threshold.
pub fn is_separator_with(line: &str, threshold: usize) -> bool {
    separator_chars(line) > threshold
}

/// True if the stripped line is a horizontal rule (default threshold).
pub fn is_separator(line: &str) -> bool {
    is_separator_with(line, SEPARATOR_THRESHOLD)
}
