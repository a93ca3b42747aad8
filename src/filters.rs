//! Chrome recognizer tables for preview trimming.
//!
//! Each agent TUI paints different status-bar noise around its real
//! output. The recognizers are opinionated, hand-maintained heuristics —
//! they will drift as upstream agent TUIs change — so they are kept
//! table-driven: compiled-in defaults per agent, overridable by a
//! `filters.json` dropped in the config root.
//!
//! Known limitation: lines whose stripped form starts with `╭` or `╰` are
//! dropped unconditionally, which hides legitimate content that happens to
//! begin with those glyphs.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::agent::AgentKind;
use crate::ansi;

/// Chrome recognizer for one agent kind.
#[derive(Debug, Clone)]
pub struct ChromeFilter {
    pub skip_contains: Vec<String>,
    pub skip_prefixes: Vec<String>,
    pub skip_suffixes: Vec<String>,
    pub skip_exact: Vec<String>,
    /// Separator threshold: a line with more rule chars than this is chrome.
    pub min_separators: usize,
    /// When present, the payload after this prefix is the line's content.
    pub content_prefix: Option<String>,
    /// Lines whose extracted content is shorter than this are chrome.
    pub min_content_len: usize,
    /// Parallel lists: a line containing `show_contains[i]` is rendered
    /// as the synthesized text `show_as[i]`.
    pub show_contains: Vec<String>,
    pub show_as: Vec<String>,
}

impl Default for ChromeFilter {
    fn default() -> Self {
        Self {
            skip_contains: Vec::new(),
            skip_prefixes: vec!["╭".to_string(), "╰".to_string()],
            skip_suffixes: Vec::new(),
            skip_exact: vec![">".to_string()],
            min_separators: ansi::SEPARATOR_THRESHOLD,
            content_prefix: None,
            min_content_len: 0,
            show_contains: Vec::new(),
            show_as: Vec::new(),
        }
    }
}

/// What the filter decided for a single (stripped) line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineVerdict {
    /// Chrome — drop it.
    Skip,
    /// Real content; the payload is what should be shown.
    Keep(String),
}

impl ChromeFilter {
    /// Classify one line. `line` must already be ANSI-stripped.
    pub fn classify(&self, line: &str) -> LineVerdict {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineVerdict::Skip;
        }
        if ansi::is_separator_with(line, self.min_separators) {
            return LineVerdict::Skip;
        }
        if self.skip_exact.iter().any(|e| trimmed == e) {
            return LineVerdict::Skip;
        }
        if self.skip_prefixes.iter().any(|p| trimmed.starts_with(p)) {
            return LineVerdict::Skip;
        }
        if self.skip_suffixes.iter().any(|s| trimmed.ends_with(s)) {
            return LineVerdict::Skip;
        }
        if self.skip_contains.iter().any(|c| trimmed.contains(c)) {
            return LineVerdict::Skip;
        }

        for (i, needle) in self.show_contains.iter().enumerate() {
            if trimmed.contains(needle) {
                if let Some(synth) = self.show_as.get(i) {
                    return LineVerdict::Keep(synth.clone());
                }
            }
        }

        let content = match &self.content_prefix {
            Some(prefix) => match trimmed.find(prefix.as_str()) {
                Some(pos) => trimmed[pos + prefix.len()..].trim(),
                None => trimmed,
            },
            None => trimmed,
        };

        if content.chars().count() < self.min_content_len {
            return LineVerdict::Skip;
        }

        LineVerdict::Keep(content.to_string())
    }

    /// True if the line is chrome (or blank).
    pub fn is_chrome(&self, line: &str) -> bool {
        self.classify(line) == LineVerdict::Skip
    }
}

/// Compiled-in recognizer for one agent kind.
fn default_filter(kind: AgentKind) -> ChromeFilter {
    let mut filter = ChromeFilter::default();
    match kind {
        AgentKind::Claude => {
            filter.skip_contains = [
                "? for shortcuts",
                "Context left:",
                "auto-accept edits",
                "shift+tab to cycle",
                "Bypassing Permissions",
            ]
            .map(str::to_string)
            .to_vec();
        }
        AgentKind::Gemini => {
            filter.skip_contains = [
                "Type your message",
                "ctrl+c to exit",
                "gemini-2",
                "no sandbox",
            ]
            .map(str::to_string)
            .to_vec();
        }
        AgentKind::Codex => {
            filter.skip_contains = ["Ctrl+C to quit", "send   ⏎"]
                .map(str::to_string)
                .to_vec();
        }
        AgentKind::Aider => {
            filter.skip_prefixes.push("architect>".to_string());
            filter.skip_contains = vec!["Tokens:".to_string(), "Cost:".to_string()];
        }
        AgentKind::AmazonQ | AgentKind::OpenCode | AgentKind::Custom => {}
    }
    filter
}

/// Per-agent override record as it appears in `filters.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FilterOverride {
    skip_contains: Option<Vec<String>>,
    skip_prefixes: Option<Vec<String>>,
    skip_suffixes: Option<Vec<String>>,
    skip_exact: Option<Vec<String>>,
    min_separators: Option<usize>,
    content_prefix: Option<String>,
    min_content_len: Option<usize>,
    show_contains: Option<Vec<String>>,
    show_as: Option<Vec<String>>,
}

impl FilterOverride {
    fn apply(self, base: &mut ChromeFilter) {
        if let Some(v) = self.skip_contains {
            base.skip_contains = v;
        }
        if let Some(v) = self.skip_prefixes {
            base.skip_prefixes = v;
        }
        if let Some(v) = self.skip_suffixes {
            base.skip_suffixes = v;
        }
        if let Some(v) = self.skip_exact {
            base.skip_exact = v;
        }
        if let Some(v) = self.min_separators {
            base.min_separators = v;
        }
        if let Some(v) = self.content_prefix {
            base.content_prefix = Some(v);
        }
        if let Some(v) = self.min_content_len {
            base.min_content_len = v;
        }
        if let Some(v) = self.show_contains {
            base.show_contains = v;
        }
        if let Some(v) = self.show_as {
            base.show_as = v;
        }
    }
}

/// The full recognizer table, one entry per agent kind.
#[derive(Debug, Clone)]
pub struct FilterTable {
    filters: HashMap<AgentKind, ChromeFilter>,
}

impl Default for FilterTable {
    fn default() -> Self {
        let filters = AgentKind::ALL
            .iter()
            .map(|&k| (k, default_filter(k)))
            .collect();
        Self { filters }
    }
}

impl FilterTable {
    /// Compiled-in defaults, overlaid with `filters.json` from the config
    /// root when present. A missing file yields the defaults; a malformed
    /// file is reported as an error so typos don't silently disable
    /// overrides.
    pub fn load(config_root: &Path) -> crate::error::Result<Self> {
        let mut table = FilterTable::default();
        let path = config_root.join("filters.json");
        if !path.is_file() {
            return Ok(table);
        }

        let contents = std::fs::read_to_string(&path)?;
        let overrides: HashMap<String, FilterOverride> = serde_json::from_str(&contents)?;
        for (label, over) in overrides {
            let Ok(kind) = AgentKind::parse(&label) else {
                tracing::warn!(agent = %label, "filters.json names an unknown agent; ignoring");
                continue;
            };
            if let Some(filter) = table.filters.get_mut(&kind) {
                over.apply(filter);
            }
        }
        Ok(table)
    }

    pub fn for_agent(&self, kind: AgentKind) -> &ChromeFilter {
        // Every kind is seeded in the table at construction.
        self.filters
            .get(&kind)
            .unwrap_or_else(|| unreachable!("filter table is total over agent kinds"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_prompt_lines_are_chrome() {
        let f = default_filter(AgentKind::Claude);
        assert!(f.is_chrome(""));
        assert!(f.is_chrome("   "));
        assert!(f.is_chrome("> "));
    }

    #[test]
    fn box_corners_are_chrome() {
        let f = default_filter(AgentKind::Claude);
        assert!(f.is_chrome("╭──────────╮"));
        assert!(f.is_chrome("╰──────────╯"));
    }

    #[test]
    fn claude_status_bar_is_chrome() {
        let f = default_filter(AgentKind::Claude);
        assert!(f.is_chrome("? for shortcuts   Context left: 12%"));
    }

    #[test]
    fn separators_are_chrome() {
        let f = default_filter(AgentKind::Custom);
        assert!(f.is_chrome(&"─".repeat(25)));
        assert!(!f.is_chrome(&"─".repeat(5)));
    }

    #[test]
    fn real_output_is_kept_verbatim() {
        let f = default_filter(AgentKind::Claude);
        assert_eq!(
            f.classify("hello world"),
            LineVerdict::Keep("hello world".to_string())
        );
    }

    #[test]
    fn content_prefix_extracts_payload() {
        let f = ChromeFilter {
            content_prefix: Some("⏺".to_string()),
            ..ChromeFilter::default()
        };
        assert_eq!(
            f.classify("⏺ Wrote 3 files"),
            LineVerdict::Keep("Wrote 3 files".to_string())
        );
        // Prefix absent: line kept as-is.
        assert_eq!(
            f.classify("plain line"),
            LineVerdict::Keep("plain line".to_string())
        );
    }

    #[test]
    fn min_content_len_drops_short_payloads() {
        let f = ChromeFilter {
            min_content_len: 4,
            ..ChromeFilter::default()
        };
        assert!(f.is_chrome("ok"));
        assert!(!f.is_chrome("okay then"));
    }

    #[test]
    fn show_as_synthesizes_content() {
        let f = ChromeFilter {
            show_contains: vec!["esc to interrupt".to_string()],
            show_as: vec!["working...".to_string()],
            ..ChromeFilter::default()
        };
        assert_eq!(
            f.classify("✶ Herding… (esc to interrupt)"),
            LineVerdict::Keep("working...".to_string())
        );
    }

    #[test]
    fn table_load_without_file_is_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let table = FilterTable::load(tmp.path()).unwrap();
        assert!(
            table
                .for_agent(AgentKind::Claude)
                .skip_contains
                .iter()
                .any(|s| s == "? for shortcuts")
        );
    }

    #[test]
    fn table_load_applies_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("filters.json"),
            r#"{
                "claude": { "skip_contains": ["custom-noise"], "min_separators": 10 },
                "not-an-agent": { "skip_exact": ["x"] }
            }"#,
        )
        .unwrap();

        let table = FilterTable::load(tmp.path()).unwrap();
        let claude = table.for_agent(AgentKind::Claude);
        assert_eq!(claude.skip_contains, vec!["custom-noise"]);
        assert_eq!(claude.min_separators, 10);
        // Untouched fields keep their defaults.
        assert_eq!(claude.skip_exact, vec![">"]);
        // Other agents untouched.
        assert_eq!(
            table.for_agent(AgentKind::Gemini).min_separators,
            ansi::SEPARATOR_THRESHOLD
        );
    }

    #[test]
    fn table_load_rejects_malformed_json() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("filters.json"), "{not json").unwrap();
        assert!(FilterTable::load(tmp.path()).is_err());
    }
}
