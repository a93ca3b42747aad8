//! A managed agent instance.
//!
//! Owns identity, spawn parameters, persisted metadata, lifecycle
//! transitions, and capture access for one agent process hosted in a
//! detached tmux session. `status` is a hint for first paint only — every
//! operation that depends on liveness re-queries tmux.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::agent::{self, AgentKind};
use crate::ansi;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::filters::{ChromeFilter, LineVerdict};
use crate::tmux;

/// Transient run state, refreshed from tmux on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Running,
    #[default]
    Stopped,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Status::Running => "running",
            Status::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// One managed agent process plus its persisted metadata.
///
/// Presentation attributes (colors, group reference, notes) are opaque to
/// the core and round-trip untouched; so do any fields written by newer
/// versions, via the flattened `extra` map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub id: String,
    pub name: String,
    /// Absolute working directory of the hosted process.
    pub path: String,
    pub agent: AgentKind,
    #[serde(default)]
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub auto_yes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_row_color: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Millis component of the previously generated id. Bumped monotonically
/// so two ids can never collide, even for identical names within one
/// millisecond.
static LAST_ID_MILLIS: AtomicI64 = AtomicI64::new(0);

fn next_unique_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut prev = LAST_ID_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_ID_MILLIS.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// Fold a user-facing name into the id-safe slug form.
pub fn slug(name: &str) -> String {
    let mut out = String::new();
    let mut last_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_matches('-').to_string();
    if trimmed.is_empty() {
        "instance".to_string()
    } else {
        trimmed
    }
}

/// Generate a fresh instance id: sanitized name plus a strictly
/// increasing time component.
pub fn generate_id(name: &str) -> String {
    format!("{}_{}", slug(name), next_unique_millis())
}

/// Expand a leading `~` and absolutize the working directory.
fn normalize_path(raw: &str) -> Result<PathBuf> {
    let expanded = if raw == "~" {
        dirs::home_dir()
            .ok_or_else(|| Error::InvalidInput("cannot expand '~': no home directory".to_string()))?
    } else if let Some(rest) = raw.strip_prefix("~/") {
        dirs::home_dir()
            .ok_or_else(|| Error::InvalidInput("cannot expand '~': no home directory".to_string()))?
            .join(rest)
    } else {
        PathBuf::from(raw)
    };

    std::path::absolute(&expanded)
        .map_err(|e| Error::InvalidInput(format!("bad working directory '{raw}': {e}")))
}

impl Instance {
    /// Create a new instance record. The working directory is
    /// tilde-expanded and absolutized here; existence is checked at spawn.
    pub fn new(
        name: &str,
        path: &str,
        kind: AgentKind,
        custom_command: Option<String>,
        auto_yes: bool,
    ) -> Result<Instance> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("instance name is empty".to_string()));
        }
        if kind == AgentKind::Custom
            && custom_command
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(Error::InvalidInput(
                "custom agent requires a non-empty command".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Instance {
            id: generate_id(name),
            name: name.to_string(),
            path: normalize_path(path)?.to_string_lossy().to_string(),
            agent: kind,
            status: Status::Stopped,
            created_at: now,
            updated_at: now,
            auto_yes,
            resume_session_id: None,
            custom_command,
            color: None,
            bg_color: None,
            full_row_color: None,
            group_id: None,
            notes: None,
            extra: serde_json::Map::new(),
        })
    }

    /// tmux session name derived from the id.
    pub fn session(&self) -> String {
        tmux::session_name(&self.id)
    }

    /// Authoritative liveness check against tmux.
    pub fn is_alive(&self) -> bool {
        tmux::session_exists(&self.session())
    }

    /// Refresh transient `status` from live tmux state.
    pub fn refresh_status(&mut self) {
        self.status = if self.is_alive() {
            Status::Running
        } else {
            Status::Stopped
        };
    }

    /// Launch the agent in a fresh detached session.
    ///
    /// A verified-live instance is success with no action. The resume
    /// token precedence is caller-provided, then persisted.
    pub fn start(&mut self, resume_token: Option<&str>, config: &Config) -> Result<()> {
        if self.is_alive() {
            self.status = Status::Running;
            return Ok(());
        }

        if !Path::new(&self.path).is_dir() {
            return Err(Error::InvalidInput(format!(
                "working directory does not exist: {}",
                self.path
            )));
        }

        let token = resume_token.or(self.resume_session_id.as_deref());
        let command = agent::build_command(
            self.agent,
            self.custom_command.as_deref(),
            self.auto_yes,
            token,
            &config.agents,
        )?;

        let session = self.session();
        tmux::create_session(&session, &self.path, &command)?;
        tmux::configure_session(&session);

        self.status = Status::Running;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Kill the session. Idempotent: stopping a stopped instance is a
    /// silent success.
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_alive() {
            self.status = Status::Stopped;
            return Ok(());
        }

        tmux::kill_session(&self.session())?;
        self.status = Status::Stopped;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Hand the user's terminal to the session. Blocks until detach.
    pub fn attach(&self) -> Result<()> {
        if !self.is_alive() {
            return Err(Error::NotRunning(self.name.clone()));
        }
        tmux::attach(&self.session())
    }

    /// Inject text as keystrokes.
    pub fn send_keys(&self, text: &str, press_enter: bool) -> Result<()> {
        if !self.is_alive() {
            return Err(Error::NotRunning(self.name.clone()));
        }
        tmux::send_keys(&self.session(), text, press_enter)
    }

    /// A cleaned preview of the last `n` lines, ANSI preserved, with
    /// trailing chrome trimmed away.
    pub fn capture_preview(&self, n: usize, filter: &ChromeFilter, config: &Config) -> Result<String> {
        if !self.is_alive() {
            return Err(Error::NotRunning(self.name.clone()));
        }
        let raw = tmux::capture_lines(&self.session(), n + config.preview.margin)?;
        Ok(trim_preview(&raw, n, filter).join("\n"))
    }

    /// The most recent non-chrome line, or the configured placeholder when
    /// the session is not alive.
    pub fn last_line(&self, filter: &ChromeFilter, config: &Config) -> String {
        if !self.is_alive() {
            return config.preview.placeholder.clone();
        }
        let raw = match tmux::capture_lines(&self.session(), 40 + config.preview.margin) {
            Ok(lines) => lines,
            Err(_) => return config.preview.placeholder.clone(),
        };

        for line in raw.iter().rev() {
            let stripped = ansi::strip_ansi(line);
            match filter.classify(&stripped) {
                LineVerdict::Skip => continue,
                LineVerdict::Keep(content) => {
                    // Synthesized/extracted content loses its escapes; a
                    // verbatim keep returns the raw line, ANSI intact.
                    if content == stripped.trim() {
                        return line.trim_end().to_string();
                    }
                    return content;
                }
            }
        }
        config.preview.placeholder.clone()
    }

    /// Classify current activity from a fresh capture.
    pub fn activity(&self, depth: usize) -> Result<crate::activity::Activity> {
        let raw = tmux::capture_lines(&self.session(), depth)?;
        let stripped: Vec<String> = raw.iter().map(|l| ansi::strip_ansi(l)).collect();
        Ok(crate::activity::infer(self.agent, &stripped))
    }
}

/// Trim trailing chrome from a capture and keep the last `n` survivors.
///
/// Trimming walks from the tail and stops at the first line that is not
/// blank, not a separator, and not recognized chrome; lines above that
/// point are kept verbatim (ANSI intact) even if chrome-like.
pub fn trim_preview(lines: &[String], n: usize, filter: &ChromeFilter) -> Vec<String> {
    let mut end = lines.len();
    while end > 0 {
        let stripped = ansi::strip_ansi(&lines[end - 1]);
        if filter.is_chrome(&stripped) {
            end -= 1;
        } else {
            break;
        }
    }
    let kept = &lines[..end];
    kept[kept.len().saturating_sub(n)..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterTable;
    use proptest::prelude::*;

    fn claude_filter() -> ChromeFilter {
        FilterTable::default().for_agent(AgentKind::Claude).clone()
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn slug_folds_punctuation_and_case() {
        assert_eq!(slug("My API Server"), "my-api-server");
        assert_eq!(slug("demo"), "demo");
        assert_eq!(slug("  weird///name  "), "weird-name");
        assert_eq!(slug("???"), "instance");
    }

    #[test]
    fn generated_ids_never_collide() {
        let mut ids: Vec<String> = (0..64).map(|_| generate_id("demo")).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
        assert!(ids.iter().all(|id| id.starts_with("demo_")));
    }

    #[test]
    fn id_time_component_is_strictly_increasing() {
        let a = generate_id("x");
        let b = generate_id("x");
        let millis = |id: &str| -> i64 { id.rsplit('_').next().unwrap().parse().unwrap() };
        assert!(millis(&b) > millis(&a));
    }

    #[test]
    fn new_rejects_empty_name() {
        let err = Instance::new("  ", "/tmp", AgentKind::Claude, None, false).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn new_rejects_custom_without_command() {
        let err = Instance::new("c", "/tmp", AgentKind::Custom, None, false).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn new_expands_tilde() {
        let inst = Instance::new("home", "~/work", AgentKind::Claude, None, false).unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(PathBuf::from(&inst.path), home.join("work"));
    }

    #[test]
    fn session_name_derives_from_id() {
        let inst = Instance::new("demo", "/tmp", AgentKind::Claude, None, true).unwrap();
        assert_eq!(inst.session(), format!("agentmux_{}", inst.id));
    }

    #[test]
    fn fresh_instance_is_stopped() {
        let inst = Instance::new("demo", "/tmp", AgentKind::Claude, None, false).unwrap();
        assert_eq!(inst.status, Status::Stopped);
        assert!(!inst.is_alive());
    }

    #[test]
    fn start_rejects_missing_directory() {
        let mut inst =
            Instance::new("gone", "/definitely/not/a/dir", AgentKind::Claude, None, false).unwrap();
        let err = inst.start(None, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn stop_is_idempotent_when_not_running() {
        let mut inst = Instance::new("demo", "/tmp", AgentKind::Claude, None, false).unwrap();
        inst.stop().unwrap();
        inst.stop().unwrap();
        assert_eq!(inst.status, Status::Stopped);
    }

    #[test]
    fn attach_and_send_require_live_session() {
        let inst = Instance::new("demo", "/tmp", AgentKind::Claude, None, false).unwrap();
        assert!(matches!(inst.attach(), Err(Error::NotRunning(_))));
        assert!(matches!(
            inst.send_keys("hi", true),
            Err(Error::NotRunning(_))
        ));
    }

    #[test]
    fn dead_session_last_line_is_placeholder() {
        let inst = Instance::new("demo", "/tmp", AgentKind::Claude, None, false).unwrap();
        let line = inst.last_line(&claude_filter(), &Config::default());
        assert_eq!(line, "(not running)");
    }

    #[test]
    fn trim_preview_drops_trailing_chrome() {
        let capture = lines(&[
            "hello world",
            "─────────────────────────",
            "> ",
            "",
            "? for shortcuts   Context left: 12%",
        ]);
        let trimmed = trim_preview(&capture, 5, &claude_filter());
        assert_eq!(trimmed, vec!["hello world"]);
    }

    #[test]
    fn trim_preview_stops_at_first_content_line() {
        // Chrome above real content is preserved verbatim.
        let capture = lines(&["╭─ box ─╮", "real output", "", "> "]);
        let trimmed = trim_preview(&capture, 4, &claude_filter());
        assert_eq!(trimmed, vec!["╭─ box ─╮", "real output"]);
    }

    #[test]
    fn trim_preview_keeps_ansi_in_survivors() {
        let capture = lines(&["\x1b[32mgreen line\x1b[0m", "> "]);
        let trimmed = trim_preview(&capture, 2, &claude_filter());
        assert_eq!(trimmed, vec!["\x1b[32mgreen line\x1b[0m"]);
    }

    #[test]
    fn trim_preview_windows_to_n() {
        let capture: Vec<String> = (0..30).map(|i| format!("line {i}")).collect();
        let trimmed = trim_preview(&capture, 5, &claude_filter());
        assert_eq!(trimmed.len(), 5);
        assert_eq!(trimmed[0], "line 25");
        assert_eq!(trimmed[4], "line 29");
    }

    #[test]
    fn serde_preserves_unknown_fields() {
        let json = r##"{
            "id": "demo_1700000000000",
            "name": "demo",
            "path": "/tmp",
            "agent": "claude",
            "status": "running",
            "created_at": "2026-01-02T03:04:05Z",
            "updated_at": "2026-01-02T03:04:05Z",
            "auto_yes": true,
            "color": "#ff8800",
            "future_field": {"nested": [1, 2, 3]}
        }"##;
        let inst: Instance = serde_json::from_str(json).unwrap();
        assert_eq!(inst.agent, AgentKind::Claude);
        assert_eq!(inst.status, Status::Running);
        assert_eq!(inst.color.as_deref(), Some("#ff8800"));
        assert!(inst.extra.contains_key("future_field"));

        let back = serde_json::to_value(&inst).unwrap();
        assert_eq!(back["future_field"]["nested"][1], 2);
        // Absent optionals stay absent.
        assert!(back.get("notes").is_none());
    }

    proptest! {
        #[test]
        fn trim_preview_never_exceeds_n(
            raw in proptest::collection::vec("[ -~]{0,40}", 0..40),
            n in 0usize..20,
        ) {
            let filter = claude_filter();
            let trimmed = trim_preview(&raw, n, &filter);
            prop_assert!(trimmed.len() <= n);
        }

        #[test]
        fn slug_output_is_id_safe(name in "\\PC{0,40}") {
            let s = slug(&name);
            prop_assert!(!s.is_empty());
            prop_assert!(s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!s.starts_with('-') && !s.ends_with('-'));
        }
    }
}

// Tests below talk to a real tmux server.
#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    #[test]
    fn start_creates_live_named_session_and_is_idempotent() {
        let mut inst = Instance::new(
            "it-start",
            "/tmp",
            AgentKind::Custom,
            Some("sleep 30".to_string()),
            false,
        )
        .unwrap();
        let config = Config::default();

        inst.start(None, &config).unwrap();
        assert_eq!(inst.status, Status::Running);
        assert!(inst.is_alive());
        assert_eq!(inst.session(), format!("agentmux_{}", inst.id));
        assert!(tmux::session_exists(&inst.session()));

        // Starting an already-live instance is success with no action.
        let stamped = inst.updated_at;
        inst.start(None, &config).unwrap();
        assert_eq!(inst.updated_at, stamped);
        assert!(inst.is_alive());

        inst.stop().unwrap();
        assert_eq!(inst.status, Status::Stopped);
        assert!(!inst.is_alive());
    }
}
