//! tmux bridge.
//!
//! Thin mechanical wrapper over the tmux CLI: create a detached session
//! hosting a command, inject keys, capture the pane with scrollback,
//! attach the real terminal, kill. All policy (session naming, which
//! options to set after creation) is fixed here and does not vary per
//! agent.

use std::process::{Command, Output};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Every managed session is named `agentmux_<instance id>`. The id is
/// unique per registry, so two instances can never share a session.
pub const SESSION_PREFIX: &str = "agentmux_";

/// Scrollback retention applied to managed sessions.
const HISTORY_LIMIT: &str = "50000";

/// Session name for an instance id.
pub fn session_name(instance_id: &str) -> String {
    format!("{SESSION_PREFIX}{instance_id}")
}

/// Check that tmux is installed and reachable; returns the version string.
pub fn check_tmux() -> Result<String> {
    let output = Command::new("tmux").arg("-V").output().map_err(|_| {
        Error::External(
            "tmux not found — install tmux (e.g., `apt install tmux` or `brew install tmux`)"
                .to_string(),
        )
    })?;

    if !output.status.success() {
        return Err(Error::External(format!(
            "tmux -V failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!(version = %version, "tmux found");
    Ok(version)
}

fn run_tmux<I, S>(args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new("tmux")
        .args(args)
        .output()
        .map_err(|e| Error::External(format!("failed to run tmux: {e}")))
}

/// Check if a tmux session exists.
pub fn session_exists(session: &str) -> bool {
    Command::new("tmux")
        .args(["has-session", "-t", session])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Create a detached tmux session whose only window runs `command` in
/// `work_dir`. Fails if a session by that name already exists.
pub fn create_session(session: &str, work_dir: &str, command: &[String]) -> Result<()> {
    if session_exists(session) {
        return Err(Error::AlreadyRunning(session.to_string()));
    }

    // tmux new-session -d -s <name> -c <work_dir> <program> <args...>
    let mut cmd = Command::new("tmux");
    cmd.args(["new-session", "-d", "-s", session, "-c", work_dir]);
    // Generous initial size so the hosted TUI doesn't render tiny.
    cmd.args(["-x", "220", "-y", "50"]);
    for arg in command {
        cmd.arg(arg);
    }

    let output = cmd
        .output()
        .map_err(|e| Error::External(format!("failed to create tmux session '{session}': {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::External(format!("tmux new-session failed: {stderr}")));
    }

    info!(session = session, "tmux session created");
    Ok(())
}

/// Apply the fixed post-creation options: deep scrollback, mouse, resize
/// behavior, extended key reporting, and a prefix-less quick-detach bind.
///
/// Each option is best-effort — an old tmux missing one must not undo the
/// session that was just created.
pub fn configure_session(session: &str) {
    let options: [(&str, &str); 4] = [
        ("history-limit", HISTORY_LIMIT),
        ("mouse", "on"),
        ("aggressive-resize", "on"),
        ("extended-keys", "on"),
    ];
    for (option, value) in options {
        if let Err(e) = tmux_set(session, option, value) {
            warn!(session = session, option = option, error = %e, "failed to set tmux option");
        }
    }

    // Single keystroke to detach without the prefix.
    match run_tmux(["bind-key", "-n", "C-q", "detach-client"]) {
        Ok(out) if out.status.success() => {}
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            warn!(session = session, error = %stderr, "failed to bind quick-detach key");
        }
        Err(e) => warn!(session = session, error = %e, "failed to bind quick-detach key"),
    }
}

/// Capture the last `last_n` lines of the session's active pane, ANSI
/// escapes preserved, scrollback included via the negative start index.
pub fn capture_lines(session: &str, last_n: usize) -> Result<Vec<String>> {
    let start = format!("-{last_n}");
    let output = run_tmux(["capture-pane", "-p", "-e", "-t", session, "-S", &start])?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::External(format!("tmux capture-pane failed: {stderr}")));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect())
}

/// Send keys to a session.
///
/// Text goes through `-l --` so punctuation is not interpreted as tmux key
/// names; Enter is sent as an explicit second action so injected lines are
/// always submitted.
pub fn send_keys(session: &str, keys: &str, press_enter: bool) -> Result<()> {
    if !keys.is_empty() {
        let output = run_tmux(["send-keys", "-t", session, "-l", "--", keys])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::External(format!("tmux send-keys failed: {stderr}")));
        }
    }

    if press_enter {
        let output = run_tmux(["send-keys", "-t", session, "C-m"])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::External(format!(
                "tmux send-keys Enter failed: {stderr}"
            )));
        }
    }

    debug!(session = session, keys = keys, "sent keys");
    Ok(())
}

/// Attach the controlling terminal to a session. Blocks until the user
/// detaches or the hosted process exits; stdio is inherited so keystrokes
/// bypass the caller entirely.
pub fn attach(session: &str) -> Result<()> {
    if !session_exists(session) {
        return Err(Error::NotRunning(session.to_string()));
    }

    let status = Command::new("tmux")
        .args(["attach-session", "-t", session])
        .status()
        .map_err(|e| Error::External(format!("failed to attach to '{session}': {e}")))?;

    if !status.success() {
        return Err(Error::External(
            "tmux attach exited with non-zero status".to_string(),
        ));
    }

    Ok(())
}

/// Kill a session. Idempotent: a missing session is success.
pub fn kill_session(session: &str) -> Result<()> {
    if !session_exists(session) {
        return Ok(()); // already gone
    }

    let output = run_tmux(["kill-session", "-t", session])?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::External(format!("tmux kill-session failed: {stderr}")));
    }

    info!(session = session, "tmux session killed");
    Ok(())
}

fn tmux_set(session: &str, option: &str, value: &str) -> Result<()> {
    let output = run_tmux(["set-option", "-t", session, option, value])?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::External(format!("tmux set {option} failed: {stderr}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_name_is_prefixed() {
        assert_eq!(
            session_name("demo_1700000000000"),
            "agentmux_demo_1700000000000"
        );
    }

    #[test]
    fn distinct_ids_give_distinct_sessions() {
        assert_ne!(session_name("a_1"), session_name("a_2"));
    }

    #[test]
    fn nonexistent_session_does_not_exist() {
        assert!(!session_exists("agentmux-test-nonexistent-12345"));
    }
}
