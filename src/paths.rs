//! Persistent state layout under the config root.
//!
//! ```text
//! <root>/projects.json                      project index + last project
//! <root>/sessions.json                      registry of the default project
//! <root>/default.lock                       lock of the default project
//! <root>/projects/<id>/sessions.json        registry of a named project
//! <root>/projects/<id>/project.lock         lock of a named project
//! <root>/filters.json                       optional chrome overrides
//! <root>/config.toml                        optional tool config
//! <root>/last_update_check                  RFC3339 stamp for the updater
//! ```
//!
//! The default project has the empty id and keeps its files at the root
//! for backward compatibility.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const ENV_OVERRIDE: &str = "AGENTMUX_CONFIG_DIR";

/// Resolve the config root. `AGENTMUX_CONFIG_DIR` wins; otherwise the
/// OS config directory plus `agentmux`.
pub fn config_root() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_OVERRIDE) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::config_dir()
        .map(|d| d.join("agentmux"))
        .ok_or_else(|| Error::Storage("could not determine user config directory".to_string()))
}

pub fn projects_file(root: &Path) -> PathBuf {
    root.join("projects.json")
}

/// Directory holding a project's files. Created on demand by callers.
pub fn project_dir(root: &Path, project_id: &str) -> PathBuf {
    if project_id.is_empty() {
        root.to_path_buf()
    } else {
        root.join("projects").join(project_id)
    }
}

pub fn registry_file(root: &Path, project_id: &str) -> PathBuf {
    project_dir(root, project_id).join("sessions.json")
}

pub fn lock_file(root: &Path, project_id: &str) -> PathBuf {
    if project_id.is_empty() {
        root.join("default.lock")
    } else {
        project_dir(root, project_id).join("project.lock")
    }
}

fn update_stamp_file(root: &Path) -> PathBuf {
    root.join("last_update_check")
}

/// Read the updater stamp; absent or unparseable stamps are `None`.
pub fn read_update_stamp(root: &Path) -> Option<DateTime<Utc>> {
    let contents = std::fs::read_to_string(update_stamp_file(root)).ok()?;
    DateTime::parse_from_rfc3339(contents.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Record that an update check happened now.
pub fn write_update_stamp(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root)?;
    std::fs::write(update_stamp_file(root), Utc::now().to_rfc3339())?;
    Ok(())
}
