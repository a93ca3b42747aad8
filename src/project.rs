//! Project index (`projects.json` in the config root).
//!
//! Projects partition the registry: each named project keeps its own
//! `sessions.json` under `projects/<id>/`, and the default project (empty
//! id) lives at the root. This file records which projects exist and
//! which one was active last.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{Error, Result};
use crate::instance::generate_id;
use crate::paths;

/// The always-present unnamed project. Not listed in `projects.json`.
pub const DEFAULT_PROJECT_ID: &str = "";
pub const DEFAULT_PROJECT_NAME: &str = "Default";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectsFile {
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Id of the project that was active when the tool last ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_project: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ProjectsFile {
    /// Read the index; an absent file means no named projects yet.
    pub fn load(root: &Path) -> Result<ProjectsFile> {
        let path = paths::projects_file(root);
        if !path.is_file() {
            return Ok(ProjectsFile::default());
        }
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Storage(format!("failed to parse {}: {e}", path.display())))
    }

    /// Write atomically, same temp-then-rename discipline as the registry.
    pub fn save(&self, root: &Path) -> Result<()> {
        std::fs::create_dir_all(root)?;
        let path = paths::projects_file(root);
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| Error::Storage(format!("failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| Error::Storage(format!("failed to replace {}: {e}", path.display())))?;
        Ok(())
    }

    /// Create a named project. Names are unique (the default project's
    /// name is reserved too).
    pub fn create(&mut self, name: &str) -> Result<&Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("project name is empty".to_string()));
        }
        if name.eq_ignore_ascii_case(DEFAULT_PROJECT_NAME) {
            return Err(Error::Conflict(format!("'{name}' is the default project")));
        }
        if self.projects.iter().any(|p| p.name == name) {
            return Err(Error::Conflict(format!(
                "a project named '{name}' already exists"
            )));
        }

        self.projects.push(Project {
            id: generate_id(name),
            name: name.to_string(),
            created_at: Utc::now(),
            extra: serde_json::Map::new(),
        });
        Ok(self.projects.last().unwrap())
    }

    /// Remove a named project record. The caller deletes the project's
    /// directory; the default project cannot be removed.
    pub fn remove(&mut self, id: &str) -> Result<Project> {
        if id == DEFAULT_PROJECT_ID {
            return Err(Error::InvalidInput(
                "the default project cannot be removed".to_string(),
            ));
        }
        let pos = self
            .projects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("project id '{id}'")))?;
        let removed = self.projects.remove(pos);
        if self.last_project.as_deref() == Some(id) {
            self.last_project = None;
        }
        Ok(removed)
    }

    /// Resolve a project by name or id. The default project matches its
    /// reserved name and the empty id.
    pub fn resolve(&self, name_or_id: &str) -> Result<String> {
        if name_or_id == DEFAULT_PROJECT_ID
            || name_or_id.eq_ignore_ascii_case(DEFAULT_PROJECT_NAME)
        {
            return Ok(DEFAULT_PROJECT_ID.to_string());
        }
        self.projects
            .iter()
            .find(|p| p.name == name_or_id || p.id == name_or_id)
            .map(|p| p.id.clone())
            .ok_or_else(|| Error::NotFound(format!("project '{name_or_id}'")))
    }

    /// Display name for a project id.
    pub fn name_of(&self, id: &str) -> String {
        if id == DEFAULT_PROJECT_ID {
            return DEFAULT_PROJECT_NAME.to_string();
        }
        self.projects
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Last active project, falling back to the default when the recorded
    /// id no longer exists.
    pub fn last_or_default(&self) -> String {
        match &self.last_project {
            Some(id) if self.projects.iter().any(|p| &p.id == id) => id.clone(),
            _ => DEFAULT_PROJECT_ID.to_string(),
        }
    }
}
