//! Per-project registry of instances.
//!
//! One JSON document per project: `{instances: [...], groups: [...],
//! settings: {...}}`. Instance and group order is user-visible list order
//! and survives save/load byte-for-byte; groups and settings are opaque
//! containers the core round-trips without interpretation. Concurrent
//! writers are excluded by the project lock, not by file locking here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::paths;

/// UI grouping record. Only `id` and `name` matter to the core (import
/// merges groups by name); the rest rides along.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_row_color: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_settings() -> Value {
    Value::Object(serde_json::Map::new())
}

/// The per-project registry document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registry {
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default = "default_settings")]
    pub settings: Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            groups: Vec::new(),
            settings: default_settings(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Handle on one project's registry file.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    project_id: String,
}

impl Store {
    pub fn new(root: &Path, project_id: &str) -> Store {
        Store {
            root: root.to_path_buf(),
            project_id: project_id.to_string(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn registry_path(&self) -> PathBuf {
        paths::registry_file(&self.root, &self.project_id)
    }

    /// Point subsequent load/save at another project, creating its
    /// directory on demand.
    pub fn set_active_project(&mut self, project_id: &str) -> Result<()> {
        let dir = paths::project_dir(&self.root, project_id);
        std::fs::create_dir_all(&dir)?;
        self.project_id = project_id.to_string();
        Ok(())
    }

    /// Read the registry; an absent file is an empty registry. Transient
    /// instance status is refreshed against tmux — the file itself is
    /// never rewritten here, the persisted status is advisory.
    pub fn load(&self) -> Result<Registry> {
        let path = self.registry_path();
        if !path.is_file() {
            return Ok(Registry::default());
        }

        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("failed to read {}: {e}", path.display())))?;
        let mut registry: Registry = serde_json::from_str(&contents)
            .map_err(|e| Error::Storage(format!("failed to parse {}: {e}", path.display())))?;

        for instance in &mut registry.instances {
            instance.refresh_status();
        }

        debug!(
            project = %self.project_id,
            instances = registry.instances.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    /// Serialize with stable indentation and write atomically: temp file
    /// in the same directory, then rename.
    pub fn save(&self, registry: &Registry) -> Result<()> {
        let path = self.registry_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(registry)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| Error::Storage(format!("failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| Error::Storage(format!("failed to replace {}: {e}", path.display())))?;
        Ok(())
    }

    /// Append an instance. Name and id must be unique within the project.
    pub fn add(&self, instance: Instance) -> Result<()> {
        let mut registry = self.load()?;
        if registry.instances.iter().any(|i| i.name == instance.name) {
            return Err(Error::Conflict(format!(
                "an instance named '{}' already exists",
                instance.name
            )));
        }
        if registry.instances.iter().any(|i| i.id == instance.id) {
            return Err(Error::Conflict(format!(
                "instance id '{}' already exists",
                instance.id
            )));
        }
        registry.instances.push(instance);
        self.save(&registry)
    }

    /// Remove by id. The session is killed first; a failed kill aborts
    /// the removal, so no live session is ever left without a record.
    pub fn remove(&self, id: &str) -> Result<Instance> {
        let mut registry = self.load()?;
        let pos = registry
            .instances
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| Error::NotFound(format!("instance id '{id}'")))?;

        registry.instances[pos].stop()?;
        let removed = registry.instances.remove(pos);
        self.save(&registry)?;
        Ok(removed)
    }

    /// Replace an instance by id.
    pub fn update(&self, instance: Instance) -> Result<()> {
        let mut registry = self.load()?;
        let slot = registry
            .instances
            .iter_mut()
            .find(|i| i.id == instance.id)
            .ok_or_else(|| Error::NotFound(format!("instance id '{}'", instance.id)))?;
        *slot = instance;
        self.save(&registry)
    }

    /// Rename by id, rejecting collisions with other instances.
    pub fn rename(&self, id: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(Error::InvalidInput("instance name is empty".to_string()));
        }

        let mut registry = self.load()?;
        if registry
            .instances
            .iter()
            .any(|i| i.name == new_name && i.id != id)
        {
            return Err(Error::Conflict(format!(
                "an instance named '{new_name}' already exists"
            )));
        }
        let slot = registry
            .instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::NotFound(format!("instance id '{id}'")))?;
        slot.name = new_name.to_string();
        slot.updated_at = chrono::Utc::now();
        self.save(&registry)
    }

    /// Find an instance by name or id in the current registry.
    pub fn find(&self, name_or_id: &str) -> Result<Instance> {
        let registry = self.load()?;
        registry
            .instances
            .into_iter()
            .find(|i| i.name == name_or_id || i.id == name_or_id)
            .ok_or_else(|| Error::NotFound(format!("instance '{name_or_id}'")))
    }
}

/// Move every instance and group from one project's registry into
/// another's, preserving order.
///
/// Groups merge by name: when the destination already has a group with
/// the same name, moved instances adopt the existing group's id. The
/// source is emptied only after the destination save succeeds.
pub fn import(root: &Path, from_project: &str, to_project: &str) -> Result<()> {
    if from_project == to_project {
        return Err(Error::InvalidInput(
            "cannot import a project into itself".to_string(),
        ));
    }

    let src_store = Store::new(root, from_project);
    let dst_store = Store::new(root, to_project);

    let mut src = src_store.load()?;
    let mut dst = dst_store.load()?;

    for instance in &src.instances {
        if dst.instances.iter().any(|i| i.name == instance.name) {
            return Err(Error::Conflict(format!(
                "destination already has an instance named '{}'",
                instance.name
            )));
        }
    }

    // Remap moved group ids onto same-named destination groups.
    let mut remap: Vec<(String, String)> = Vec::new();
    for group in src.groups.drain(..) {
        match dst.groups.iter().find(|g| g.name == group.name) {
            Some(existing) => remap.push((group.id, existing.id.clone())),
            None => dst.groups.push(group),
        }
    }

    for mut instance in src.instances.drain(..) {
        if let Some(gid) = &instance.group_id {
            if let Some((_, new_id)) = remap.iter().find(|(old, _)| old == gid) {
                instance.group_id = Some(new_id.clone());
            }
        }
        dst.instances.push(instance);
    }

    dst_store.save(&dst)?;

    // Source emptied only now, so a failed destination save loses nothing.
    let emptied = Registry {
        settings: src.settings,
        extra: src.extra,
        ..Registry::default()
    };
    src_store.save(&emptied)
}
