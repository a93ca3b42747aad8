//! Tool configuration (`config.toml` in the config root).
//!
//! ```toml
//! [agents]
//! claude = "/opt/homebrew/bin/claude"
//!
//! [preview]
//! margin = 10
//! placeholder = "(not running)"
//! ```
//!
//! Everything is optional; a missing file is the defaults.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

const CONFIG_FILENAME: &str = "config.toml";

fn default_margin() -> usize {
    10
}

fn default_placeholder() -> String {
    "(not running)".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PreviewConfig {
    /// Extra lines captured beyond the requested preview height, so chrome
    /// trimming has material to discard.
    #[serde(default = "default_margin")]
    pub margin: usize,
    /// Shown by last-line queries when the session is not alive.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            margin: default_margin(),
            placeholder: default_placeholder(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Agent label -> replacement program path.
    #[serde(default)]
    pub agents: HashMap<String, String>,
    #[serde(default)]
    pub preview: PreviewConfig,
}

impl Config {
    /// Load `config.toml` from the config root, defaults when absent.
    pub fn load(config_root: &Path) -> Result<Self> {
        let path = config_root.join(CONFIG_FILENAME);
        if !path.is_file() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Storage(format!("failed to parse {}: {e}", path.display())))
    }
}
