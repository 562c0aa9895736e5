//! Configuration loading for `promptline.toml`.
//!
//! Discovery order: an explicit override path, then `promptline.toml` in
//! the working directory, then `<config_dir>/promptline/promptline.toml`.
//! Unknown fields are tolerated so older binaries keep reading newer
//! files; a missing file yields the defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs};
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "promptline.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct EditorConfig {
    /// Vi keybindings instead of emacs.
    #[serde(default)]
    pub vi_mode: bool,
    /// Start with multiline input enabled.
    #[serde(default)]
    pub multiline: bool,
    /// Copy indentation on newline (and extend after a trailing colon).
    #[serde(default = "EditorConfig::default_auto_indent")]
    pub auto_indent: bool,
    /// Background-highlight the cursor's line.
    #[serde(default)]
    pub highlight_current_line: bool,
}

impl EditorConfig {
    fn default_auto_indent() -> bool {
        true
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            vi_mode: false,
            multiline: false,
            auto_indent: Self::default_auto_indent(),
            highlight_current_line: false,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct HistoryConfig {
    /// History file path; in-memory history when absent.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing promptline.toml")
    }

    /// Load from `override_path`, or from the discovered location, or
    /// defaults.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let path = match override_path {
            Some(p) => Some(p.to_path_buf()),
            None => discover(),
        };
        match path {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let config = Self::parse(&content)?;
                info!(target: "config", path = %path.display(), "config_loaded");
                Ok(config)
            }
            Some(path) => {
                info!(target: "config", path = %path.display(), "config_missing_using_defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }
}

fn discover() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        let local = cwd.join(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
    }
    dirs::config_dir().map(|d| d.join("promptline").join(CONFIG_FILE_NAME))
}
