//! Configuration management for lighthouse.
//!
//! Loads configuration from ${LIGHTHOUSE_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::DEFAULT_MAX_MESSAGE_BYTES;

/// Popup colors. Values are `#rrggbb` strings or color names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    pub query_fg: String,
    pub query_bg: String,
    pub result_fg: String,
    pub result_bg: String,
    pub highlight_fg: String,
    pub highlight_bg: String,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            query_fg: "#ffffff".to_string(),
            query_bg: "#2e3440".to_string(),
            result_fg: "#d8dee9".to_string(),
            result_bg: "#3b4252".to_string(),
            highlight_fg: "#2e3440".to_string(),
            highlight_bg: "#88c0d0".to_string(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Child command line, run through `sh -c`.
    pub cmd: String,
    /// Popup width in columns, without the description panel.
    pub width: u16,
    /// Maximum number of result rows on screen.
    pub max_results: u16,
    /// Horizontal position of the popup, percent of the screen.
    pub x: u16,
    /// Vertical position of the popup, percent of the screen.
    pub y: u16,
    /// Columns added for the description panel.
    pub desc_width: u16,
    /// Quit on backspace with an empty query.
    pub backspace_exit: bool,
    pub horiz_padding: u16,
    /// Upper bound on one line of child output.
    pub max_message_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    pub colors: ColorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cmd: Self::DEFAULT_CMD.to_string(),
            width: 80,
            max_results: 10,
            x: 50,
            y: 50,
            desc_width: 40,
            backspace_exit: true,
            horiz_padding: 1,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            log_file: None,
            colors: ColorsConfig::default(),
        }
    }
}

pub mod paths {
    //! Path resolution for lighthouse configuration and logs.
    //!
    //! LIGHTHOUSE_HOME resolution order:
    //! 1. LIGHTHOUSE_HOME environment variable (if set)
    //! 2. ~/.config/lighthouse (default)
    //! 3. ./.lighthouse when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the lighthouse home directory.
    pub fn lighthouse_home() -> PathBuf {
        if let Some(home) = std::env::var_os("LIGHTHOUSE_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".lighthouse"),
            |h| h.join(".config").join("lighthouse"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        lighthouse_home().join("config.toml")
    }

    /// Returns the default log file path.
    pub fn log_path() -> PathBuf {
        lighthouse_home().join("lighthouse.log")
    }
}

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

impl Config {
    pub const DEFAULT_CMD: &'static str = "~/.config/lighthouse/cmd";

    /// Loads configuration from the default path.
    ///
    /// # Errors
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config");
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the commented default template to `path`.
    ///
    /// # Errors
    /// Fails when a config already exists there or the write fails.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Log file to use: the configured one or the default under the home dir.
    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(paths::log_path)
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}
