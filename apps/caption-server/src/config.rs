//! Server configuration on disk.
//!
//! Configuration is stored as TOML with `[server]` and `[captioner]` tables:
//! - Linux: `~/.config/captionlink/server.toml`
//! - Windows: `%APPDATA%/captionlink/server.toml`

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use captionlink_server::ServerConfig;

/// Everything the server binary reads from its file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub captioner: CaptionerConfig,
}

/// Which captioner answers images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionerConfig {
    /// Program and arguments run per image. Empty means use `fixed`.
    #[serde(default)]
    pub command: Vec<String>,

    /// Caption returned for every image when no command is set.
    #[serde(default = "default_fixed")]
    pub fixed: String,
}

fn default_fixed() -> String {
    "an image".into()
}

impl Default for CaptionerConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            fixed: default_fixed(),
        }
    }
}

/// Loads the configuration from the default location, creating it if missing.
pub fn load() -> anyhow::Result<Config> {
    load_from(&config_path())
}

/// Loads configuration from `path`, or writes and returns the defaults if
/// the file does not exist yet.
pub fn load_from(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    } else {
        let config = Config::default();
        save_to(&config, path)?;
        Ok(config)
    }
}

/// Writes `config` to `path`.
pub fn save_to(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(config)?)?;
    tracing::debug!(path = %path.display(), "configuration saved");
    Ok(())
}

fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("captionlink").join("server.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("captionlink")
            .join("server.toml")
    }
}
