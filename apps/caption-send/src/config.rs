//! Client configuration on disk.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/captionlink/client.toml`
//! - Windows: `%APPDATA%/captionlink/client.toml`

use std::path::{Path, PathBuf};

use anyhow::Context;

use captionlink_client::ClientConfig;

/// Loads the configuration from the default location, creating it if missing.
pub fn load() -> anyhow::Result<ClientConfig> {
    load_from(&config_path())
}

/// Loads configuration from `path`, or writes and returns the defaults if
/// the file does not exist yet.
pub fn load_from(path: &Path) -> anyhow::Result<ClientConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: ClientConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    } else {
        let config = ClientConfig::default();
        save_to(&config, path)?;
        Ok(config)
    }
}

/// Writes `config` to `path`.
pub fn save_to(config: &ClientConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;

    tracing::debug!(path = %path.display(), "configuration saved");
    Ok(())
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("captionlink").join("client.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("captionlink")
            .join("client.toml")
    }
}
