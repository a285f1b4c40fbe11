// Local configuration files.
//
// Global config: `~/.quire/config.toml`
// Workspace config: `<workspace>/.quire/workspace.toml`

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root directory for Quire global state: `~/.quire/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".quire"))
}

/// Path to the global config file: `~/.quire/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Path to the workspace config file: `<root>/.quire/workspace.toml`.
pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".quire").join("workspace.toml")
}

// ── Global config ──────────────────────────────────────────────────

/// Global configuration at `~/.quire/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Commit author used when configuring a workspace remote.
    pub author: AuthorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl GlobalConfig {
    /// Load from `~/.quire/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        read_toml(path)
    }

    /// Save to `~/.quire/config.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or(ConfigError::NoHomeDirectory)?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        write_toml(self, path)
    }
}

// ── Workspace config ───────────────────────────────────────────────

/// Per-workspace configuration at `<root>/.quire/workspace.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub git: GitConfig,
    pub sync: SyncConfig,
    pub links: LinksConfig,
    pub watcher: WatcherConfig,
}

impl WorkspaceConfig {
    /// Load from `<root>/.quire/workspace.toml`. Returns defaults if
    /// the file doesn't exist.
    pub fn load(workspace_root: &Path) -> Self {
        Self::load_from(&workspace_config_path(workspace_root)).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        read_toml(path)
    }

    /// Save to `<root>/.quire/workspace.toml`.
    pub fn save(&self, workspace_root: &Path) -> Result<(), ConfigError> {
        let path = workspace_config_path(workspace_root);
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        write_toml(self, path)
    }
}

/// Git remote settings per workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    /// Git remote name (defaults to `"origin"`).
    pub remote: String,
    /// Branch to sync (defaults to `"main"`).
    pub branch: String,
    /// Remote URL, when configured through `configure_remote`.
    pub remote_url: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self { remote: "origin".into(), branch: "main".into(), remote_url: None }
    }
}

/// Sync settings per workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Write unsaved open documents before a sync instead of refusing.
    pub auto_save: bool,
    /// Periodic auto-sync interval in seconds (0 = disabled).
    pub auto_sync_interval_sec: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { auto_save: true, auto_sync_interval_sec: 0 }
    }
}

/// Link maintenance settings per workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinksConfig {
    /// Workspace-relative directory holding image assets.
    pub assets_dir: String,
    /// Files processed concurrently per batch (clamped to 5..=10).
    pub batch_size: usize,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self { assets_dir: ".images".into(), batch_size: crate::batch::DEFAULT_BATCH_SIZE }
    }
}

/// Watcher feedback suppression settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatcherConfig {
    /// Upper bound on how long a programmatic write mutes watcher events.
    pub mute_window_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { mute_window_ms: 500 }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

fn write_toml<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(value)?)?;
    Ok(())
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("could not determine home directory")]
    NoHomeDirectory,
}
