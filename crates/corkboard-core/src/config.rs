use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default cap on live action-log entries per board.
pub const DEFAULT_RETAINED_ACTIONS: usize = 1000;

/// Top-level configuration, loaded from an optional `corkboard.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Action-log tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Live entries retained per board; the oldest beyond this are evicted.
    #[serde(default = "default_retained_actions")]
    pub retained_per_board: usize,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            retained_per_board: default_retained_actions(),
        }
    }
}

/// Storage-layer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Load configuration from `<root>/corkboard.toml`, falling back to
/// defaults when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(root: &Path) -> Result<BoardConfig> {
    let path = root.join("corkboard.toml");
    if !path.exists() {
        return Ok(BoardConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<BoardConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

const fn default_retained_actions() -> usize {
    DEFAULT_RETAINED_ACTIONS
}

const fn default_busy_timeout_ms() -> u64 {
    5000
}
