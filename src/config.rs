//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--base`, `--wildcards`, etc.)
//! 2. `$FILENAV_CONFIG` environment variable (path to config file)
//! 3. Project-local `.filenav.toml` in the current working directory
//! 4. Global `~/.config/filenav/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::fs::navigator::NavigatorConfig;

// ── Section configs ──────────────────────────────────────────────────────────

/// General application settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory to browse (overridden by CLI positional arg).
    pub default_path: Option<String>,
}

/// Navigator settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NavigatorSection {
    /// Sub folder of the source shown as the root.
    pub base_path: Option<String>,
    /// Comma separated file patterns, e.g. `"*.txt,*.log"`.
    pub wildcards: Option<String>,
    /// Load whole subtrees with one recursive listing.
    pub fetch_all: Option<bool>,
}

/// Filesystem watcher settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WatcherConfig {
    /// Enable filesystem watcher for auto-refresh.
    pub enabled: Option<bool>,
    /// Debounce interval in milliseconds.
    pub debounce_ms: Option<u64>,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `"debug"` or `"filenav=trace"`.
    pub level: Option<String>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub navigator: NavigatorSection,
    pub watcher: WatcherConfig,
    pub log: LogConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path, which is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. $FILENAV_CONFIG environment variable
    if let Ok(env_path) = std::env::var("FILENAV_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    // 2. Project-local `.filenav.toml` in CWD
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".filenav.toml"));
    }

    // 3. Global `~/.config/filenav/config.toml`
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("filenav").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning logged).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return None,
    };
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!("failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`: `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                default_path: other
                    .general
                    .default_path
                    .clone()
                    .or(self.general.default_path),
            },
            navigator: NavigatorSection {
                base_path: other
                    .navigator
                    .base_path
                    .clone()
                    .or(self.navigator.base_path),
                wildcards: other
                    .navigator
                    .wildcards
                    .clone()
                    .or(self.navigator.wildcards),
                fetch_all: other.navigator.fetch_all.or(self.navigator.fetch_all),
            },
            watcher: WatcherConfig {
                enabled: other.watcher.enabled.or(self.watcher.enabled),
                debounce_ms: other.watcher.debounce_ms.or(self.watcher.debounce_ms),
            },
            log: LogConfig {
                level: other.log.level.clone().or(self.log.level),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Walk in reverse so that highest-priority (env var) overwrites lower.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    /// Directory to browse when none is given on the command line.
    pub fn default_path(&self) -> &str {
        self.general.default_path.as_deref().unwrap_or(".")
    }

    /// Navigator settings with defaults filled in.
    pub fn navigator_config(&self) -> NavigatorConfig {
        NavigatorConfig {
            base_path: self.navigator.base_path.clone().unwrap_or_default(),
            wildcards: self
                .navigator
                .wildcards
                .clone()
                .filter(|w| !w.trim().is_empty()),
            fetch_all: self.navigator.fetch_all.unwrap_or(false),
        }
    }

    /// Whether the watcher is enabled.
    pub fn watcher_enabled(&self) -> bool {
        self.watcher.enabled.unwrap_or(true)
    }

    /// Watcher debounce interval in milliseconds.
    pub fn debounce_ms(&self) -> u64 {
        self.watcher.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)
    }

    /// Log filter used when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
