//! Dashboard settings loading and management
//!
//! Settings are loaded from `~/.config/ksd/config.toml`. Every key is
//! optional; a missing file means defaults.
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/ksd/` (~/.config/ksd/)
//! - State/Logs: `$XDG_STATE_HOME/ksd/` (~/.local/state/ksd/)
//!
//! The knowledge-system paths themselves (root, hot log, conversation
//! context) come from `.ks-env`, see [`crate::context`].

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Refresh cadence and log reading knobs
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// External tool command lines
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Dashboard refresh and log reading configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    /// Seconds between metric refreshes when no file watch is available
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Bytes read from the end of the hot log to find the latest event
    #[serde(default = "default_tail_window")]
    pub tail_window_bytes: u64,

    /// Seconds to wait before re-arming a failed file watch
    #[serde(default = "default_watch_backoff")]
    pub watch_backoff_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            tail_window_bytes: default_tail_window(),
            watch_backoff_secs: default_watch_backoff(),
        }
    }
}

impl DashboardConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn watch_backoff(&self) -> Duration {
        Duration::from_secs(self.watch_backoff_secs.max(1))
    }
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_tail_window() -> u64 {
    crate::events::DEFAULT_TAIL_WINDOW
}

fn default_watch_backoff() -> u64 {
    2
}

/// External tool command lines.
///
/// Each command is a shell snippet run as `<shell> -c "<preamble>; <command>"`
/// with `KS_ROOT` and friends exported. The tools themselves are opaque; only
/// their exit status and (for captured commands) stdout matter.
#[derive(Debug, Deserialize, Clone)]
pub struct ToolsConfig {
    /// Shell used to run every command
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Snippet run before every command (empty to disable)
    #[serde(default = "default_preamble")]
    pub preamble: String,

    /// Interactive review of pending analyses
    #[serde(default = "default_review")]
    pub review: String,

    /// Interactive trigger check
    #[serde(default = "default_check_triggers")]
    pub check_triggers: String,

    /// Interactive knowledge-graph query
    #[serde(default = "default_knowledge_query")]
    pub knowledge_query: String,

    /// JSON viewer; the hot log path is appended
    #[serde(default = "default_json_viewer")]
    pub json_viewer: String,

    /// Captured search; the quoted term is appended
    #[serde(default = "default_search")]
    pub search: String,

    /// Captured pending-review count (prints an integer; empty to disable)
    #[serde(default = "default_pending_count")]
    pub pending_count: Option<String>,

    /// Captured event count; when unset the hot log lines are counted directly
    #[serde(default)]
    pub event_count: Option<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            preamble: default_preamble(),
            review: default_review(),
            check_triggers: default_check_triggers(),
            knowledge_query: default_knowledge_query(),
            json_viewer: default_json_viewer(),
            search: default_search(),
            pending_count: default_pending_count(),
            event_count: None,
        }
    }
}

fn default_shell() -> String {
    "bash".to_string()
}

fn default_preamble() -> String {
    "source ~/.ks-env 2>/dev/null || source .ks-env".to_string()
}

fn default_review() -> String {
    "$KS_ROOT/tools/introspect/review-findings".to_string()
}

fn default_check_triggers() -> String {
    "$KS_ROOT/tools/plumbing/check-event-triggers --verbose".to_string()
}

fn default_knowledge_query() -> String {
    "$KS_ROOT/tools/kg/query --stats".to_string()
}

fn default_json_viewer() -> String {
    "fx".to_string()
}

fn default_search() -> String {
    "$KS_ROOT/tools/capture/query".to_string()
}

fn default_pending_count() -> Option<String> {
    Some(
        "source $KS_ROOT/lib/core.sh; source $KS_ROOT/tools/lib/queue.sh; \
         ks_queue_list_pending | jq 'length'"
            .to_string(),
    )
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/ksd/config.toml` (~/.config/ksd/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("ksd").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/ksd/` (~/.local/state/ksd/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("ksd")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/ksd/ksd.log` (~/.local/state/ksd/ksd.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("ksd.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.dashboard.refresh_interval_secs, 5);
        assert_eq!(config.dashboard.tail_window_bytes, 1024);
        assert_eq!(config.dashboard.watch_backoff(), Duration::from_secs(2));
        assert_eq!(config.tools.shell, "bash");
        assert!(config.tools.event_count.is_none());
        assert!(config.tools.pending_count.is_some());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[logging]
level = "debug"

[dashboard]
refresh_interval_secs = 30
watch_backoff_secs = 1

[tools]
shell = "sh"
preamble = ""
json_viewer = "jless"
event_count = "wc -l < $KS_HOT_LOG"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.dashboard.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.dashboard.tail_window_bytes, 1024);
        assert_eq!(config.dashboard.watch_backoff(), Duration::from_secs(1));
        assert_eq!(config.tools.shell, "sh");
        assert!(config.tools.preamble.is_empty());
        assert_eq!(config.tools.json_viewer, "jless");
        assert_eq!(
            config.tools.event_count.as_deref(),
            Some("wc -l < $KS_HOT_LOG")
        );
        // Untouched keys keep their defaults
        assert_eq!(
            config.tools.review,
            "$KS_ROOT/tools/introspect/review-findings"
        );
    }

    #[test]
    fn test_intervals_never_zero() {
        let config = DashboardConfig {
            refresh_interval_secs: 0,
            watch_backoff_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
        assert_eq!(config.watch_backoff(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dashboard\nrefresh = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_log_path_name() {
        assert!(Config::log_path().ends_with("ksd/ksd.log"));
    }
}
