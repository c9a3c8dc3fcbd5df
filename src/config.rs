//! Board configuration.
//!
//! Configuration can be loaded from:
//! 1. TOML file (`dockboard.toml`, `[board]` table)
//! 2. Environment variables (with `DOCKBOARD_` prefix)
//!
//! Environment variables override TOML configuration.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! [board]
//! host = "0.0.0.0"
//! port = 3000
//! schedule_path = "schedule.json"
//! history_path = "data/history.json"
//! report_path = "data/monthly_report.json"
//! utc_offset_minutes = -180
//! duplicate_policy = "dedup"
//! replace_policy = "last-write-wins"
//!
//! [[board.topology.centers]]
//! name = "CD1"
//!
//! [[board.topology.centers.modules]]
//! name = "Module 1"
//! docks = [{ id = "dock-1", label = "Dock 01" }, { id = "dock-2", label = "Dock 02" }]
//! ```

use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::board::ReplacePolicy;
use crate::broadcast::DEFAULT_CAPACITY;
use crate::error::ConfigError;
use crate::import::DuplicatePolicy;
use crate::types::DockTopology;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dockboard.toml";

/// Reference timezone used when none is configured, in minutes east of UTC.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;

/// The default reference timezone (UTC-3).
pub fn default_timezone() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).unwrap_or_else(|| Utc.fix())
}

/// Every setting the board and its server need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Bind address.
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Schedule document read at startup and on re-import.
    pub schedule_path: PathBuf,

    /// Task history file.
    pub history_path: PathBuf,

    /// Monthly report output.
    pub report_path: PathBuf,

    /// Reference timezone as minutes east of UTC.
    pub utc_offset_minutes: i32,

    /// Handling of byte-identical schedule rows.
    pub duplicate_policy: DuplicatePolicy,

    /// Handling of whole-snapshot submissions based on an old version.
    pub replace_policy: ReplacePolicy,

    /// Directory of board UI assets served at `/`, if any.
    pub static_dir: Option<PathBuf>,

    /// Updates a slow connection may lag behind before it is resynced.
    pub broadcast_capacity: usize,

    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Dock layout.
    pub topology: DockTopology,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            schedule_path: PathBuf::from("schedule.json"),
            history_path: PathBuf::from("history.json"),
            report_path: PathBuf::from("monthly_report.json"),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            duplicate_policy: DuplicatePolicy::default(),
            replace_policy: ReplacePolicy::default(),
            static_dir: None,
            broadcast_capacity: DEFAULT_CAPACITY,
            log_level: "info".to_string(),
            topology: DockTopology::default(),
        }
    }
}

impl BoardConfig {
    /// Load configuration from file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. `dockboard.toml` in the working directory
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::read_toml(DEFAULT_CONFIG_FILE)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply
    /// environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::read_toml(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct FullConfig {
            #[serde(default)]
            board: BoardConfig,
        }

        let full: FullConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(full.board)
    }

    fn read_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml(&contents)
    }

    /// Apply environment variable overrides.
    ///
    /// `DOCKBOARD_DATA_DIR` relocates the history and report files into
    /// that directory, keeping their file names. `PORT` is honoured when
    /// `DOCKBOARD_PORT` is unset, for hosts that assign the port.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("DOCKBOARD_HOST") {
            self.host = host;
        }

        if let Some(port) = var("DOCKBOARD_PORT").or_else(|| var("PORT")) {
            if let Ok(v) = port.parse() {
                self.port = v;
            }
        }

        if let Some(path) = var("DOCKBOARD_SCHEDULE_PATH") {
            self.schedule_path = PathBuf::from(path);
        }
        if let Some(path) = var("DOCKBOARD_HISTORY_PATH") {
            self.history_path = PathBuf::from(path);
        }
        if let Some(path) = var("DOCKBOARD_REPORT_PATH") {
            self.report_path = PathBuf::from(path);
        }

        if let Some(dir) = var("DOCKBOARD_DATA_DIR") {
            let dir = PathBuf::from(dir);
            for path in [&mut self.history_path, &mut self.report_path] {
                if let Some(name) = path.file_name() {
                    *path = dir.join(name);
                }
            }
        }

        if let Some(offset) = var("DOCKBOARD_UTC_OFFSET_MINUTES") {
            if let Ok(v) = offset.parse() {
                self.utc_offset_minutes = v;
            }
        }

        if let Some(policy) = var("DOCKBOARD_DUPLICATE_POLICY") {
            if let Ok(v) = serde_json::from_value(serde_json::Value::String(policy)) {
                self.duplicate_policy = v;
            }
        }
        if let Some(policy) = var("DOCKBOARD_REPLACE_POLICY") {
            if let Ok(v) = serde_json::from_value(serde_json::Value::String(policy)) {
                self.replace_policy = v;
            }
        }

        if let Some(dir) = var("DOCKBOARD_STATIC_DIR") {
            self.static_dir = Some(PathBuf::from(dir));
        }

        if let Some(level) = var("DOCKBOARD_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timezone()?;

        if self.topology.docks().next().is_none() {
            return Err(ConfigError::Invalid(
                "dock topology has no docks".to_string(),
            ));
        }
        if let Some(id) = self.topology.duplicate_dock_id() {
            return Err(ConfigError::Invalid(format!(
                "dock id '{id}' appears more than once"
            )));
        }
        if let Some(dock) = self.topology.docks().find(|d| d.id.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "dock labelled '{}' has an empty id",
                dock.label
            )));
        }
        Ok(())
    }

    /// The reference timezone.
    pub fn timezone(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ))
        })
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
