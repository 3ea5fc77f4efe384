//! Configuration system: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{MtrError, Result};

/// Full mount_tracker configuration model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub logging: LoggingConfig,
}

/// Snapshot tracker behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Report every entry of the first snapshot as a mount. When false the first snapshot
    /// only becomes the baseline.
    pub emit_initial_mounts: bool,
    /// Sources dropped from every snapshot before diffing (e.g. "proc", "sysfs").
    pub ignored_sources: Vec<String>,
    /// Write one activity line per change in addition to the per-diff summary.
    pub log_each_change: bool,
}

/// JSONL activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
    /// Where the config was loaded from; filled in by [`Config::load`].
    #[serde(skip)]
    pub config_file: PathBuf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            emit_initial_mounts: true,
            ignored_sources: Vec::new(),
            log_each_change: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            enabled: true,
            jsonl_path: data.join("mounts.jsonl"),
            fallback_path: Some(PathBuf::from("/dev/shm/mount_tracker.jsonl")),
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 10,
            config_file: Config::default_path(),
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[MTR-CONFIG] WARNING: HOME not set, falling back to /tmp");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("mount_tracker")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        home_dir()
            .join(".config")
            .join("mount_tracker")
            .join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// A missing file at the default path is not an error; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| MtrError::io(&path_buf, source))?;
            Self::from_toml(&raw)?
        } else if path.is_some() {
            return Err(MtrError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.logging.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without touching the environment.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Deterministic hash of the effective config for log correlation (FNV-1a over JSON).
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // tracker
        if let Some(raw) = lookup("MTR_TRACKER_EMIT_INITIAL_MOUNTS") {
            self.tracker.emit_initial_mounts =
                parse_env("MTR_TRACKER_EMIT_INITIAL_MOUNTS", &raw)?;
        }
        if let Some(raw) = lookup("MTR_TRACKER_IGNORED_SOURCES") {
            self.tracker.ignored_sources = raw.split(',').map(str::to_string).collect();
        }
        if let Some(raw) = lookup("MTR_TRACKER_LOG_EACH_CHANGE") {
            self.tracker.log_each_change = parse_env("MTR_TRACKER_LOG_EACH_CHANGE", &raw)?;
        }

        // logging
        if let Some(raw) = lookup("MTR_LOGGING_ENABLED") {
            self.logging.enabled = parse_env("MTR_LOGGING_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("MTR_LOGGING_JSONL_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("MTR_LOGGING_MAX_SIZE_BYTES") {
            self.logging.max_size_bytes = parse_env("MTR_LOGGING_MAX_SIZE_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("MTR_LOGGING_MAX_ROTATED_FILES") {
            self.logging.max_rotated_files = parse_env("MTR_LOGGING_MAX_ROTATED_FILES", &raw)?;
        }
        if let Some(raw) = lookup("MTR_LOGGING_FSYNC_INTERVAL_SECS") {
            self.logging.fsync_interval_secs =
                parse_env("MTR_LOGGING_FSYNC_INTERVAL_SECS", &raw)?;
        }

        Ok(())
    }

    /// Trim ignored sources and drop duplicates, keeping first-seen order.
    fn normalize(&mut self) {
        let mut seen = Vec::<String>::with_capacity(self.tracker.ignored_sources.len());
        for source in self.tracker.ignored_sources.drain(..) {
            let trimmed = source.trim().to_string();
            if !seen.contains(&trimmed) {
                seen.push(trimmed);
            }
        }
        self.tracker.ignored_sources = seen;
    }

    fn validate(&self) -> Result<()> {
        if self
            .tracker
            .ignored_sources
            .iter()
            .any(|source| source.is_empty())
        {
            return Err(MtrError::InvalidConfig {
                details: "tracker.ignored_sources must not contain empty entries".to_string(),
            });
        }

        if self.logging.max_size_bytes == 0 {
            return Err(MtrError::InvalidConfig {
                details: "logging.max_size_bytes must be > 0".to_string(),
            });
        }
        if self.logging.max_rotated_files == 0 {
            return Err(MtrError::InvalidConfig {
                details: "logging.max_rotated_files must be >= 1".to_string(),
            });
        }
        if self.logging.enabled && self.logging.jsonl_path.as_os_str().is_empty() {
            return Err(MtrError::InvalidConfig {
                details: "logging.jsonl_path must be set when logging is enabled".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|error| MtrError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
