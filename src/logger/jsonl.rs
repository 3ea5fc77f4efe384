//! JSONL activity log: one self-contained JSON object per line.
//!
//! Every line is serialized in memory first and handed to a single `write_all`, so a tailing
//! reader never sees half a record. When the primary file cannot be written the writer steps
//! down to the fallback file, then stderr (`[MTR-JSONL]` prefix), then silently drops lines.
//! Logging never fails the caller.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::core::config::LoggingConfig;
use crate::core::errors::{MtrError, Result};
use crate::mount::diff::{DiffEntry, DiffSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TrackerStart,
    SnapshotDiff,
    MountChange,
    SnapshotReset,
    Error,
}

/// One activity line. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with milliseconds.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Mount point before a move.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vfs_options: Option<String>,
    /// Snapshot generation the line belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DiffSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// New entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            action: None,
            mount_id: None,
            source: None,
            target: None,
            previous_target: None,
            vfs_options: None,
            generation: None,
            summary: None,
            sources: None,
            error_code: None,
            details: None,
        }
    }

    /// `MountChange` line describing one diff entry.
    pub fn from_change(change: &DiffEntry) -> Self {
        let mut entry = Self::new(EventType::MountChange, Severity::Info);
        entry.action = Some(change.action().to_string());
        entry.source = Some(change.source().to_string());

        let current = change.new_fs().or_else(|| change.old_fs());
        if let Some(fs) = current {
            entry.mount_id = Some(fs.id());
            entry.target = Some(fs.target().display().to_string());
            entry.vfs_options = Some(fs.vfs_options().to_string());
        }
        if let (Some(old), Some(new)) = (change.old_fs(), change.new_fs())
            && old.target() != new.target()
        {
            entry.previous_target = Some(old.target().display().to_string());
        }
        entry
    }

    /// `Error` line carrying a structured error code.
    pub fn from_error(error: &MtrError) -> Self {
        let mut entry = Self::new(EventType::Error, Severity::Warning);
        entry.error_code = Some(error.code().to_string());
        entry.details = Some(error.to_string());
        entry
    }

    #[must_use]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Writer settings.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the current file would grow past this many bytes.
    pub max_size_bytes: u64,
    /// Rotated files kept as `<path>.1` … `<path>.N`.
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self::from(&LoggingConfig::default())
    }
}

impl From<&LoggingConfig> for JsonlConfig {
    fn from(cfg: &LoggingConfig) -> Self {
        Self {
            path: cfg.jsonl_path.clone(),
            fallback_path: cfg.fallback_path.clone(),
            max_size_bytes: cfg.max_size_bytes,
            max_rotated_files: cfg.max_rotated_files,
            fsync_interval_secs: cfg.fsync_interval_secs,
        }
    }
}

/// Where lines currently go.
enum Sink {
    Primary(BufWriter<File>),
    Fallback(BufWriter<File>),
    Stderr,
    Discard,
}

impl Sink {
    fn label(&self) -> &'static str {
        match self {
            Self::Primary(_) => "normal",
            Self::Fallback(_) => "fallback",
            Self::Stderr => "stderr",
            Self::Discard => "discard",
        }
    }

    fn file(&mut self) -> Option<&mut BufWriter<File>> {
        match self {
            Self::Primary(w) | Self::Fallback(w) => Some(w),
            Self::Stderr | Self::Discard => None,
        }
    }
}

/// Append-only JSONL writer with size rotation and degradation chain.
pub struct JsonlWriter {
    config: JsonlConfig,
    sink: Sink,
    bytes_written: u64,
    last_fsync: Instant,
}

impl JsonlWriter {
    /// Open the primary file, falling back down the chain when that fails.
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            sink: Sink::Discard,
            bytes_written: 0,
            last_fsync: Instant::now(),
        };
        match open_append(&writer.config.path) {
            Ok((file, size)) => writer.use_file(Sink::Primary(buffered(file)), size),
            Err(_) => writer.open_fallback(),
        }
        writer
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[MTR-JSONL] serialize error: {e}");
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.sink.file() {
            let _ = w.flush();
        }
    }

    pub fn fsync(&mut self) {
        if let Some(w) = self.sink.file() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
        }
        self.last_fsync = Instant::now();
    }

    /// "normal", "fallback", "stderr" or "discard".
    pub fn state(&self) -> &'static str {
        self.sink.label()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Reopen the primary path after a degradation.
    pub fn try_recover(&mut self) {
        if matches!(self.sink, Sink::Primary(_)) {
            return;
        }
        if let Ok((file, size)) = open_append(&self.config.path) {
            self.flush();
            self.use_file(Sink::Primary(buffered(file)), size);
            let _ = writeln!(
                io::stderr(),
                "[MTR-JSONL] recovered to primary path: {}",
                self.config.path.display()
            );
        }
    }

    fn use_file(&mut self, sink: Sink, size: u64) {
        self.sink = sink;
        self.bytes_written = size;
    }

    fn current_path(&self) -> Option<PathBuf> {
        match self.sink {
            Sink::Primary(_) => Some(self.config.path.clone()),
            Sink::Fallback(_) => self.config.fallback_path.clone(),
            Sink::Stderr | Sink::Discard => None,
        }
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.bytes_written + len > self.config.max_size_bytes && self.sink.file().is_some() {
            self.rotate();
        }

        match &mut self.sink {
            Sink::Primary(w) | Sink::Fallback(w) => {
                if w.write_all(line.as_bytes()).is_err() {
                    self.degrade();
                    self.write_line(line);
                    return;
                }
                self.bytes_written += len;
                if self.last_fsync.elapsed().as_secs() >= self.config.fsync_interval_secs {
                    self.fsync();
                }
            }
            Sink::Stderr => {
                let _ = write!(io::stderr(), "[MTR-JSONL] {line}");
            }
            Sink::Discard => {}
        }
    }

    fn open_fallback(&mut self) {
        let opened = self
            .config
            .fallback_path
            .as_deref()
            .map(|path| (path, open_append(path)));
        match opened {
            Some((path, Ok((file, size)))) => {
                let _ = writeln!(
                    io::stderr(),
                    "[MTR-JSONL] primary path failed, using fallback: {}",
                    path.display()
                );
                self.use_file(Sink::Fallback(buffered(file)), size);
            }
            Some((_, Err(_))) | None => {
                let _ = writeln!(io::stderr(), "[MTR-JSONL] no writable log file, using stderr");
                self.use_file(Sink::Stderr, 0);
            }
        }
    }

    fn degrade(&mut self) {
        match self.sink {
            Sink::Primary(_) => self.open_fallback(),
            Sink::Fallback(_) => {
                let _ = writeln!(io::stderr(), "[MTR-JSONL] fallback write failed, using stderr");
                self.use_file(Sink::Stderr, 0);
            }
            Sink::Stderr | Sink::Discard => self.use_file(Sink::Discard, 0),
        }
    }

    /// Shift `<base>.N-1 → <base>.N` … `<base> → <base>.1`, then start a fresh file.
    fn rotate(&mut self) {
        let Some(base) = self.current_path() else {
            return;
        };
        self.flush();
        let primary = matches!(self.sink, Sink::Primary(_));

        let keep = self.config.max_rotated_files;
        let _ = fs::remove_file(rotated_name(&base, keep));
        for index in (1..keep).rev() {
            let _ = fs::rename(rotated_name(&base, index), rotated_name(&base, index + 1));
        }
        let _ = fs::rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                let w = buffered(file);
                let sink = if primary { Sink::Primary(w) } else { Sink::Fallback(w) };
                self.use_file(sink, 0);
            }
            Err(_) => self.degrade(),
        }
    }
}

fn buffered(file: File) -> BufWriter<File> {
    BufWriter::with_capacity(64 * 1024, file)
}

/// Open or create `path` for appending; returns the file and its current size.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| MtrError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| MtrError::io(path, source))?;
    let size = file.metadata().map_or(0, |m| m.len());
    Ok((file, size))
}

/// `mounts.jsonl` → `mounts.jsonl.2`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
