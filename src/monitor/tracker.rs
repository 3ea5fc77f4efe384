//! Stateful wrapper around the diff engine.
//!
//! The tracker remembers the last snapshot it was handed, diffs every new snapshot against
//! it and records the outcome in the activity log. Acquiring snapshots and deciding when to
//! take them stays with the caller.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::core::config::{Config, TrackerConfig};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::mount::diff::{MountTableDiff, generate_diff};
use crate::mount::table::MountTable;

/// Keeps the previous snapshot and produces a diff for each new one.
pub struct MountTracker {
    config: TrackerConfig,
    snapshot: RwLock<Option<Arc<MountTable>>>,
    generation: AtomicU64,
    log: Option<Mutex<JsonlWriter>>,
}

impl MountTracker {
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            snapshot: RwLock::new(None),
            generation: AtomicU64::new(0),
            log: None,
        }
    }

    /// Attach an activity log and record a `TrackerStart` line.
    #[must_use]
    pub fn with_logger(mut self, writer: JsonlWriter) -> Self {
        self.log = Some(Mutex::new(writer));
        self.emit(|| {
            LogEntry::new(EventType::TrackerStart, Severity::Info).with_details(format!(
                "emit_initial_mounts={} ignored_sources={}",
                self.config.emit_initial_mounts,
                self.config.ignored_sources.join(",")
            ))
        });
        self
    }

    /// Tracker configured from a loaded [`Config`], with logging when enabled.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let tracker = Self::new(config.tracker.clone());
        if !config.logging.enabled {
            return tracker;
        }
        let tracker = tracker.with_logger(JsonlWriter::open(JsonlConfig::from(&config.logging)));
        match config.stable_hash() {
            Ok(hash) => tracker.emit(|| {
                LogEntry::new(EventType::TrackerStart, Severity::Info)
                    .with_details(format!("config_hash={hash}"))
            }),
            Err(error) => tracker.emit(|| LogEntry::from_error(&error)),
        }
        tracker
    }

    /// Diff `table` against the stored snapshot, then make `table` the stored snapshot.
    ///
    /// Sources listed in `ignored_sources` are removed first. Without a stored snapshot the
    /// old side is absent, so every entry is a mount, unless `emit_initial_mounts` is off, in
    /// which case the first call only records the baseline.
    pub fn observe(&self, table: MountTable) -> MountTableDiff {
        let table = Arc::new(table.without_sources(&self.config.ignored_sources));

        let (previous, generation) = {
            let mut slot = self.snapshot.write();
            let previous = slot.replace(Arc::clone(&table));
            (previous, self.generation.fetch_add(1, Ordering::SeqCst) + 1)
        };

        let diff = match previous.as_deref() {
            None if !self.config.emit_initial_mounts => MountTableDiff::new(),
            old => generate_diff(old, Some(table.as_ref())),
        };

        self.record(&diff, generation);
        diff
    }

    /// Last snapshot handed to [`observe`](Self::observe), after source filtering.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<MountTable>> {
        self.snapshot.read().clone()
    }

    /// Number of snapshots observed since creation or the last reset.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Forget the stored snapshot; the next observation starts from an absent table.
    pub fn reset(&self) {
        *self.snapshot.write() = None;
        self.generation.store(0, Ordering::SeqCst);
        self.emit(|| LogEntry::new(EventType::SnapshotReset, Severity::Info));
    }

    fn record(&self, diff: &MountTableDiff, generation: u64) {
        let Some(log) = &self.log else {
            return;
        };
        let mut writer = log.lock();

        let mut summary = LogEntry::new(EventType::SnapshotDiff, Severity::Info)
            .with_generation(generation);
        summary.summary = Some(diff.summary());
        if !diff.is_empty() {
            summary.sources = Some(diff.list_sources());
        }
        writer.write_entry(&summary);

        if self.config.log_each_change {
            for change in diff {
                writer.write_entry(&LogEntry::from_change(change).with_generation(generation));
            }
        }
        writer.flush();
    }

    fn emit(&self, build: impl FnOnce() -> LogEntry) {
        if let Some(log) = &self.log {
            let mut writer = log.lock();
            writer.write_entry(&build());
            writer.flush();
        }
    }
}
