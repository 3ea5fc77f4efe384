//! Mount table diff: classify every change between two snapshots.
//!
//! The engine runs two passes in a fixed order:
//!
//! 1. **Forward** over the new table. Each entry without a (source, target) twin in the old
//!    table becomes a `Mount`; a twin with different options becomes a `Remount`.
//! 2. **Backward** over the old table. Each entry without a twin in the new table is either
//!    the origin of a pass-1 `Mount` that carries the same kernel mount ID and source (that
//!    entry is rewritten in place into a `Move`) or a plain `Umount`.
//!
//! Pass 2 reads and patches the entries produced by pass 1, so pass 1 must finish first.
//! Interleaving the passes would report moves as unrelated umount/mount pairs.

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::filesystem::Filesystem;
use super::table::MountTable;
use crate::core::errors::Result;

/// Kind of change recorded by a [`DiffEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountAction {
    Mount,
    Umount,
    Move,
    Remount,
}

impl MountAction {
    /// Stable lowercase label, also used in the activity log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mount => "mount",
            Self::Umount => "umount",
            Self::Move => "move",
            Self::Remount => "remount",
        }
    }
}

impl fmt::Display for MountAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified change.
///
/// The variant decides which sides exist: `Mount` has no old entry, `Umount` has no new
/// entry, `Move` and `Remount` have both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum DiffEntry {
    Mount { new_fs: Filesystem },
    Umount { old_fs: Filesystem },
    Move { old_fs: Filesystem, new_fs: Filesystem },
    Remount { old_fs: Filesystem, new_fs: Filesystem },
}

impl DiffEntry {
    #[must_use]
    pub const fn action(&self) -> MountAction {
        match self {
            Self::Mount { .. } => MountAction::Mount,
            Self::Umount { .. } => MountAction::Umount,
            Self::Move { .. } => MountAction::Move,
            Self::Remount { .. } => MountAction::Remount,
        }
    }

    /// Entry as it was in the old snapshot; `None` for `Mount`.
    #[must_use]
    pub const fn old_fs(&self) -> Option<&Filesystem> {
        match self {
            Self::Mount { .. } => None,
            Self::Umount { old_fs } | Self::Move { old_fs, .. } | Self::Remount { old_fs, .. } => {
                Some(old_fs)
            }
        }
    }

    /// Entry as it is in the new snapshot; `None` for `Umount`.
    #[must_use]
    pub const fn new_fs(&self) -> Option<&Filesystem> {
        match self {
            Self::Umount { .. } => None,
            Self::Mount { new_fs } | Self::Move { new_fs, .. } | Self::Remount { new_fs, .. } => {
                Some(new_fs)
            }
        }
    }

    /// Backing source affected by this change: the old source for `Umount`, else the new one.
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Umount { old_fs } => old_fs.source(),
            Self::Mount { new_fs } | Self::Move { new_fs, .. } | Self::Remount { new_fs, .. } => {
                new_fs.source()
            }
        }
    }

    /// Whether this is a pass-1 `Mount` that could be the far end of a move of `old`.
    fn is_move_candidate(&self, old: &Filesystem) -> bool {
        matches!(self, Self::Mount { new_fs } if new_fs.id() == old.id() && new_fs.source() == old.source())
    }
}

/// Per-action counts of a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub mounts: usize,
    pub umounts: usize,
    pub moves: usize,
    pub remounts: usize,
}

impl DiffSummary {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.mounts + self.umounts + self.moves + self.remounts
    }
}

/// Ordered list of changes between two snapshots, in computation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountTableDiff {
    entries: Vec<DiffEntry>,
}

impl MountTableDiff {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// An empty diff means "no change".
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DiffEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiffEntry> {
        self.entries.iter()
    }

    /// Number of entries with the given action.
    #[must_use]
    pub fn count(&self, action: MountAction) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.action() == action)
            .count()
    }

    #[must_use]
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for entry in &self.entries {
            match entry.action() {
                MountAction::Mount => summary.mounts += 1,
                MountAction::Umount => summary.umounts += 1,
                MountAction::Move => summary.moves += 1,
                MountAction::Remount => summary.remounts += 1,
            }
        }
        summary
    }

    /// Sorted, deduplicated set of backing sources touched by any change.
    #[must_use]
    pub fn list_sources(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(DiffEntry::source)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Compact JSON report of the diff.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn push(&mut self, entry: DiffEntry) {
        self.entries.push(entry);
    }

    /// Rewrite the first `Mount` that `old` moved to into a `Move`. Returns false when there
    /// is no such entry.
    fn reclassify_as_move(&mut self, old: &Filesystem) -> bool {
        let Some(slot) = self
            .entries
            .iter_mut()
            .find(|entry| entry.is_move_candidate(old))
        else {
            return false;
        };
        let DiffEntry::Mount { new_fs } = slot else {
            return false;
        };
        let new_fs = new_fs.clone();
        *slot = DiffEntry::Move {
            old_fs: old.clone(),
            new_fs,
        };
        true
    }
}

impl<'a> IntoIterator for &'a MountTableDiff {
    type Item = &'a DiffEntry;
    type IntoIter = std::slice::Iter<'a, DiffEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for MountTableDiff {
    type Item = DiffEntry;
    type IntoIter = std::vec::IntoIter<DiffEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Compute the changes that turn `old` into `new`.
///
/// `None` is accepted for either side and behaves as an empty table. The result owns copies
/// of the entries it mentions and never borrows from the inputs.
#[must_use]
pub fn generate_diff(old: Option<&MountTable>, new: Option<&MountTable>) -> MountTableDiff {
    let empty = MountTable::default();
    let old = old.unwrap_or(&empty);
    let new = new.unwrap_or(&empty);

    let mut diff = MountTableDiff::new();

    if old.is_empty() && new.is_empty() {
        return diff;
    }
    if old.is_empty() {
        for fs in new {
            diff.push(DiffEntry::Mount { new_fs: fs.clone() });
        }
        return diff;
    }
    if new.is_empty() {
        for fs in old {
            diff.push(DiffEntry::Umount { old_fs: fs.clone() });
        }
        return diff;
    }

    // Pass 1: new or remounted.
    for new_fs in new {
        match old.find_mount(new_fs) {
            None => diff.push(DiffEntry::Mount {
                new_fs: new_fs.clone(),
            }),
            Some(old_fs) if old_fs.options_differ(new_fs) => diff.push(DiffEntry::Remount {
                old_fs: old_fs.clone(),
                new_fs: new_fs.clone(),
            }),
            Some(_) => {}
        }
    }

    // Pass 2: unmounted or moved. Depends on the complete pass-1 output.
    for old_fs in old {
        if new.find_mount(old_fs).is_some() {
            continue;
        }
        if !diff.reclassify_as_move(old_fs) {
            diff.push(DiffEntry::Umount {
                old_fs: old_fs.clone(),
            });
        }
    }

    diff
}

impl MountTable {
    /// Changes from `self` (older snapshot) to `newer`.
    #[must_use]
    pub fn diff(&self, newer: &Self) -> MountTableDiff {
        generate_diff(Some(self), Some(newer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn fs(id: u64, source: &str, target: &str, vfs: &str) -> Filesystem {
        Filesystem::new(id, source, target, vfs, "")
    }

    fn table(entries: &[Filesystem]) -> MountTable {
        MountTable::new(entries.to_vec())
    }

    fn actions(diff: &MountTableDiff) -> Vec<MountAction> {
        diff.iter().map(DiffEntry::action).collect()
    }

    #[test]
    fn both_absent_is_empty() {
        assert!(generate_diff(None, None).is_empty());
        let empty = MountTable::default();
        assert!(generate_diff(Some(&empty), Some(&empty)).is_empty());
        assert!(generate_diff(None, Some(&empty)).is_empty());
    }

    #[test]
    fn absent_old_reports_every_new_entry_as_mount_in_order() {
        let new = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(2, "tmpfs", "/tmp", "rw")]);
        let diff = generate_diff(None, Some(&new));
        assert_eq!(actions(&diff), vec![MountAction::Mount, MountAction::Mount]);
        assert!(diff.iter().all(|entry| entry.old_fs().is_none()));
        let ids: Vec<u64> = diff.iter().filter_map(|e| e.new_fs()).map(Filesystem::id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn absent_new_reports_every_old_entry_as_umount() {
        let old = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(2, "tmpfs", "/tmp", "rw")]);
        let diff = generate_diff(Some(&old), None);
        assert_eq!(actions(&diff), vec![MountAction::Umount, MountAction::Umount]);
        assert!(diff.iter().all(|entry| entry.new_fs().is_none()));
    }

    #[test]
    fn identical_snapshots_produce_no_changes() {
        let old = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(2, "tmpfs", "/tmp", "rw")]);
        let new = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(2, "tmpfs", "/tmp", "rw")]);
        assert!(old.diff(&new).is_empty());
    }

    #[test]
    fn moved_mount_is_reclassified() {
        let old = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(5, "/dev/sdb1", "/mnt/a", "rw")]);
        let new = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(5, "/dev/sdb1", "/mnt/b", "rw")]);
        let diff = old.diff(&new);
        assert_eq!(diff.len(), 1);
        let entry = &diff.entries()[0];
        assert_eq!(entry.action(), MountAction::Move);
        assert_eq!(entry.old_fs().map(Filesystem::target), Some(Path::new("/mnt/a")));
        assert_eq!(entry.new_fs().map(Filesystem::target), Some(Path::new("/mnt/b")));
    }

    #[test]
    fn same_id_but_different_source_is_not_a_move() {
        let old = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(5, "/dev/sdb1", "/mnt/a", "rw")]);
        let new = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(5, "/dev/sdc1", "/mnt/b", "rw")]);
        let diff = old.diff(&new);
        assert_eq!(actions(&diff), vec![MountAction::Mount, MountAction::Umount]);
    }

    #[test]
    fn remount_carries_both_sides() {
        let old = table(&[fs(3, "/dev/sdb1", "/data", "rw,relatime")]);
        let new = table(&[fs(3, "/dev/sdb1", "/data", "ro,relatime")]);
        let diff = old.diff(&new);
        assert_eq!(actions(&diff), vec![MountAction::Remount]);
        let entry = &diff.entries()[0];
        assert_eq!(entry.old_fs().map(Filesystem::vfs_options), Some("rw,relatime"));
        assert_eq!(entry.new_fs().map(Filesystem::vfs_options), Some("ro,relatime"));
    }

    #[test]
    fn fs_option_change_alone_is_a_remount() {
        let old = table(&[Filesystem::new(3, "/dev/sdb1", "/data", "rw", "discard")]);
        let new = table(&[Filesystem::new(3, "/dev/sdb1", "/data", "rw", "nodiscard")]);
        assert_eq!(actions(&old.diff(&new)), vec![MountAction::Remount]);
    }

    #[test]
    fn vanished_id_is_plain_umount() {
        let old = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(7, "/dev/sdd1", "/backup", "rw")]);
        let new = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(8, "/dev/sde1", "/scratch", "rw")]);
        let diff = old.diff(&new);
        assert_eq!(actions(&diff), vec![MountAction::Mount, MountAction::Umount]);
        assert_eq!(diff.count(MountAction::Move), 0);
    }

    #[test]
    fn umounts_follow_pass_one_results() {
        let old = table(&[
            fs(1, "/dev/sda1", "/", "rw"),
            fs(2, "/dev/sdb1", "/old", "rw"),
            fs(3, "/dev/sdc1", "/data", "rw"),
        ]);
        let new = table(&[
            fs(1, "/dev/sda1", "/", "rw"),
            fs(3, "/dev/sdc1", "/data", "ro"),
            fs(4, "/dev/sdd1", "/new", "rw"),
        ]);
        let diff = old.diff(&new);
        assert_eq!(
            actions(&diff),
            vec![MountAction::Remount, MountAction::Mount, MountAction::Umount]
        );
    }

    #[test]
    fn move_keeps_position_of_the_mount_it_replaces() {
        let old = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(5, "/dev/sdb1", "/mnt/a", "rw")]);
        let new = table(&[
            fs(1, "/dev/sda1", "/", "rw"),
            fs(5, "/dev/sdb1", "/mnt/b", "rw"),
            fs(6, "/dev/sdc1", "/mnt/c", "rw"),
        ]);
        let diff = old.diff(&new);
        assert_eq!(actions(&diff), vec![MountAction::Move, MountAction::Mount]);
    }

    #[test]
    fn list_sources_dedupes_and_sorts() {
        let old = table(&[fs(1, "/dev/sda1", "/", "rw"), fs(9, "/dev/sdz1", "/gone", "rw")]);
        let new = table(&[
            fs(1, "/dev/sda1", "/", "rw"),
            fs(10, "/dev/sdb1", "/mnt/x", "rw"),
            fs(11, "/dev/sdb1", "/mnt/y", "rw"),
        ]);
        let diff = old.diff(&new);
        assert_eq!(diff.len(), 3);
        assert_eq!(diff.list_sources(), vec!["/dev/sdb1", "/dev/sdz1"]);
    }

    #[test]
    fn list_sources_uses_old_source_only_for_umount() {
        let diff = generate_diff(Some(&table(&[fs(1, "/dev/old", "/a", "rw")])), None);
        assert_eq!(diff.list_sources(), vec!["/dev/old"]);
    }

    #[test]
    fn summary_counts_each_action() {
        let old = table(&[
            fs(1, "/dev/sda1", "/", "rw"),
            fs(2, "/dev/sdb1", "/a", "rw"),
            fs(3, "/dev/sdc1", "/c", "rw"),
        ]);
        let new = table(&[
            fs(1, "/dev/sda1", "/", "ro"),
            fs(2, "/dev/sdb1", "/b", "rw"),
            fs(4, "/dev/sdd1", "/d", "rw"),
        ]);
        let summary = old.diff(&new).summary();
        assert_eq!(
            summary,
            DiffSummary {
                mounts: 1,
                umounts: 1,
                moves: 1,
                remounts: 1,
            }
        );
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn diff_is_independent_of_input_tables() {
        let old = table(&[fs(5, "/dev/sdb1", "/mnt/a", "rw")]);
        let new = table(&[fs(5, "/dev/sdb1", "/mnt/b", "rw")]);
        let diff = old.diff(&new);
        drop(old);
        drop(new);
        assert_eq!(diff.entries()[0].action(), MountAction::Move);
    }

    #[test]
    fn json_report_tags_actions() {
        let new = table(&[fs(1, "/dev/sda1", "/", "rw")]);
        let json = generate_diff(None, Some(&new)).to_json().expect("serialize");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed[0]["action"], "mount");
        assert_eq!(parsed[0]["new_fs"]["source"], "/dev/sda1");
        assert!(parsed[0].get("old_fs").is_none());
    }

    #[test]
    fn action_labels_are_stable() {
        assert_eq!(MountAction::Mount.to_string(), "mount");
        assert_eq!(MountAction::Umount.as_str(), "umount");
        assert_eq!(MountAction::Move.as_str(), "move");
        assert_eq!(MountAction::Remount.as_str(), "remount");
    }
}
