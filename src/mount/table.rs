//! Mount table snapshot and filter predicates used for lookups.

#![allow(missing_docs)]

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::filesystem::Filesystem;

/// A single match kind. Several filters passed together are combined with logical AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Entry source equals the value.
    Source(String),
    /// Entry mount point equals the value.
    Target(PathBuf),
    /// Entry kernel mount ID equals the value.
    Id(u64),
}

impl Filter {
    #[must_use]
    pub fn source(value: impl Into<String>) -> Self {
        Self::Source(value.into())
    }

    #[must_use]
    pub fn target(value: impl Into<PathBuf>) -> Self {
        Self::Target(value.into())
    }

    #[must_use]
    pub fn id(value: u64) -> Self {
        Self::Id(value)
    }

    /// Evaluate this filter against one entry.
    #[must_use]
    pub fn matches(&self, fs: &Filesystem) -> bool {
        match self {
            Self::Source(source) => fs.source() == source,
            Self::Target(target) => fs.target() == target.as_path(),
            Self::Id(id) => fs.id() == *id,
        }
    }

    /// Conjunction of `filters`. An empty slice matches everything.
    #[must_use]
    pub fn all(filters: &[Self], fs: &Filesystem) -> bool {
        filters.iter().all(|filter| filter.matches(fs))
    }
}

/// Ordered mount state captured at one instant.
///
/// Built once by a reader and then treated as frozen; the diff engine only takes shared
/// borrows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountTable {
    entries: Vec<Filesystem>,
}

impl MountTable {
    #[must_use]
    pub fn new(entries: Vec<Filesystem>) -> Self {
        Self { entries }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in snapshot order.
    #[must_use]
    pub fn entries(&self) -> &[Filesystem] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filesystem> {
        self.entries.iter()
    }

    /// First entry satisfying every filter.
    #[must_use]
    pub fn find(&self, filters: &[Filter]) -> Option<&Filesystem> {
        self.entries.iter().find(|fs| Filter::all(filters, fs))
    }

    /// All entries satisfying every filter, in snapshot order.
    pub fn filter<'a>(&'a self, filters: &'a [Filter]) -> impl Iterator<Item = &'a Filesystem> {
        self.entries.iter().filter(move |fs| Filter::all(filters, fs))
    }

    /// Exact (source, target) lookup.
    #[must_use]
    pub fn find_mount(&self, like: &Filesystem) -> Option<&Filesystem> {
        self.find(&[
            Filter::source(like.source()),
            Filter::target(like.target()),
        ])
    }

    /// Copy of this table without entries whose source is listed in `sources`.
    #[must_use]
    pub fn without_sources(&self, sources: &[String]) -> Self {
        if sources.is_empty() {
            return self.clone();
        }
        self.entries
            .iter()
            .filter(|fs| !sources.iter().any(|source| source == fs.source()))
            .cloned()
            .collect()
    }
}

/// Size of a possibly absent table; absent counts as empty.
#[must_use]
pub fn table_len(table: Option<&MountTable>) -> usize {
    table.map_or(0, MountTable::len)
}

impl FromIterator<Filesystem> for MountTable {
    fn from_iter<I: IntoIterator<Item = Filesystem>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl From<Vec<Filesystem>> for MountTable {
    fn from(entries: Vec<Filesystem>) -> Self {
        Self::new(entries)
    }
}

impl<'a> IntoIterator for &'a MountTable {
    type Item = &'a Filesystem;
    type IntoIter = std::slice::Iter<'a, Filesystem>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
