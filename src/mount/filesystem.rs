//! A single mount instance as seen in one mount-table snapshot.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{MtrError, Result};

/// One mount instance at snapshot time.
///
/// Values are immutable once built; a changed mount is represented by a new value in the
/// next snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filesystem {
    id: u64,
    source: String,
    target: PathBuf,
    vfs_options: String,
    fs_options: String,
}

impl Filesystem {
    /// Build an entry without validation. Readers that already validated their input use this.
    #[must_use]
    pub fn new(
        id: u64,
        source: impl Into<String>,
        target: impl Into<PathBuf>,
        vfs_options: impl Into<String>,
        fs_options: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source: source.into(),
            target: target.into(),
            vfs_options: vfs_options.into(),
            fs_options: fs_options.into(),
        }
    }

    /// Build an entry, rejecting an empty source or a relative mount point.
    pub fn try_new(
        id: u64,
        source: impl Into<String>,
        target: impl Into<PathBuf>,
        vfs_options: impl Into<String>,
        fs_options: impl Into<String>,
    ) -> Result<Self> {
        let fs = Self::new(id, source, target, vfs_options, fs_options);
        if fs.source.trim().is_empty() {
            return Err(MtrError::InvalidEntry {
                id,
                details: "source must not be empty".to_string(),
            });
        }
        if !fs.target.is_absolute() {
            return Err(MtrError::InvalidEntry {
                id,
                details: format!("target must be absolute, got {}", fs.target.display()),
            });
        }
        Ok(fs)
    }

    /// Kernel mount ID. Survives a move of the mount.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Device path or pseudo-source backing the mount.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Mount point.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Generic per-mount options, e.g. `rw,relatime`.
    #[must_use]
    pub fn vfs_options(&self) -> &str {
        &self.vfs_options
    }

    /// Filesystem-specific superblock options.
    #[must_use]
    pub fn fs_options(&self) -> &str {
        &self.fs_options
    }

    /// True when either option set differs from `other`.
    #[must_use]
    pub fn options_differ(&self, other: &Self) -> bool {
        self.vfs_options != other.vfs_options || self.fs_options != other.fs_options
    }
}

impl fmt::Display for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} on {} ({}; {})",
            self.id,
            self.source,
            self.target.display(),
            self.vfs_options,
            self.fs_options
        )
    }
}
