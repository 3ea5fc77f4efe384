#![forbid(unsafe_code)]

//! mount_tracker — mount table snapshots and a diff engine that classifies every change
//! between two of them as a mount, umount, move or remount.
//!
//! Moves are told apart from an unrelated umount + mount pair by the kernel mount ID, which
//! survives a relocation while the mount point changes.
//!
//! # Library usage
//!
//! ```rust
//! use mount_tracker::prelude::*;
//!
//! let old = MountTable::new(vec![Filesystem::new(5, "/dev/sdb1", "/mnt/a", "rw", "")]);
//! let new = MountTable::new(vec![Filesystem::new(5, "/dev/sdb1", "/mnt/b", "rw", "")]);
//!
//! let diff = generate_diff(Some(&old), Some(&new));
//! assert_eq!(diff.entries()[0].action(), MountAction::Move);
//! assert_eq!(diff.list_sources(), vec!["/dev/sdb1"]);
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod monitor;
pub mod mount;
