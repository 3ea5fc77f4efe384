//! Convenience re-exports for library consumers.
//!
//! ```rust
//! use mount_tracker::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{MtrError, Result};

// Mount tables and diffs
pub use crate::mount::diff::{DiffEntry, DiffSummary, MountAction, MountTableDiff, generate_diff};
pub use crate::mount::filesystem::Filesystem;
pub use crate::mount::table::{Filter, MountTable};

// Tracking
pub use crate::monitor::tracker::MountTracker;
