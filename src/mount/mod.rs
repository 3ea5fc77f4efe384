//! Mount table snapshots and the diff engine that classifies changes between them.

pub mod diff;
pub mod filesystem;
pub mod table;
