//! Snapshot tracking: keep the last frozen mount table and diff each new one against it.

pub mod tracker;
