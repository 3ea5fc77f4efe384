//! Append-only JSONL activity log for mount events.

pub mod jsonl;
