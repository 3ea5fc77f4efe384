//! MTR-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, MtrError>;

/// Top-level error type for mount_tracker.
///
/// The diff engine itself never fails; these cover configuration, entry validation,
/// the activity log and report serialization.
#[derive(Debug, Error)]
pub enum MtrError {
    #[error("[MTR-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[MTR-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[MTR-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[MTR-2001] invalid mount entry {id}: {details}")]
    InvalidEntry { id: u64, details: String },

    #[error("[MTR-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[MTR-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MtrError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "MTR-1001",
            Self::MissingConfig { .. } => "MTR-1002",
            Self::ConfigParse { .. } => "MTR-1003",
            Self::InvalidEntry { .. } => "MTR-2001",
            Self::Serialization { .. } => "MTR-2101",
            Self::Io { .. } => "MTR-3002",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for MtrError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for MtrError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
