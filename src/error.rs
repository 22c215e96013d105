// src/error.rs

//! Crate-wide error type and result alias
//!
//! Every fatal error names the specific missing or invalid identifier and,
//! where a fixed set of alternatives exists, enumerates them.

use thiserror::Error;

/// Errors produced by stagekit operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing configuration (topology file, package list)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A stage name not present in the loaded topology
    #[error("Unknown stage '{stage}'. Available stages: {available}")]
    UnknownStage { stage: String, available: String },

    /// An artifact name not present in the loaded topology
    #[error("Unknown artifact '{artifact}'. Available artifacts: {available}")]
    UnknownArtifact { artifact: String, available: String },

    /// Filesystem operation failure
    #[error("I/O error: {0}")]
    IoError(String),

    /// A single transfer failure (download, upload, archive handling)
    #[error("Transfer failed: {0}")]
    TransferError(String),

    /// A blob the storage backend does not have
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Aggregate report for a batch where one or more transfers failed
    #[error("{failed} of {total} artifact transfers failed:\n{details}")]
    TransferBatchFailed {
        failed: usize,
        total: usize,
        details: String,
    },

    /// A cycle among package dependency edges
    #[error("Circular dependency detected among packages: {0}")]
    DependencyCycle(String),

    /// Host OS has no recognized package manager
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A subprocess (package manager) exited non-zero or could not be run
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// Aggregate report for install/uninstall runs under the keep-going policy
    #[error("{failed} of {total} package operations failed:\n{details}")]
    PackageBatchFailed {
        failed: usize,
        total: usize,
        details: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
