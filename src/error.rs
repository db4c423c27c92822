// src/error.rs

//! Error taxonomy for systune
//!
//! Read-only probes (platform detection, current-parameter queries) never
//! produce these errors; they degrade to conservative values instead.
//! Mutating operations raise a typed error for unrecoverable conditions and
//! return `Ok(false)` when an external tool ran but reported failure.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No backend is registered for the detected platform. Callers must
    /// treat this as "this host cannot be safely mutated" and abort the
    /// requested operation.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The image-transaction daemon stayed busy or unreachable past every
    /// retry, including one daemon reset attempt. Prior state is unchanged.
    #[error("image transaction daemon not ready after {0} seconds")]
    TransactionTimeout(u64),

    /// A batch kernel-argument operation fell back to per-token mode and at
    /// least one token failed. The lists enumerate exactly which tokens
    /// landed and which did not.
    #[error("partial apply: {} of {} tokens failed ({})", failed.len(), failed.len() + succeeded.len(), failed.join(", "))]
    PartialApply {
        succeeded: Vec<String>,
        failed: Vec<String>,
    },

    #[error("backup failed: {0}")]
    Backup(String),

    #[error("restore failed: {0}")]
    Restore(String),

    #[error("no backup set found matching '{0}'")]
    RollbackTargetNotFound(String),

    /// Another instance holds the host lock. Concurrent mutation of the
    /// same host is not supported.
    #[error("host is locked by another systune instance ({0})")]
    HostLocked(PathBuf),

    /// An external command could not be spawned or is missing entirely.
    /// Distinct from the command running and reporting failure.
    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
