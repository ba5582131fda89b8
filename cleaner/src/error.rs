//! Per-target failure taxonomy.
//!
//! These errors abort processing of one target only; batch modes record them
//! in the ledger and move on. Per-object inspection failures inside a scene
//! scan are not errors at all: they are logged as warnings and the scan
//! continues.
//!
//! Causes are `anyhow::Error` and render with their full context chain.

use std::path::PathBuf;

/// Failure while remediating a single file or scene.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// Target path does not exist.
    #[error("target not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Scene mode was given no path and the runtime has no current scene.
    #[error("no file specified and no current scene")]
    NoTarget,

    /// The pre-mutation snapshot could not be written.
    #[error("backup of {} failed: {cause:#}", path.display())]
    Backup {
        path: PathBuf,
        cause: anyhow::Error,
    },

    /// Read, write, or delete failed during remediation.
    #[error("I/O failure on {}: {cause:#}", path.display())]
    Io {
        path: PathBuf,
        cause: anyhow::Error,
    },

    /// The scene runtime failed to prepare or open the scene.
    #[error("scene runtime failure on {}: {cause:#}", path.display())]
    Runtime {
        path: PathBuf,
        cause: anyhow::Error,
    },

    /// Objects were removed in memory but the scene could not be saved, so
    /// the file on disk is still infected.
    #[error(
        "removed {removed} infected objects from {} but saving failed; file on disk is still infected: {cause:#}",
        path.display()
    )]
    SaveFailed {
        path: PathBuf,
        removed: usize,
        cause: anyhow::Error,
    },
}
