#![forbid(unsafe_code)]
//! Error types for Evergreen.
//!
//! Evergreen keeps fallibility out of the tree core: versioned reads,
//! updates, rotations, and insertion are total functions and cannot fail.
//! Errors arise only in the collaborator layers, and all of them surface
//! through the single [`EvgError`] enum:
//!
//! | Source | Variant |
//! |--------|---------|
//! | Commit log monotonicity gate | `InvalidVersion` |
//! | Artifact scanning/parsing | `MalformedArtifact`, `Io` |
//! | Artifact append collision | `ArtifactExists` |
//! | Timeline lookups | `NotFound` |
//!
//! This crate depends on nothing but `thiserror` so that every other crate
//! in the workspace can use it without cycles. String payloads are owned to
//! keep the error `'static`.

use thiserror::Error;

/// Unified error type for all Evergreen operations.
#[derive(Debug, Error)]
pub enum EvgError {
    /// Operating system I/O error (wraps `std::io::Error`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A commit was submitted with a version that is not strictly greater
    /// than every previously committed version.
    ///
    /// Versions are a monotonic counter; accepting a stale or duplicate
    /// version would silently corrupt earlier timelines, so the commit log
    /// rejects it up front. `head` is 0 when the log is empty.
    #[error("invalid commit version {version}: must be greater than head {head}")]
    InvalidVersion { version: u64, head: u64 },

    /// A commit artifact on disk could not be understood.
    ///
    /// Covers unreadable JSON payloads and payloads whose embedded commit
    /// key disagrees with the version encoded in the file name.
    #[error("malformed commit artifact {name}: {detail}")]
    MalformedArtifact { name: String, detail: String },

    /// Writing a commit artifact would overwrite an existing one.
    #[error("commit artifact already exists: {0}")]
    ArtifactExists(String),

    /// A requested commit or version does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result alias using `EvgError`.
pub type Result<T> = std::result::Result<T, EvgError>;
