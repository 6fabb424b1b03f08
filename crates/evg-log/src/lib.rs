#![forbid(unsafe_code)]
//! Commit log: the owner of the persistent tree's explicit state.
//!
//! The tree core (`evg-tree`) is a set of pure functions over root values.
//! `CommitLog` supplies what the core deliberately does not hold: the
//! monotonic version counter, the current root, and one retained root per
//! committed version so every historical timeline stays queryable.
//!
//! Monotonicity is enforced here, not in the core: a commit whose version
//! is not strictly greater than the head is rejected with
//! `EvgError::InvalidVersion` before it can touch the tree. Gaps between
//! versions are accepted — a repository whose artifact files were partially
//! deleted still rebuilds.

use evg_error::{EvgError, Result};
use evg_tree::{CommitNode, snapshot_at as tree_snapshot_at};
use evg_types::{CommitRecord, Version};
use std::sync::Arc;
use tracing::debug;

/// One committed version and the root that insertion returned for it.
#[derive(Debug, Clone)]
struct TimelineEntry {
    version: Version,
    root: Arc<CommitNode>,
}

/// Append-only log of commits over a partially persistent tree.
///
/// Single writer: mutation requires `&mut self`. Reads take `&self`, and a
/// cloned root handle from [`CommitLog::root_at`] stays valid and correct
/// for its version even after later commits (and across threads — roots are
/// `Arc`-shared and frozen state is never rewritten).
#[derive(Debug, Default)]
pub struct CommitLog {
    entries: Vec<TimelineEntry>,
}

impl CommitLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commits in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest committed version, if any commit exists.
    #[must_use]
    pub fn head_version(&self) -> Option<Version> {
        self.entries.last().map(|entry| entry.version)
    }

    /// Root representing the latest committed state.
    #[must_use]
    pub fn current_root(&self) -> Option<&Arc<CommitNode>> {
        self.entries.last().map(|entry| &entry.root)
    }

    /// Root that was produced by the commit at exactly `version`.
    #[must_use]
    pub fn root_at(&self, version: Version) -> Option<&Arc<CommitNode>> {
        self.entries
            .binary_search_by_key(&version, |entry| entry.version)
            .ok()
            .map(|idx| &self.entries[idx].root)
    }

    /// Insert an already-keyed record. The record's `commit_key` is its
    /// version; it must be strictly greater than the current head (and at
    /// least [`Version::FIRST`]).
    pub fn insert(&mut self, record: CommitRecord) -> Result<Version> {
        let version = record.commit_key;
        let head = self.head_version().unwrap_or(Version(0));
        if version <= head {
            return Err(EvgError::InvalidVersion {
                version: version.0,
                head: head.0,
            });
        }

        let root = evg_tree::insert(self.current_root().cloned(), version, record);
        self.entries.push(TimelineEntry { version, root });
        debug!(
            target: "evg::log",
            event = "commit_recorded",
            version = version.0,
            commits = self.entries.len()
        );
        Ok(version)
    }

    /// Build and insert a record for the next version in sequence.
    pub fn commit(
        &mut self,
        file_name: impl Into<String>,
        diff_data: impl Into<String>,
        commit_message: impl Into<String>,
    ) -> Result<Version> {
        let version = self.head_version().map_or(Version::FIRST, Version::next);
        self.insert(CommitRecord::new(
            version,
            file_name,
            diff_data,
            commit_message,
        ))
    }

    /// Ordered list of commits visible at `version`.
    ///
    /// Resolves the newest retained root whose version is `<= version` and
    /// walks it at `version`; queries earlier than the first commit (or on
    /// an empty log) return an empty list. Pairing each query with its own
    /// version's root is what keeps state introduced by later versions out
    /// of older timelines.
    #[must_use]
    pub fn snapshot_at(&self, version: Version) -> Vec<CommitRecord> {
        let idx = self.entries.partition_point(|entry| entry.version <= version);
        if idx == 0 {
            return Vec::new();
        }
        tree_snapshot_at(Some(&self.entries[idx - 1].root), version)
    }

    /// Ordered list of all commits at the head version.
    #[must_use]
    pub fn timeline(&self) -> Vec<CommitRecord> {
        match self.head_version() {
            Some(head) => self.snapshot_at(head),
            None => Vec::new(),
        }
    }

    /// The record committed at exactly `version`.
    pub fn record_at(&self, version: Version) -> Result<CommitRecord> {
        self.snapshot_at(version)
            .into_iter()
            .rev()
            .find(|record| record.commit_key == version)
            .ok_or_else(|| EvgError::NotFound(format!("no commit with version {version}")))
    }
}
