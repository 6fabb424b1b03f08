#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic commit version.
///
/// One version is assigned per commit, starting at 1, and versions are never
/// reused or decremented. The version doubles as the commit's ordering key
/// in the timeline tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(pub u64);

impl Version {
    /// The version assigned to the first commit of a repository.
    pub const FIRST: Self = Self(1);

    /// The next version in sequence (saturating).
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable commit payload.
///
/// `commit_key` is the version the commit was created at and the key the
/// timeline tree orders by. The remaining fields are opaque to the tree.
/// Records are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit_key: Version,
    pub file_name: String,
    pub diff_data: String,
    pub commit_message: String,
}

impl CommitRecord {
    #[must_use]
    pub fn new(
        commit_key: Version,
        file_name: impl Into<String>,
        diff_data: impl Into<String>,
        commit_message: impl Into<String>,
    ) -> Self {
        Self {
            commit_key,
            file_name: file_name.into(),
            diff_data: diff_data.into(),
            commit_message: commit_message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering_follows_inner_value() {
        assert!(Version(1) < Version(2));
        assert!(Version(10) <= Version(10));
        assert_eq!(Version(7), Version(7));
    }

    #[test]
    fn version_next_increments() {
        assert_eq!(Version::FIRST.next(), Version(2));
        assert_eq!(Version(41).next(), Version(42));
    }

    #[test]
    fn version_next_saturates_at_max() {
        assert_eq!(Version(u64::MAX).next(), Version(u64::MAX));
    }

    #[test]
    fn version_display_is_bare_number() {
        assert_eq!(Version(19).to_string(), "19");
    }

    #[test]
    fn record_constructor_populates_all_fields() {
        let record = CommitRecord::new(Version(3), "notes.txt", "+hello", "add greeting");
        assert_eq!(record.commit_key, Version(3));
        assert_eq!(record.file_name, "notes.txt");
        assert_eq!(record.diff_data, "+hello");
        assert_eq!(record.commit_message, "add greeting");
    }
}
