#![forbid(unsafe_code)]
//! Commit artifact layer: the on-disk repository a commit log is rebuilt
//! from.
//!
//! A repository is a flat directory of artifacts named `commit_<N>.txt`,
//! where `<N>` is the decimal commit version. The artifact body is the
//! `CommitRecord` as pretty-printed JSON; the embedded `commit_key` must
//! agree with the `<N>` in the file name, and a mismatch is treated as a
//! malformed artifact rather than silently trusting either side.
//!
//! Scanning ignores files that do not follow the naming convention (the
//! directory may contain editor droppings), but a well-named artifact that
//! fails to parse is an error: better to refuse a rebuild than to load a
//! hole into the timeline.

use evg_error::{EvgError, Result};
use evg_log::CommitLog;
use evg_types::{CommitRecord, Version};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Artifact file name prefix.
pub const COMMIT_FILE_PREFIX: &str = "commit_";
/// Artifact file name extension.
pub const COMMIT_FILE_EXTENSION: &str = ".txt";

/// Artifact file name for a version: `commit_<N>.txt`.
#[must_use]
pub fn commit_file_name(version: Version) -> String {
    format!("{COMMIT_FILE_PREFIX}{version}{COMMIT_FILE_EXTENSION}")
}

/// Parse `commit_<N>.txt` back into a version.
///
/// Returns `None` for anything that does not follow the convention, which
/// is how the scanner skips foreign files.
#[must_use]
pub fn parse_commit_file_name(name: &str) -> Option<Version> {
    let digits = name
        .strip_prefix(COMMIT_FILE_PREFIX)?
        .strip_suffix(COMMIT_FILE_EXTENSION)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().map(Version)
}

/// Read every commit artifact under `dir`, sorted ascending by commit key.
pub fn scan_commits(dir: &Path) -> Result<Vec<CommitRecord>> {
    let mut records = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(version) = parse_commit_file_name(name) else {
            continue;
        };
        if !entry.file_type()?.is_file() {
            continue;
        }
        records.push(read_artifact(&entry.path(), name, version)?);
    }
    records.sort_by_key(|record| record.commit_key);
    debug!(
        target: "evg::repo",
        event = "repo_scanned",
        dir = %dir.display(),
        commits = records.len()
    );
    Ok(records)
}

/// Rebuild a commit log from the artifacts under `dir`.
///
/// Artifacts are inserted in ascending key order; gaps in the numbering
/// (deleted artifacts) are fine, but a duplicate or out-of-range version
/// surfaces as `InvalidVersion` from the log itself.
pub fn load_commit_log(dir: &Path) -> Result<CommitLog> {
    let records = scan_commits(dir)?;
    let mut log = CommitLog::new();
    for record in records {
        log.insert(record)?;
    }
    debug!(
        target: "evg::repo",
        event = "log_rebuilt",
        dir = %dir.display(),
        commits = log.len()
    );
    Ok(log)
}

/// Write the artifact for a newly committed record, returning its path.
///
/// Refuses to overwrite: versions are never reused, so an existing artifact
/// for this version means the caller's view of the repository is stale.
pub fn append_commit(dir: &Path, record: &CommitRecord) -> Result<PathBuf> {
    let name = commit_file_name(record.commit_key);
    let path = dir.join(&name);
    if path.exists() {
        return Err(EvgError::ArtifactExists(name));
    }

    let body = serde_json::to_string_pretty(record).map_err(|err| EvgError::MalformedArtifact {
        name: name.clone(),
        detail: err.to_string(),
    })?;
    fs::write(&path, body)?;
    debug!(
        target: "evg::repo",
        event = "artifact_written",
        version = record.commit_key.0,
        path = %path.display()
    );
    Ok(path)
}

fn read_artifact(path: &Path, name: &str, expected: Version) -> Result<CommitRecord> {
    let body = fs::read_to_string(path)?;
    let record: CommitRecord =
        serde_json::from_str(&body).map_err(|err| EvgError::MalformedArtifact {
            name: name.to_owned(),
            detail: err.to_string(),
        })?;
    if record.commit_key != expected {
        return Err(EvgError::MalformedArtifact {
            name: name.to_owned(),
            detail: format!(
                "payload commit_key {} does not match file name version {expected}",
                record.commit_key
            ),
        });
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keyed(version: u64) -> CommitRecord {
        CommitRecord::new(
            Version(version),
            format!("file_{version}.txt"),
            format!("@@ diff {version}"),
            format!("commit {version}"),
        )
    }

    #[test]
    fn file_name_round_trip() {
        assert_eq!(commit_file_name(Version(7)), "commit_7.txt");
        assert_eq!(parse_commit_file_name("commit_7.txt"), Some(Version(7)));
        assert_eq!(
            parse_commit_file_name("commit_12345.txt"),
            Some(Version(12345))
        );
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert_eq!(parse_commit_file_name("commit_.txt"), None);
        assert_eq!(parse_commit_file_name("commit_abc.txt"), None);
        assert_eq!(parse_commit_file_name("commit_1.json"), None);
        assert_eq!(parse_commit_file_name("notes.txt"), None);
        assert_eq!(parse_commit_file_name("commit_1.txt.bak"), None);
        assert_eq!(parse_commit_file_name("commit_-3.txt"), None);
    }

    #[test]
    fn append_then_scan_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let records: Vec<CommitRecord> = [3, 1, 2].into_iter().map(keyed).collect();
        for record in &records {
            append_commit(dir.path(), record).expect("append");
        }

        let scanned = scan_commits(dir.path()).expect("scan");
        let keys: Vec<u64> = scanned.iter().map(|r| r.commit_key.0).collect();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(scanned[2], keyed(3));
    }

    #[test]
    fn scan_skips_files_outside_the_convention() {
        let dir = TempDir::new().expect("tempdir");
        append_commit(dir.path(), &keyed(1)).expect("append");
        fs::write(dir.path().join("README.md"), "not a commit").expect("write");
        fs::write(dir.path().join("commit_x.txt"), "not a commit").expect("write");

        let scanned = scan_commits(dir.path()).expect("scan");
        assert_eq!(scanned.len(), 1);
    }

    #[test]
    fn scan_rejects_malformed_artifact_body() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("commit_4.txt"), "{ not json").expect("write");

        let result = scan_commits(dir.path());
        assert!(matches!(
            result,
            Err(EvgError::MalformedArtifact { name, .. }) if name == "commit_4.txt"
        ));
    }

    #[test]
    fn scan_rejects_key_and_name_disagreement() {
        let dir = TempDir::new().expect("tempdir");
        let body = serde_json::to_string_pretty(&keyed(9)).expect("serialize");
        fs::write(dir.path().join("commit_2.txt"), body).expect("write");

        let result = scan_commits(dir.path());
        assert!(matches!(
            result,
            Err(EvgError::MalformedArtifact { name, .. }) if name == "commit_2.txt"
        ));
    }

    #[test]
    fn append_refuses_to_overwrite() {
        let dir = TempDir::new().expect("tempdir");
        append_commit(dir.path(), &keyed(5)).expect("append");

        let again = append_commit(dir.path(), &keyed(5));
        assert!(matches!(
            again,
            Err(EvgError::ArtifactExists(name)) if name == "commit_5.txt"
        ));
    }

    #[test]
    fn scan_of_missing_directory_is_an_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("nope");
        assert!(matches!(scan_commits(&missing), Err(EvgError::Io(_))));
    }
}
