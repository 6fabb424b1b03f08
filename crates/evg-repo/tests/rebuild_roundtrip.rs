#![forbid(unsafe_code)]
//! Rebuild round-trip: a repository written one commit at a time must load
//! back into an identical timeline.

use evg_log::CommitLog;
use evg_repo::{append_commit, load_commit_log};
use evg_types::{CommitRecord, Version};
use tempfile::TempDir;

fn keyed(version: u64) -> CommitRecord {
    CommitRecord::new(
        Version(version),
        format!("file_{version}.txt"),
        format!("@@ -{version} +{version} @@"),
        format!("commit {version}"),
    )
}

#[test]
fn write_then_load_reproduces_the_timeline() {
    let dir = TempDir::new().expect("tempdir");

    let mut written = CommitLog::new();
    for version in 1..=12 {
        let record = keyed(version);
        written.insert(record.clone()).expect("insert");
        append_commit(dir.path(), &record).expect("append");
    }

    let loaded = load_commit_log(dir.path()).expect("load");
    assert_eq!(loaded.len(), written.len());
    assert_eq!(loaded.head_version(), written.head_version());
    assert_eq!(loaded.timeline(), written.timeline());
}

#[test]
fn load_survives_gaps_left_by_deleted_artifacts() {
    let dir = TempDir::new().expect("tempdir");
    for version in 1..=8 {
        append_commit(dir.path(), &keyed(version)).expect("append");
    }
    // Simulate a user deleting two artifacts out of the middle.
    for version in [3_u64, 6] {
        std::fs::remove_file(dir.path().join(format!("commit_{version}.txt"))).expect("remove");
    }

    let loaded = load_commit_log(dir.path()).expect("load");
    let keys: Vec<u64> = loaded.timeline().iter().map(|r| r.commit_key.0).collect();
    assert_eq!(keys, vec![1, 2, 4, 5, 7, 8]);

    // Historical queries resolve through the gaps.
    let at_three: Vec<u64> = loaded
        .snapshot_at(Version(3))
        .iter()
        .map(|r| r.commit_key.0)
        .collect();
    assert_eq!(at_three, vec![1, 2]);

    // And the next commit continues past the surviving head.
    let mut loaded = loaded;
    let next = loaded
        .commit("file_9.txt", "@@ +9 @@", "commit 9")
        .expect("commit");
    assert_eq!(next, Version(9));
}

#[test]
fn load_of_empty_directory_is_an_empty_log() {
    let dir = TempDir::new().expect("tempdir");
    let loaded = load_commit_log(dir.path()).expect("load");
    assert!(loaded.is_empty());
    assert!(loaded.timeline().is_empty());
}
