#![forbid(unsafe_code)]
//! Partially persistent AVL commit tree.
//!
//! Every node carries its payload, a baseline set of structural fields
//! (`left`, `right`, `height`), and a bounded append-only modification log
//! of at most [`MAX_MODS`] version-tagged field updates. Reads at a version
//! replay the log: the last entry for the field with `entry version <=
//! query version` wins, falling back to the baseline. Writes append while
//! the log has room and otherwise copy the node — a fresh node whose
//! baselines are the effective values at the writing version — leaving the
//! full node frozen for every version that already references it.
//!
//! The result is partial persistence: a root obtained after the N-th
//! insertion answers queries at any version `<= N` forever, while later
//! insertions keep sharing all unchanged structure. Rebalancing is plain
//! AVL, expressed entirely through the versioned accessors and updaters so
//! rotations are themselves recorded as of the inserting version.
//!
//! # Concurrency
//!
//! Single writer, any number of readers. Each node's log sits behind a
//! `parking_lot::RwLock`; appends only ever add entries tagged with a
//! version newer than anything a published root can query, so readers that
//! obtained their root before the append cannot observe it. Nodes are
//! shared across versions with `Arc` — the structure is acyclic (log
//! entries only reference subtrees), so reference counting reclaims
//! everything once the last root holding a node is dropped.

use evg_types::{CommitRecord, Version};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace};

/// Modification-log capacity per node. Once a node has this many entries
/// it is frozen forever and further writes copy it.
pub const MAX_MODS: usize = 2;

/// Shared, possibly absent child link.
pub type Link = Option<Arc<CommitNode>>;

/// One deferred field update, tagged with the version that wrote it.
///
/// Entries are appended in non-decreasing version order, which is what lets
/// the accessors treat "last matching entry in append order" as "newest
/// applicable write".
#[derive(Debug, Clone)]
enum Modification {
    Left { version: Version, child: Link },
    Right { version: Version, child: Link },
    Height { version: Version, height: u32 },
}

/// A vertex of the persistent commit tree.
///
/// The baseline fields hold the state the node was created with; the log
/// holds everything that changed since. Neither is exposed directly —
/// all structural reads go through the versioned accessors.
#[derive(Debug)]
pub struct CommitNode {
    record: CommitRecord,
    base_left: Link,
    base_right: Link,
    base_height: u32,
    mods: RwLock<Vec<Modification>>,
}

impl CommitNode {
    fn leaf(record: CommitRecord) -> Arc<Self> {
        Arc::new(Self {
            record,
            base_left: None,
            base_right: None,
            base_height: 1,
            mods: RwLock::new(Vec::with_capacity(MAX_MODS)),
        })
    }

    /// The immutable commit payload stored in this node.
    #[must_use]
    pub fn record(&self) -> &CommitRecord {
        &self.record
    }

    /// The ordering key (the commit's version).
    #[must_use]
    pub fn commit_key(&self) -> Version {
        self.record.commit_key
    }

    /// Number of modification-log entries currently recorded.
    #[must_use]
    pub fn mod_count(&self) -> usize {
        self.mods.read().len()
    }
}

// ── Versioned accessors ─────────────────────────────────────────────────────

/// Effective left child of `node` as of `version`. Absent nodes have no
/// children.
#[must_use]
pub fn left_at(node: Option<&Arc<CommitNode>>, version: Version) -> Link {
    let node = node?;
    let mut result = node.base_left.clone();
    for entry in node.mods.read().iter() {
        if let Modification::Left { version: at, child } = entry {
            if *at <= version {
                result = child.clone();
            }
        }
    }
    result
}

/// Effective right child of `node` as of `version`.
#[must_use]
pub fn right_at(node: Option<&Arc<CommitNode>>, version: Version) -> Link {
    let node = node?;
    let mut result = node.base_right.clone();
    for entry in node.mods.read().iter() {
        if let Modification::Right { version: at, child } = entry {
            if *at <= version {
                result = child.clone();
            }
        }
    }
    result
}

/// Effective height of `node` as of `version`. Absent nodes have height 0.
#[must_use]
pub fn height_at(node: Option<&Arc<CommitNode>>, version: Version) -> u32 {
    let Some(node) = node else { return 0 };
    let mut result = node.base_height;
    for entry in node.mods.read().iter() {
        if let Modification::Height {
            version: at,
            height,
        } = entry
        {
            if *at <= version {
                result = *height;
            }
        }
    }
    result
}

/// Effective height difference (left minus right) of `node` as of `version`.
#[must_use]
pub fn balance_factor(node: &Arc<CommitNode>, version: Version) -> i64 {
    let left = left_at(Some(node), version);
    let right = right_at(Some(node), version);
    i64::from(height_at(left.as_ref(), version)) - i64::from(height_at(right.as_ref(), version))
}

// ── Promotion and copy-on-overflow updaters ─────────────────────────────────

/// Copy `node` into an unfrozen state for `version`: baselines take the
/// effective values as of `version`, the log starts empty.
fn copy_effective(node: &Arc<CommitNode>, version: Version) -> CommitNode {
    CommitNode {
        record: node.record.clone(),
        base_left: left_at(Some(node), version),
        base_right: right_at(Some(node), version),
        base_height: height_at(Some(node), version),
        mods: RwLock::new(Vec::with_capacity(MAX_MODS)),
    }
}

/// Force `node` into a writable-for-`version` identity.
///
/// Always allocates: the returned node has the effective fields of `node`
/// at `version` as its baselines and a fresh, empty log. The original is
/// left untouched and stays correct for every version referencing it.
#[must_use]
pub fn promote(node: &Arc<CommitNode>, version: Version) -> Arc<CommitNode> {
    trace!(
        target: "evg::tree",
        event = "node_promoted",
        key = node.commit_key().0,
        version = version.0
    );
    Arc::new(copy_effective(node, version))
}

/// Record a left-child change as of `version`.
///
/// Appends in place when the log has room (same identity returned);
/// otherwise the node is copied and the change lands in the copy's
/// baseline.
#[must_use]
pub fn set_left(node: &Arc<CommitNode>, child: Link, version: Version) -> Arc<CommitNode> {
    {
        let mut mods = node.mods.write();
        if mods.len() < MAX_MODS {
            mods.push(Modification::Left { version, child });
            return Arc::clone(node);
        }
    }
    debug!(
        target: "evg::tree",
        event = "log_overflow",
        field = "left",
        key = node.commit_key().0,
        version = version.0
    );
    let mut fresh = copy_effective(node, version);
    fresh.base_left = child;
    Arc::new(fresh)
}

/// Record a right-child change as of `version`. See [`set_left`].
#[must_use]
pub fn set_right(node: &Arc<CommitNode>, child: Link, version: Version) -> Arc<CommitNode> {
    {
        let mut mods = node.mods.write();
        if mods.len() < MAX_MODS {
            mods.push(Modification::Right { version, child });
            return Arc::clone(node);
        }
    }
    debug!(
        target: "evg::tree",
        event = "log_overflow",
        field = "right",
        key = node.commit_key().0,
        version = version.0
    );
    let mut fresh = copy_effective(node, version);
    fresh.base_right = child;
    Arc::new(fresh)
}

/// Record a height change as of `version`. See [`set_left`].
#[must_use]
pub fn set_height(node: &Arc<CommitNode>, height: u32, version: Version) -> Arc<CommitNode> {
    {
        let mut mods = node.mods.write();
        if mods.len() < MAX_MODS {
            mods.push(Modification::Height { version, height });
            return Arc::clone(node);
        }
    }
    debug!(
        target: "evg::tree",
        event = "log_overflow",
        field = "height",
        key = node.commit_key().0,
        version = version.0
    );
    let mut fresh = copy_effective(node, version);
    fresh.base_height = height;
    Arc::new(fresh)
}

fn recomputed_height(node: &Arc<CommitNode>, version: Version) -> u32 {
    let left = left_at(Some(node), version);
    let right = right_at(Some(node), version);
    1 + height_at(left.as_ref(), version).max(height_at(right.as_ref(), version))
}

// ── Rotations ───────────────────────────────────────────────────────────────

/// Right-rotate the subtree rooted at `y` as of `version`, returning the
/// new subtree root.
///
/// The pivoting left child is always promoted first so the rotation writes
/// into a node that is writable for this version. A node without an
/// effective left child is returned unchanged (the rotation has nothing to
/// pivot on).
#[must_use]
pub fn rotate_right(y: &Arc<CommitNode>, version: Version) -> Arc<CommitNode> {
    let Some(pivot) = left_at(Some(y), version) else {
        return Arc::clone(y);
    };
    let x = promote(&pivot, version);
    let t2 = right_at(Some(&x), version);

    let y2 = set_left(y, t2, version);
    let y2 = set_height(&y2, recomputed_height(&y2, version), version);
    let x2 = set_right(&x, Some(y2), version);
    let x2 = set_height(&x2, recomputed_height(&x2, version), version);

    debug!(
        target: "evg::tree",
        event = "rotate_right",
        pivot = x2.commit_key().0,
        version = version.0
    );
    x2
}

/// Left-rotate the subtree rooted at `x` as of `version`. Mirror image of
/// [`rotate_right`].
#[must_use]
pub fn rotate_left(x: &Arc<CommitNode>, version: Version) -> Arc<CommitNode> {
    let Some(pivot) = right_at(Some(x), version) else {
        return Arc::clone(x);
    };
    let y = promote(&pivot, version);
    let t2 = left_at(Some(&y), version);

    let x2 = set_right(x, t2, version);
    let x2 = set_height(&x2, recomputed_height(&x2, version), version);
    let y2 = set_left(&y, Some(x2), version);
    let y2 = set_height(&y2, recomputed_height(&y2, version), version);

    debug!(
        target: "evg::tree",
        event = "rotate_left",
        pivot = y2.commit_key().0,
        version = version.0
    );
    y2
}

// ── Insertion ───────────────────────────────────────────────────────────────

/// Insert `record` as of `version`, returning the new root.
///
/// Precondition (owner-enforced, see `evg-log`): `version` is strictly
/// greater than every version previously inserted into this tree. Under
/// that precondition the function is total — it never fails and never
/// disturbs the view of any earlier version.
///
/// The traversal root is unconditionally promoted before descending, so
/// every insertion returns a fresh root identity; records with a key equal
/// to an existing key descend right.
#[must_use]
pub fn insert(root: Link, version: Version, record: CommitRecord) -> Arc<CommitNode> {
    let Some(root) = root else {
        debug!(
            target: "evg::tree",
            event = "leaf_created",
            key = record.commit_key.0,
            version = version.0
        );
        return CommitNode::leaf(record);
    };

    let working = promote(&root, version);
    let key = record.commit_key;
    let working = if key < working.commit_key() {
        let child = insert(left_at(Some(&working), version), version, record);
        set_left(&working, Some(child), version)
    } else {
        let child = insert(right_at(Some(&working), version), version, record);
        set_right(&working, Some(child), version)
    };
    let working = set_height(&working, recomputed_height(&working, version), version);

    rebalance(working, key, version)
}

/// Apply the four AVL cases. Tie-breaks read the *effective* child key at
/// `version`, never the baseline.
fn rebalance(node: Arc<CommitNode>, key: Version, version: Version) -> Arc<CommitNode> {
    let balance = balance_factor(&node, version);

    if balance > 1 {
        if let Some(left) = left_at(Some(&node), version) {
            if key < left.commit_key() {
                return rotate_right(&node, version);
            }
            let rotated = rotate_left(&left, version);
            let node = set_left(&node, Some(rotated), version);
            return rotate_right(&node, version);
        }
    }
    if balance < -1 {
        if let Some(right) = right_at(Some(&node), version) {
            if key >= right.commit_key() {
                return rotate_left(&node, version);
            }
            let rotated = rotate_right(&right, version);
            let node = set_right(&node, Some(rotated), version);
            return rotate_left(&node, version);
        }
    }
    node
}

// ── Versioned traversal ─────────────────────────────────────────────────────

/// In-order walk of the tree visible at `version`.
///
/// Pure function of `(root, version)`: records come back in ascending
/// commit-key order, and repeated calls with the same arguments yield the
/// same sequence. An absent root is a valid, empty tree.
#[must_use]
pub fn snapshot_at(root: Option<&Arc<CommitNode>>, version: Version) -> Vec<CommitRecord> {
    let mut records = Vec::new();
    collect_in_order(root, version, &mut records);
    records
}

fn collect_in_order(node: Option<&Arc<CommitNode>>, version: Version, out: &mut Vec<CommitRecord>) {
    let Some(node) = node else { return };
    collect_in_order(left_at(Some(node), version).as_ref(), version, out);
    out.push(node.record().clone());
    collect_in_order(right_at(Some(node), version).as_ref(), version, out);
}
