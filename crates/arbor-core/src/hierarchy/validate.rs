//! Read-only graph walks and the accept/reject decision for a new parent.
//!
//! # Checks, in order
//!
//! For `child` proposed under `parent` (with `root` the top of `parent`'s
//! tree and `depth` the edge count from `parent` to `root`):
//!
//! 1. `parent` in another repository while cross-repository links are off
//!    → [`HierarchyError::CrossRepository`]
//! 2. `depth + 1 > max_sub_issues_depth` → [`HierarchyError::TooDeep`]
//! 3. `descendants(root) + 1 > max_sub_issues` → [`HierarchyError::TooMany`]
//! 4. `child` on the path `parent ..= root` → [`HierarchyError::Circular`]
//! 5. when `child` has sub-issues of its own, the moved subtree must also
//!    fit: `depth + 1 + height(child)` against the depth limit, and, when
//!    `child` comes from another tree, `descendants(root) + 1 +
//!    descendants(child)` against the count limit.
//!
//! Both limits are "would exceed" checks: a tree may reach the limit value
//! but not grow past it.
//!
//! Every walk keeps a visited set and fails with
//! [`HierarchyError::CorruptHierarchy`] instead of looping on a stored cycle.

use std::collections::{HashSet, VecDeque};

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, error};

use super::HierarchyError;
use super::store;
use crate::config::HierarchyConfig;
use crate::model::Issue;

/// Result of walking from an issue up to the top of its tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootLookup {
    /// The issue with no parent at the top of the tree.
    pub root: Issue,
    /// Number of parent edges walked; 0 when the start issue is a root.
    pub depth: usize,
    /// IDs from the start issue up to and including the root.
    pub path: Vec<i64>,
}

/// Size and height of the subtree below an issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubtreeStats {
    /// All transitive sub-issues, excluding the issue itself.
    pub descendants: usize,
    /// Longest edge count from the issue down to a leaf.
    pub height: usize,
}

/// What a validated parent change will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Already in the requested state; nothing to write.
    Unchanged,
    /// Root issue gains a parent.
    Link,
    /// Issue loses its parent and becomes a root.
    Unlink,
    /// Issue moves from one parent to another.
    Move,
}

/// An accepted parent change, ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentChange {
    pub child_id: i64,
    /// Parent before the change, as resolved during validation.
    pub old_parent: Option<Issue>,
    pub new_parent_id: Option<i64>,
    /// Root of the new parent's tree, when linking.
    pub root_id: Option<i64>,
}

impl ParentChange {
    const fn unchanged(child: &Issue) -> Self {
        Self {
            child_id: child.id,
            old_parent: None,
            new_parent_id: child.parent_id,
            root_id: None,
        }
    }

    #[must_use]
    pub fn old_parent_id(&self) -> Option<i64> {
        self.old_parent.as_ref().map(|p| p.id)
    }

    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match (self.old_parent_id(), self.new_parent_id) {
            (None, Some(_)) => ChangeKind::Link,
            (Some(_), None) => ChangeKind::Unlink,
            (Some(old), Some(new)) if old != new => ChangeKind::Move,
            _ => ChangeKind::Unchanged,
        }
    }
}

/// Walk from `issue` to the root of its tree.
///
/// The first hop uses (and fills) the parent cache on `issue`; further hops
/// read each stored ancestor once.
///
/// # Errors
///
/// Returns [`HierarchyError::CorruptHierarchy`] if an issue repeats on the
/// way up, [`HierarchyError::IssueNotFound`] for a dangling parent pointer,
/// or [`HierarchyError::Store`] on query failure.
pub fn lookup_root(conn: &Connection, issue: &mut Issue) -> Result<RootLookup, HierarchyError> {
    let start = issue.detached();
    let mut ancestors = ancestors(conn, issue)?;

    let mut path = Vec::with_capacity(ancestors.len() + 1);
    path.push(start.id);
    path.extend(ancestors.iter().map(|a| a.id));

    let depth = ancestors.len();
    let root = ancestors.pop().unwrap_or(start);
    Ok(RootLookup { root, depth, path })
}

/// Ancestors of `issue`, nearest first: parent, grandparent, ..., root.
///
/// # Errors
///
/// Same as [`lookup_root`].
pub fn ancestors(conn: &Connection, issue: &mut Issue) -> Result<Vec<Issue>, HierarchyError> {
    let mut seen = HashSet::from([issue.id]);
    let mut chain = Vec::new();

    let mut next = issue.load_parent(conn)?.map(Issue::detached);
    while let Some(current) = next {
        if !seen.insert(current.id) {
            error!(issue_id = current.id, start = issue.id, "parent cycle in stored hierarchy");
            return Err(HierarchyError::CorruptHierarchy {
                issue_id: current.id,
            });
        }
        next = store::get_parent(conn, current.id)?;
        chain.push(current);
    }

    Ok(chain)
}

/// Total number of transitive sub-issues below `issue`.
///
/// Direct sub-issues come from (and fill) the cache on `issue`; deeper
/// levels are walked iteratively.
///
/// # Errors
///
/// Returns [`HierarchyError::CorruptHierarchy`] if an issue is reached twice,
/// or [`HierarchyError::Store`] on query failure.
pub fn count_descendants(conn: &Connection, issue: &mut Issue) -> Result<usize, HierarchyError> {
    let id = issue.id;
    let direct = issue.load_sub_issues(conn)?;
    Ok(survey(conn, id, direct)?.descendants)
}

/// Size and height of the stored subtree below `issue_id`.
///
/// # Errors
///
/// Same as [`count_descendants`].
pub fn subtree_stats(conn: &Connection, issue_id: i64) -> Result<SubtreeStats, HierarchyError> {
    let direct = store::get_children(conn, issue_id)?;
    survey(conn, issue_id, &direct)
}

fn survey(conn: &Connection, top: i64, direct: &[Issue]) -> Result<SubtreeStats, HierarchyError> {
    let mut seen = HashSet::from([top]);
    let mut queue: VecDeque<(i64, usize)> = direct.iter().map(|c| (c.id, 1)).collect();
    let mut stats = SubtreeStats::default();

    while let Some((id, level)) = queue.pop_front() {
        if !seen.insert(id) {
            error!(issue_id = id, top, "issue reached twice below subtree top");
            return Err(HierarchyError::CorruptHierarchy { issue_id: id });
        }
        stats.descendants += 1;
        stats.height = stats.height.max(level);

        for child in store::get_children(conn, id)? {
            queue.push_back((child.id, level + 1));
        }
    }

    Ok(stats)
}

/// Fail with [`HierarchyError::Circular`] when `child_id` is `parent_id` or
/// one of its stored ancestors.
///
/// Walks parent pointers only, so it is cheap enough to run inside the write
/// transaction after the new pointer has been written.
///
/// # Errors
///
/// Returns [`HierarchyError::Circular`], [`HierarchyError::CorruptHierarchy`]
/// for a cycle that does not pass through `child_id`, or a read failure.
pub fn ensure_not_ancestor(
    conn: &Connection,
    child_id: i64,
    parent_id: i64,
) -> Result<(), HierarchyError> {
    let mut seen = HashSet::new();
    let mut current = Some(parent_id);
    while let Some(id) = current {
        if id == child_id {
            return Err(HierarchyError::Circular {
                child: child_id,
                parent: parent_id,
            });
        }
        if !seen.insert(id) {
            error!(issue_id = id, start = parent_id, "parent cycle in stored hierarchy");
            return Err(HierarchyError::CorruptHierarchy { issue_id: id });
        }
        current = store::get_parent(conn, id)?.map(|parent| parent.id);
    }
    Ok(())
}

/// Decide whether `child` may be placed under `new_parent` (or made a root
/// when `None`).
///
/// Reads only; nothing is written and no cache is invalidated. Caches on
/// `child` and `new_parent` may be filled along the way.
///
/// # Errors
///
/// Returns the rejection ([`HierarchyError::TooDeep`],
/// [`HierarchyError::TooMany`], [`HierarchyError::Circular`],
/// [`HierarchyError::CrossRepository`]) or a walk failure.
pub fn validate_parent_change(
    conn: &Connection,
    config: &HierarchyConfig,
    child: &mut Issue,
    new_parent: Option<&mut Issue>,
) -> Result<ParentChange, HierarchyError> {
    let new_parent_id = new_parent.as_ref().map(|p| p.id);
    if child.parent_id == new_parent_id {
        debug!(child = child.id, parent = ?new_parent_id, "parent unchanged");
        return Ok(ParentChange::unchanged(child));
    }

    let old_parent = child.load_parent(conn)?.map(Issue::detached);

    let root_id = match new_parent {
        Some(parent) => Some(validate_link(conn, config, child, parent)?),
        None => None,
    };

    Ok(ParentChange {
        child_id: child.id,
        old_parent,
        new_parent_id,
        root_id,
    })
}

/// Run the link checks for `child` under `parent`, returning the root of
/// `parent`'s tree.
///
/// # Errors
///
/// See [`validate_parent_change`].
pub fn validate_link(
    conn: &Connection,
    config: &HierarchyConfig,
    child: &mut Issue,
    parent: &mut Issue,
) -> Result<i64, HierarchyError> {
    if child.repo_id != parent.repo_id && !config.allow_cross_repository {
        return Err(HierarchyError::CrossRepository {
            child: child.id,
            parent: parent.id,
        });
    }

    let (child_id, parent_id) = (child.id, parent.id);
    let lookup = lookup_root(conn, parent)?;
    let root_id = lookup.root.id;
    let reject_deep = || HierarchyError::TooDeep {
        child: child_id,
        parent: parent_id,
        root: root_id,
    };

    if lookup.depth + 1 > config.max_sub_issues_depth {
        return Err(reject_deep());
    }

    let count = if root_id == parent_id {
        count_descendants(conn, parent)?
    } else {
        let mut root = lookup.root.clone();
        count_descendants(conn, &mut root)?
    };
    let reject_many = || HierarchyError::TooMany {
        child: child_id,
        parent: parent_id,
        root: root_id,
    };

    if count + 1 > config.max_sub_issues {
        return Err(reject_many());
    }

    if lookup.path.contains(&child_id) {
        return Err(HierarchyError::Circular {
            child: child_id,
            parent: parent_id,
        });
    }

    let direct = child.load_sub_issues(conn)?;
    if !direct.is_empty() {
        let moved = survey(conn, child_id, direct)?;
        if lookup.depth + 1 + moved.height > config.max_sub_issues_depth {
            return Err(reject_deep());
        }

        let same_tree = lookup_root(conn, child)?.root.id == root_id;
        if !same_tree && count + 1 + moved.descendants > config.max_sub_issues {
            return Err(reject_many());
        }
    }

    debug!(
        child = child_id,
        parent = parent_id,
        root = root_id,
        depth = lookup.depth,
        count,
        "parent change accepted"
    );
    Ok(root_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::issues::get_issue_by_id;
    use crate::db::open_in_memory;
    use rusqlite::params;

    fn insert(conn: &Connection, id: i64, parent: Option<i64>) {
        insert_in_repo(conn, id, 1, parent);
    }

    fn insert_in_repo(conn: &Connection, id: i64, repo: i64, parent: Option<i64>) {
        conn.execute(
            "INSERT INTO issues (id, repo_id, idx, title, parent_id, created_unix) \
             VALUES (?1, ?2, ?1, ?3, ?4, ?1)",
            params![id, repo, format!("issue {id}"), parent],
        )
        .expect("insert issue");
    }

    fn load(conn: &Connection, id: i64) -> Issue {
        get_issue_by_id(conn, id).unwrap().expect("issue exists")
    }

    fn limits(depth: usize, count: usize) -> HierarchyConfig {
        HierarchyConfig {
            max_sub_issues_depth: depth,
            max_sub_issues: count,
            ..HierarchyConfig::default()
        }
    }

    /// Force a stored cycle 1 -> 2 -> 3 -> 1 behind the validator's back.
    fn corrupt_cycle(conn: &Connection) {
        insert(conn, 1, None);
        insert(conn, 2, Some(1));
        insert(conn, 3, Some(2));
        conn.execute("UPDATE issues SET parent_id = 3 WHERE id = 1", [])
            .unwrap();
    }

    // -----------------------------------------------------------------------
    // lookup_root / ancestors
    // -----------------------------------------------------------------------

    #[test]
    fn lookup_root_of_root_is_itself() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);

        let lookup = lookup_root(&conn, &mut load(&conn, 1)).unwrap();
        assert_eq!(lookup.root.id, 1);
        assert_eq!(lookup.depth, 0);
        assert_eq!(lookup.path, vec![1]);
    }

    #[test]
    fn lookup_root_three_levels() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, Some(1));
        insert(&conn, 3, Some(2));

        let mut leaf = load(&conn, 3);
        let lookup = lookup_root(&conn, &mut leaf).unwrap();
        assert_eq!(lookup.root.id, 1);
        assert_eq!(lookup.depth, 2);
        assert_eq!(lookup.path, vec![3, 2, 1]);
        assert!(leaf.is_parent_loaded(), "first hop memoized on the instance");
    }

    #[test]
    fn ancestors_nearest_first() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, Some(1));
        insert(&conn, 3, Some(2));

        let ids: Vec<i64> = ancestors(&conn, &mut load(&conn, 3))
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn lookup_root_detects_stored_cycle() {
        let conn = open_in_memory().unwrap();
        corrupt_cycle(&conn);

        let err = lookup_root(&conn, &mut load(&conn, 2)).unwrap_err();
        assert!(matches!(err, HierarchyError::CorruptHierarchy { .. }));
    }

    // -----------------------------------------------------------------------
    // count_descendants / subtree_stats
    // -----------------------------------------------------------------------

    #[test]
    fn count_descendants_of_leaf_is_zero() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        assert_eq!(count_descendants(&conn, &mut load(&conn, 1)).unwrap(), 0);
    }

    #[test]
    fn count_descendants_is_full_subtree() {
        // 1
        // ├── 2
        // │   ├── 4
        // │   └── 5
        // │       └── 6
        // └── 3
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, Some(1));
        insert(&conn, 3, Some(1));
        insert(&conn, 4, Some(2));
        insert(&conn, 5, Some(2));
        insert(&conn, 6, Some(5));

        let mut root = load(&conn, 1);
        assert_eq!(count_descendants(&conn, &mut root).unwrap(), 5);
        assert_eq!(root.cached_sub_issues().map(<[Issue]>::len), Some(2));

        assert_eq!(
            subtree_stats(&conn, 1).unwrap(),
            SubtreeStats {
                descendants: 5,
                height: 3
            }
        );
        assert_eq!(
            subtree_stats(&conn, 2).unwrap(),
            SubtreeStats {
                descendants: 3,
                height: 2
            }
        );
        assert_eq!(subtree_stats(&conn, 6).unwrap(), SubtreeStats::default());
    }

    #[test]
    fn count_descendants_handles_deep_chains() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        for id in 2..=2_000 {
            insert(&conn, id, Some(id - 1));
        }
        assert_eq!(count_descendants(&conn, &mut load(&conn, 1)).unwrap(), 1_999);
    }

    #[test]
    fn count_descendants_detects_stored_cycle() {
        let conn = open_in_memory().unwrap();
        corrupt_cycle(&conn);

        let err = count_descendants(&conn, &mut load(&conn, 1)).unwrap_err();
        assert!(matches!(err, HierarchyError::CorruptHierarchy { .. }));
    }

    // -----------------------------------------------------------------------
    // validate_parent_change
    // -----------------------------------------------------------------------

    #[test]
    fn unchanged_when_already_root() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);

        let mut child = load(&conn, 1);
        let plan = validate_parent_change(&conn, &limits(5, 5), &mut child, None).unwrap();
        assert_eq!(plan.kind(), ChangeKind::Unchanged);
        assert!(!child.is_parent_loaded());
    }

    #[test]
    fn unchanged_when_same_parent() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, Some(1));

        let mut child = load(&conn, 2);
        let mut parent = load(&conn, 1);
        let plan =
            validate_parent_change(&conn, &limits(5, 5), &mut child, Some(&mut parent)).unwrap();
        assert_eq!(plan.kind(), ChangeKind::Unchanged);
    }

    #[test]
    fn unlink_needs_no_limits() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, Some(1));

        let mut child = load(&conn, 2);
        let plan = validate_parent_change(&conn, &limits(0, 0), &mut child, None).unwrap();
        assert_eq!(plan.kind(), ChangeKind::Unlink);
        assert_eq!(plan.old_parent_id(), Some(1));
        assert_eq!(plan.root_id, None);
    }

    #[test]
    fn link_and_move_kinds() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, None);
        insert(&conn, 3, Some(1));
        insert(&conn, 4, None);

        let plan = validate_parent_change(
            &conn,
            &limits(5, 5),
            &mut load(&conn, 4),
            Some(&mut load(&conn, 1)),
        )
        .unwrap();
        assert_eq!(plan.kind(), ChangeKind::Link);
        assert_eq!(plan.root_id, Some(1));

        let plan = validate_parent_change(
            &conn,
            &limits(5, 5),
            &mut load(&conn, 3),
            Some(&mut load(&conn, 2)),
        )
        .unwrap();
        assert_eq!(plan.kind(), ChangeKind::Move);
        assert_eq!(plan.old_parent_id(), Some(1));
        assert_eq!(plan.new_parent_id, Some(2));
    }

    #[test]
    fn depth_limit_is_reachable_but_not_exceeded() {
        // 1 -> 2 -> 3 ; max depth 3
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, Some(1));
        insert(&conn, 3, Some(2));
        insert(&conn, 4, None);
        insert(&conn, 5, None);
        let config = limits(3, 100);

        // 3 is at depth 2, so 4 lands at depth 3: allowed.
        validate_link(&conn, &config, &mut load(&conn, 4), &mut load(&conn, 3)).unwrap();

        conn.execute("UPDATE issues SET parent_id = 3 WHERE id = 4", [])
            .unwrap();
        let err =
            validate_link(&conn, &config, &mut load(&conn, 5), &mut load(&conn, 4)).unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::TooDeep {
                child: 5,
                parent: 4,
                root: 1
            }
        ));
    }

    #[test]
    fn count_limit_is_reachable_but_not_exceeded() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, Some(1));
        insert(&conn, 3, Some(2));
        insert(&conn, 4, None);
        let config = limits(10, 3);

        // Root has 2 descendants; a third is fine.
        validate_link(&conn, &config, &mut load(&conn, 4), &mut load(&conn, 3)).unwrap();

        conn.execute("UPDATE issues SET parent_id = 3 WHERE id = 4", [])
            .unwrap();
        insert(&conn, 5, None);
        let err =
            validate_link(&conn, &config, &mut load(&conn, 5), &mut load(&conn, 2)).unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::TooMany {
                child: 5,
                parent: 2,
                root: 1
            }
        ));
    }

    #[test]
    fn circular_under_own_descendant() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, Some(1));
        insert(&conn, 3, Some(2));

        let err = validate_link(&conn, &limits(10, 10), &mut load(&conn, 1), &mut load(&conn, 3))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::Circular { child: 1, parent: 3 }));
    }

    #[test]
    fn circular_under_itself() {
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);

        let err = validate_link(&conn, &limits(10, 10), &mut load(&conn, 1), &mut load(&conn, 1))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::Circular { child: 1, parent: 1 }));
    }

    #[test]
    fn cross_repository_rejected_unless_enabled() {
        let conn = open_in_memory().unwrap();
        insert_in_repo(&conn, 1, 1, None);
        insert_in_repo(&conn, 2, 2, None);

        let err = validate_link(&conn, &limits(5, 5), &mut load(&conn, 2), &mut load(&conn, 1))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::CrossRepository { child: 2, parent: 1 }));

        let config = HierarchyConfig {
            allow_cross_repository: true,
            ..limits(5, 5)
        };
        assert_eq!(
            validate_link(&conn, &config, &mut load(&conn, 2), &mut load(&conn, 1)).unwrap(),
            1
        );
    }

    #[test]
    fn moving_a_subtree_counts_its_height() {
        // Tree A: 1 -> 2 ; tree B: 10 -> 11 -> 12 ; max depth 3.
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, Some(1));
        insert(&conn, 10, None);
        insert(&conn, 11, Some(10));
        insert(&conn, 12, Some(11));

        // 10 under 2 would put 12 at depth 4.
        let err = validate_link(&conn, &limits(3, 100), &mut load(&conn, 10), &mut load(&conn, 2))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::TooDeep { child: 10, .. }));

        // 11 under 2 puts 12 at depth 3.
        validate_link(&conn, &limits(3, 100), &mut load(&conn, 11), &mut load(&conn, 2)).unwrap();
    }

    #[test]
    fn moving_a_subtree_counts_its_size() {
        // Tree A: 1 -> 2 ; tree B: 10 -> {11, 12} ; max count 3.
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, Some(1));
        insert(&conn, 10, None);
        insert(&conn, 11, Some(10));
        insert(&conn, 12, Some(10));

        let err = validate_link(&conn, &limits(10, 3), &mut load(&conn, 10), &mut load(&conn, 1))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::TooMany { child: 10, root: 1, .. }));
    }

    #[test]
    fn moving_within_same_tree_does_not_double_count() {
        // 1 -> {2 -> 3, 4} ; max count 4. Moving 2 (with 3) under 4 keeps
        // the tree at 3 descendants.
        let conn = open_in_memory().unwrap();
        insert(&conn, 1, None);
        insert(&conn, 2, Some(1));
        insert(&conn, 3, Some(2));
        insert(&conn, 4, Some(1));

        assert_eq!(
            validate_link(&conn, &limits(10, 4), &mut load(&conn, 2), &mut load(&conn, 4))
                .unwrap(),
            1
        );
    }

    #[test]
    fn corrupt_store_surfaces_as_error_not_loop() {
        let conn = open_in_memory().unwrap();
        corrupt_cycle(&conn);
        insert(&conn, 9, None);

        let err = validate_link(&conn, &limits(10, 10), &mut load(&conn, 9), &mut load(&conn, 3))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::CorruptHierarchy { .. }));
    }
}
