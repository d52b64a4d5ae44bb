//! Shared fixtures for the hierarchy integration tests.

#![allow(dead_code)]

use arbor_core::db::issues::{get_issue_by_id, insert_issue};
use arbor_core::hierarchy::{HierarchyError, ParentChangeOutcome, ancestors, count_descendants};
use arbor_core::{Actor, CancelToken, ConfigHandle, HierarchyConfig, HierarchyService, Issue, NewIssue};
use rusqlite::Connection;

pub fn limits(depth: usize, count: usize) -> HierarchyConfig {
    HierarchyConfig {
        max_sub_issues_depth: depth,
        max_sub_issues: count,
        ..HierarchyConfig::default()
    }
}

pub fn service(depth: usize, count: usize) -> HierarchyService {
    HierarchyService::new(ConfigHandle::new(limits(depth, count)))
}

pub fn alice() -> Actor {
    Actor::new(7, "alice")
}

/// Insert `n` root issues in repository 1 and return their IDs.
pub fn seed(conn: &Connection, n: usize) -> Vec<i64> {
    (0..n)
        .map(|i| {
            insert_issue(conn, &NewIssue::new(1, format!("issue {i}")))
                .expect("insert issue")
                .id
        })
        .collect()
}

pub fn load(conn: &Connection, id: i64) -> Issue {
    get_issue_by_id(conn, id)
        .expect("query issue")
        .expect("issue exists")
}

/// Load both issues fresh and run `set_parent`.
pub fn set_parent(
    svc: &HierarchyService,
    conn: &mut Connection,
    child: i64,
    parent: Option<i64>,
) -> Result<ParentChangeOutcome, HierarchyError> {
    let mut child = load(conn, child);
    let mut parent = parent.map(|id| load(conn, id));
    svc.set_parent(
        conn,
        &CancelToken::new(),
        &mut child,
        parent.as_mut(),
        &alice(),
    )
}

pub fn all_ids(conn: &Connection) -> Vec<i64> {
    let mut stmt = conn.prepare("SELECT id FROM issues ORDER BY id").expect("prepare");
    stmt.query_map([], |row| row.get(0))
        .expect("query ids")
        .collect::<Result<_, _>>()
        .expect("read ids")
}

/// Every issue reaches a root without revisits, within `max_depth` edges,
/// and every root holds at most `max_count` descendants.
pub fn assert_forest(conn: &Connection, max_depth: usize, max_count: usize) {
    for id in all_ids(conn) {
        let mut issue = load(conn, id);
        let chain = ancestors(conn, &mut issue).expect("acyclic parent chain");
        assert!(
            chain.len() <= max_depth,
            "issue {id} at depth {} exceeds {max_depth}",
            chain.len()
        );

        if issue.is_root() {
            let count = count_descendants(conn, &mut issue).expect("countable subtree");
            assert!(
                count <= max_count,
                "root {id} holds {count} descendants, limit {max_count}"
            );
        }
    }
}
