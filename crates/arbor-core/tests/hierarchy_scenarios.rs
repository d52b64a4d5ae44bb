//! End-to-end hierarchy behavior against an in-memory database.

mod support;

use arbor_core::db::comments::{CommentKind, list_comments};
use arbor_core::db::open_in_memory;
use arbor_core::error::ErrorCode;
use arbor_core::hierarchy::{ChangeKind, HierarchyError, count_descendants, lookup_root};
use arbor_core::{ConfigHandle, HierarchyConfig, HierarchyService};
use support::{assert_forest, limits, load, seed, service, set_parent};

fn kinds(conn: &rusqlite::Connection, id: i64) -> Vec<CommentKind> {
    list_comments(conn, id)
        .expect("list comments")
        .into_iter()
        .map(|c| c.kind)
        .collect()
}

// ---------------------------------------------------------------------------
// Count and depth limits
// ---------------------------------------------------------------------------

#[test]
fn fourth_child_exceeds_count_limit() {
    let mut conn = open_in_memory().unwrap();
    let ids = seed(&conn, 5);
    let (root, children) = (ids[0], &ids[1..]);
    let svc = service(10, 3);

    for &child in &children[..3] {
        set_parent(&svc, &mut conn, child, Some(root)).unwrap();
    }
    assert_eq!(count_descendants(&conn, &mut load(&conn, root)).unwrap(), 3);

    let err = set_parent(&svc, &mut conn, children[3], Some(root)).unwrap_err();
    match err {
        HierarchyError::TooMany {
            child,
            parent,
            root: r,
        } => {
            assert_eq!(child, children[3]);
            assert_eq!(parent, root);
            assert_eq!(r, root);
        }
        other => panic!("expected TooMany, got {other:?}"),
    }
    assert_forest(&conn, 10, 3);
}

#[test]
fn chain_at_depth_limit_accepts_no_more() {
    let mut conn = open_in_memory().unwrap();
    let max_depth = 4;
    let ids = seed(&conn, max_depth + 2);
    let svc = service(max_depth, 100);

    for pair in ids[..=max_depth].windows(2) {
        set_parent(&svc, &mut conn, pair[1], Some(pair[0])).unwrap();
    }
    let bottom = ids[max_depth];
    assert_eq!(lookup_root(&conn, &mut load(&conn, bottom)).unwrap().depth, max_depth);

    let extra = ids[max_depth + 1];
    let err = set_parent(&svc, &mut conn, extra, Some(bottom)).unwrap_err();
    assert!(
        matches!(err, HierarchyError::TooDeep { child, parent, root }
            if child == extra && parent == bottom && root == ids[0]),
        "{err:?}"
    );
    assert_eq!(err.code(), ErrorCode::HierarchyTooDeep);
    assert_forest(&conn, max_depth, 100);
}

#[test]
fn parent_under_own_child_is_circular() {
    let mut conn = open_in_memory().unwrap();
    let ids = seed(&conn, 2);
    let (a, b) = (ids[0], ids[1]);
    let svc = service(10, 10);

    set_parent(&svc, &mut conn, b, Some(a)).unwrap();
    let err = set_parent(&svc, &mut conn, a, Some(b)).unwrap_err();

    assert!(
        matches!(err, HierarchyError::Circular { child, parent } if child == a && parent == b),
        "{err:?}"
    );
    assert!(err.is_user_facing());
}

#[test]
fn link_then_unlink_leaves_two_events() {
    let mut conn = open_in_memory().unwrap();
    let ids = seed(&conn, 2);
    let (parent, child) = (ids[0], ids[1]);
    let svc = service(10, 10);

    let linked = set_parent(&svc, &mut conn, child, Some(parent)).unwrap();
    let unlinked = set_parent(&svc, &mut conn, child, None).unwrap();

    assert_eq!(linked.kind, ChangeKind::Link);
    assert_eq!(unlinked.kind, ChangeKind::Unlink);
    assert_eq!(unlinked.old_parent_id, Some(parent));
    assert!(load(&conn, child).is_root());

    assert_eq!(
        kinds(&conn, parent),
        vec![CommentKind::AddSubIssue, CommentKind::RemoveSubIssue]
    );
    assert_eq!(
        kinds(&conn, child),
        vec![CommentKind::AddParentIssue, CommentKind::RemoveParentIssue]
    );
    let posters: Vec<_> = list_comments(&conn, parent)
        .unwrap()
        .into_iter()
        .map(|c| c.poster_name)
        .collect();
    assert_eq!(posters, vec!["alice", "alice"]);
}

// ---------------------------------------------------------------------------
// No-ops and rejections
// ---------------------------------------------------------------------------

#[test]
fn setting_current_parent_is_a_no_op() {
    let mut conn = open_in_memory().unwrap();
    let ids = seed(&conn, 3);
    let svc = service(10, 10);
    set_parent(&svc, &mut conn, ids[1], Some(ids[0])).unwrap();
    let before = list_comments(&conn, ids[0]).unwrap().len();

    let again = set_parent(&svc, &mut conn, ids[1], Some(ids[0])).unwrap();
    let rootless = set_parent(&svc, &mut conn, ids[2], None).unwrap();

    assert!(!again.changed());
    assert!(!rootless.changed());
    assert_eq!(list_comments(&conn, ids[0]).unwrap().len(), before);
    assert!(list_comments(&conn, ids[2]).unwrap().is_empty());
}

#[test]
fn rejected_link_changes_nothing() {
    let mut conn = open_in_memory().unwrap();
    let ids = seed(&conn, 3);
    let svc = service(10, 1);
    set_parent(&svc, &mut conn, ids[1], Some(ids[0])).unwrap();

    let mut child = load(&conn, ids[2]);
    let mut parent = load(&conn, ids[0]);
    let err = svc
        .set_parent(
            &mut conn,
            &arbor_core::CancelToken::new(),
            &mut child,
            Some(&mut parent),
            &support::alice(),
        )
        .unwrap_err();

    assert!(matches!(err, HierarchyError::TooMany { .. }));
    assert_eq!(child.parent_id, None);
    assert_eq!(load(&conn, ids[2]).parent_id, None);
    assert!(list_comments(&conn, ids[2]).unwrap().is_empty());
    assert_eq!(list_comments(&conn, ids[0]).unwrap().len(), 1);
}

#[test]
fn moving_an_issue_between_trees() {
    let mut conn = open_in_memory().unwrap();
    let ids = seed(&conn, 3);
    let svc = service(10, 10);
    set_parent(&svc, &mut conn, ids[2], Some(ids[0])).unwrap();

    let moved = set_parent(&svc, &mut conn, ids[2], Some(ids[1])).unwrap();

    assert_eq!(moved.kind, ChangeKind::Move);
    assert_eq!(moved.old_parent_id, Some(ids[0]));
    assert_eq!(load(&conn, ids[2]).parent_id, Some(ids[1]));
    assert_eq!(count_descendants(&conn, &mut load(&conn, ids[0])).unwrap(), 0);
    assert_eq!(
        kinds(&conn, ids[0]),
        vec![CommentKind::AddSubIssue, CommentKind::RemoveSubIssue]
    );
    assert_eq!(kinds(&conn, ids[1]), vec![CommentKind::AddSubIssue]);
}

#[test]
fn subtree_moves_keep_limits() {
    // Tree X: x0 -> x1 -> x2. Tree Y: y0 -> y1.
    let mut conn = open_in_memory().unwrap();
    let ids = seed(&conn, 5);
    let (x0, x1, x2, y0, y1) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
    let svc = service(2, 3);

    set_parent(&svc, &mut conn, x1, Some(x0)).unwrap();
    set_parent(&svc, &mut conn, x2, Some(x1)).unwrap();
    set_parent(&svc, &mut conn, y1, Some(y0)).unwrap();

    // x1 carries x2; under y1 it would sit at depth 2 with x2 at depth 3.
    let err = set_parent(&svc, &mut conn, x1, Some(y1)).unwrap_err();
    assert!(matches!(err, HierarchyError::TooDeep { .. }), "{err:?}");

    // x1 under y0 fits: y0 gets y1, x1, x2.
    set_parent(&svc, &mut conn, x1, Some(y0)).unwrap();
    assert_forest(&conn, 2, 3);
}

#[test]
fn cross_repository_policy() {
    let mut conn = open_in_memory().unwrap();
    let local = arbor_core::db::issues::insert_issue(&conn, &arbor_core::NewIssue::new(1, "local"))
        .unwrap()
        .id;
    let remote =
        arbor_core::db::issues::insert_issue(&conn, &arbor_core::NewIssue::new(2, "remote"))
            .unwrap()
            .id;

    let strict = service(10, 10);
    let err = set_parent(&strict, &mut conn, remote, Some(local)).unwrap_err();
    assert!(matches!(err, HierarchyError::CrossRepository { .. }));
    assert_eq!(err.code(), ErrorCode::CrossRepository);

    let open = HierarchyService::new(ConfigHandle::new(HierarchyConfig {
        allow_cross_repository: true,
        ..limits(10, 10)
    }));
    set_parent(&open, &mut conn, remote, Some(local)).unwrap();
    assert_eq!(load(&conn, remote).parent_id, Some(local));
}

// ---------------------------------------------------------------------------
// Corruption and configuration
// ---------------------------------------------------------------------------

#[test]
fn stored_cycle_is_reported_not_looped() {
    let mut conn = open_in_memory().unwrap();
    let ids = seed(&conn, 3);
    conn.execute(
        "UPDATE issues SET parent_id = ?2 WHERE id = ?1",
        [ids[0], ids[1]],
    )
    .unwrap();
    conn.execute(
        "UPDATE issues SET parent_id = ?2 WHERE id = ?1",
        [ids[1], ids[0]],
    )
    .unwrap();

    let err = set_parent(&service(10, 10), &mut conn, ids[2], Some(ids[0])).unwrap_err();
    assert!(matches!(err, HierarchyError::CorruptHierarchy { .. }), "{err:?}");
    assert_eq!(err.code().code(), "E3003");
    assert!(!err.is_user_facing());
    assert_eq!(load(&conn, ids[2]).parent_id, None);
}

#[test]
fn reloaded_limits_apply_to_next_call() {
    let mut conn = open_in_memory().unwrap();
    let ids = seed(&conn, 3);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    std::fs::write(&path, "[hierarchy]\nmax_sub_issues = 1\n").unwrap();
    let handle = ConfigHandle::default();
    handle.reload_from(&path).unwrap();
    let svc = HierarchyService::new(handle.clone());

    set_parent(&svc, &mut conn, ids[1], Some(ids[0])).unwrap();
    assert!(matches!(
        set_parent(&svc, &mut conn, ids[2], Some(ids[0])).unwrap_err(),
        HierarchyError::TooMany { .. }
    ));

    std::fs::write(&path, "[hierarchy]\nmax_sub_issues = 2\n").unwrap();
    let reloaded = handle.reload_from(&path).unwrap();
    assert_eq!(reloaded.max_sub_issues, 2);
    assert_eq!(reloaded.max_sub_issues_depth, 10);

    set_parent(&svc, &mut conn, ids[2], Some(ids[0])).unwrap();
    assert_forest(&conn, 10, 2);
}

#[test]
fn bad_config_keeps_previous_limits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[hierarchy]\nmax_sub_issues = \"lots\"\n").unwrap();

    let handle = ConfigHandle::new(limits(3, 3));
    assert!(handle.reload_from(&path).is_err());
    assert_eq!(handle.snapshot(), limits(3, 3));
}
