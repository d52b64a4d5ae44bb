//! Row-level reads and writes of the parent pointer.
//!
//! No policy lives here: callers decide whether a change is legal. Reads
//! take any `&Connection` (a [`Transaction`] derefs to one); the single
//! write requires the caller's [`Transaction`].

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Transaction, params};

use super::HierarchyError;
use crate::db::issues::{self, ISSUE_COLUMNS, row_to_issue};
use crate::model::Issue;

/// Load the parent of `issue_id` as currently stored.
///
/// Returns `None` when the issue has no parent or does not exist.
///
/// # Errors
///
/// Returns [`HierarchyError::IssueNotFound`] when the stored pointer names
/// a missing row, or [`HierarchyError::Store`] if the query fails.
pub fn get_parent(conn: &Connection, issue_id: i64) -> Result<Option<Issue>, HierarchyError> {
    let Some(Some(parent_id)) = parent_pointer(conn, issue_id)? else {
        return Ok(None);
    };
    issues::get_issue_by_id(conn, parent_id)?
        .map(Some)
        .ok_or(HierarchyError::IssueNotFound(parent_id))
}

/// Load the direct sub-issues of `issue_id`, oldest first.
///
/// The order is stable across calls: creation time, then ID.
///
/// # Errors
///
/// Returns [`HierarchyError::Store`] if the query fails.
pub fn get_children(conn: &Connection, issue_id: i64) -> Result<Vec<Issue>, HierarchyError> {
    let sql = format!(
        "SELECT {ISSUE_COLUMNS} FROM issues WHERE parent_id = ?1 \
         ORDER BY created_unix ASC, id ASC"
    );
    let mut stmt = conn.prepare_cached(&sql).context("prepare get_children")?;
    let rows = stmt
        .query_map(params![issue_id], row_to_issue)
        .context("execute get_children")?;

    let mut children = Vec::new();
    for row in rows {
        children.push(row.context("read child row")?);
    }
    Ok(children)
}

/// Write the parent pointer of `issue_id` inside `tx`.
///
/// # Errors
///
/// Returns [`HierarchyError::IssueNotFound`] if no row was updated and
/// [`HierarchyError::Store`] if the update fails.
pub fn set_parent(
    tx: &Transaction<'_>,
    issue_id: i64,
    parent_id: Option<i64>,
) -> Result<(), HierarchyError> {
    let updated = tx
        .prepare_cached("UPDATE issues SET parent_id = ?2 WHERE id = ?1")
        .context("prepare set_parent")?
        .execute(params![issue_id, parent_id])
        .with_context(|| format!("set parent of {issue_id} to {parent_id:?}"))?;

    if updated == 0 {
        return Err(HierarchyError::IssueNotFound(issue_id));
    }
    Ok(())
}

/// Write the parent pointer of `issue_id` only if it still equals
/// `expected`.
///
/// # Errors
///
/// Returns [`HierarchyError::ParentChanged`] when another writer changed
/// the pointer, [`HierarchyError::IssueNotFound`] if the row is gone, and
/// [`HierarchyError::Store`] if the update fails.
pub fn replace_parent(
    tx: &Transaction<'_>,
    issue_id: i64,
    expected: Option<i64>,
    parent_id: Option<i64>,
) -> Result<(), HierarchyError> {
    let updated = tx
        .prepare_cached("UPDATE issues SET parent_id = ?2 WHERE id = ?1 AND parent_id IS ?3")
        .context("prepare replace_parent")?
        .execute(params![issue_id, parent_id, expected])
        .with_context(|| format!("set parent of {issue_id} to {parent_id:?}"))?;
    if updated > 0 {
        return Ok(());
    }

    match parent_pointer(tx, issue_id)? {
        None => Err(HierarchyError::IssueNotFound(issue_id)),
        Some(found) => Err(HierarchyError::ParentChanged {
            child: issue_id,
            expected,
            found,
        }),
    }
}

/// `None` when the row is missing, otherwise its `parent_id` column.
fn parent_pointer(conn: &Connection, issue_id: i64) -> Result<Option<Option<i64>>, HierarchyError> {
    let pointer = conn
        .prepare_cached("SELECT parent_id FROM issues WHERE id = ?1")
        .context("prepare parent_pointer")?
        .query_row(params![issue_id], |row| row.get(0))
        .optional()
        .with_context(|| format!("read parent_id of {issue_id}"))?;
    Ok(pointer)
}

impl Issue {
    /// Resolve and memoize the parent this instance points at.
    ///
    /// Follows the in-memory `parent_id`. Repeated calls reuse the cached
    /// parent until [`Issue::invalidate_parent`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::IssueNotFound`] when `parent_id` points at
    /// a missing row, or [`HierarchyError::Store`] on query failure.
    pub fn load_parent(&mut self, conn: &Connection) -> Result<Option<&Self>, HierarchyError> {
        let Some(parent_id) = self.parent_id else {
            self.parent.invalidate();
            return Ok(None);
        };

        let parent = self.parent.get_or_try_load(|| {
            issues::get_issue_by_id(conn, parent_id)?
                .map(Box::new)
                .ok_or(HierarchyError::IssueNotFound(parent_id))
        })?;
        Ok(Some(&**parent))
    }

    /// Resolve and memoize the direct sub-issues of this instance.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Store`] on query failure.
    pub fn load_sub_issues(&mut self, conn: &Connection) -> Result<&[Self], HierarchyError> {
        let id = self.id;
        let children = self.sub_issues.get_or_try_load(|| get_children(conn, id))?;
        Ok(children.as_slice())
    }
}
