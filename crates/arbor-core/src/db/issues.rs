//! Issue lookups used by the hierarchy engine.
//!
//! These are the generic issue-persistence entry points: load by ID, load
//! by per-repository index, and a minimal insert for seeding. Parent links
//! are never written here; see [`crate::hierarchy::store`].

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::{Issue, NewIssue};

/// Column list matching [`row_to_issue`].
pub(crate) const ISSUE_COLUMNS: &str = "id, repo_id, idx, title, parent_id, created_unix";

/// Fetch a single issue by its global ID.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_issue_by_id(conn: &Connection, id: i64) -> Result<Option<Issue>> {
    let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1");
    conn.prepare_cached(&sql)
        .context("prepare get_issue_by_id")?
        .query_row(params![id], row_to_issue)
        .optional()
        .with_context(|| format!("get_issue_by_id for {id}"))
}

/// Fetch a single issue by repository and per-repository index.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_issue_by_index(conn: &Connection, repo_id: i64, index: i64) -> Result<Option<Issue>> {
    let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE repo_id = ?1 AND idx = ?2");
    conn.prepare_cached(&sql)
        .context("prepare get_issue_by_index")?
        .query_row(params![repo_id, index], row_to_issue)
        .optional()
        .with_context(|| format!("get_issue_by_index for repo {repo_id} #{index}"))
}

/// Insert a root issue, allocating the next index in its repository.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_issue(conn: &Connection, new: &NewIssue) -> Result<Issue> {
    conn.execute(
        "INSERT INTO issues (repo_id, idx, title, parent_id, created_unix) \
         SELECT ?1, COALESCE(MAX(idx), 0) + 1, ?2, NULL, ?3 \
         FROM issues WHERE repo_id = ?1",
        params![new.repo_id, new.title, new.created_unix],
    )
    .with_context(|| format!("insert issue in repo {}", new.repo_id))?;

    let id = conn.last_insert_rowid();
    get_issue_by_id(conn, id)?.ok_or_else(|| anyhow!("inserted issue {id} vanished"))
}

pub(crate) fn row_to_issue(row: &rusqlite::Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue::new(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get::<_, String>(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}
