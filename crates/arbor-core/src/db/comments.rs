//! Timeline comments written for sub-issue link changes.
//!
//! Every link or unlink produces two rows, one on each side of the edge:
//! the parent gets `add_sub_issue` / `remove_sub_issue` pointing at the
//! child, and the child gets `add_parent_issue` / `remove_parent_issue`
//! pointing at the parent.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::hierarchy::audit::AuditSink;
use crate::model::{Actor, Issue};

/// Kind of timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    AddSubIssue,
    RemoveSubIssue,
    AddParentIssue,
    RemoveParentIssue,
}

impl CommentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddSubIssue => "add_sub_issue",
            Self::RemoveSubIssue => "remove_sub_issue",
            Self::AddParentIssue => "add_parent_issue",
            Self::RemoveParentIssue => "remove_parent_issue",
        }
    }
}

impl fmt::Display for CommentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add_sub_issue" => Ok(Self::AddSubIssue),
            "remove_sub_issue" => Ok(Self::RemoveSubIssue),
            "add_parent_issue" => Ok(Self::AddParentIssue),
            "remove_parent_issue" => Ok(Self::RemoveParentIssue),
            other => bail!("unknown comment kind '{other}'"),
        }
    }
}

/// A timeline row from `issue_comments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineComment {
    pub comment_id: i64,
    pub issue_id: i64,
    pub kind: CommentKind,
    pub poster_id: i64,
    pub poster_name: String,
    pub related_issue_id: i64,
    pub created_unix: i64,
}

/// Append one timeline row.
///
/// # Errors
///
/// Returns an error if the insert fails (for example when `issue_id` does
/// not exist).
pub fn insert_comment(
    conn: &Connection,
    issue_id: i64,
    kind: CommentKind,
    actor: &Actor,
    related_issue_id: i64,
) -> Result<i64> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "INSERT INTO issue_comments \
         (issue_id, kind, poster_id, poster_name, related_issue_id, created_unix) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            issue_id,
            kind.as_str(),
            actor.id,
            actor.name,
            related_issue_id,
            now
        ],
    )
    .with_context(|| format!("insert {kind} comment on issue {issue_id}"))?;
    Ok(conn.last_insert_rowid())
}

/// All timeline rows of an issue, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails or a row holds an unknown kind.
pub fn list_comments(conn: &Connection, issue_id: i64) -> Result<Vec<TimelineComment>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT comment_id, issue_id, kind, poster_id, poster_name, \
             related_issue_id, created_unix \
             FROM issue_comments WHERE issue_id = ?1 \
             ORDER BY created_unix ASC, comment_id ASC",
        )
        .context("prepare list_comments")?;

    let rows = stmt
        .query_map(params![issue_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })
        .context("execute list_comments")?;

    let mut comments = Vec::new();
    for row in rows {
        let (comment_id, issue_id, kind, poster_id, poster_name, related_issue_id, created_unix) =
            row.context("read comment row")?;
        comments.push(TimelineComment {
            comment_id,
            issue_id,
            kind: kind.parse()?,
            poster_id,
            poster_name,
            related_issue_id,
            created_unix,
        });
    }
    Ok(comments)
}

/// [`AuditSink`] that writes paired timeline comments to `issue_comments`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentAuditSink;

impl CommentAuditSink {
    fn record_pair(
        conn: &Connection,
        actor: &Actor,
        parent: &Issue,
        child: &Issue,
        on_parent: CommentKind,
        on_child: CommentKind,
    ) -> Result<()> {
        let tx = conn
            .unchecked_transaction()
            .context("begin timeline transaction")?;
        insert_comment(&tx, parent.id, on_parent, actor, child.id)?;
        insert_comment(&tx, child.id, on_child, actor, parent.id)?;
        tx.commit().context("commit timeline comments")
    }
}

impl AuditSink for CommentAuditSink {
    fn record_sub_issue_linked(
        &self,
        conn: &Connection,
        actor: &Actor,
        parent: &Issue,
        child: &Issue,
    ) -> Result<()> {
        Self::record_pair(
            conn,
            actor,
            parent,
            child,
            CommentKind::AddSubIssue,
            CommentKind::AddParentIssue,
        )
    }

    fn record_sub_issue_unlinked(
        &self,
        conn: &Connection,
        actor: &Actor,
        parent: &Issue,
        child: &Issue,
    ) -> Result<()> {
        Self::record_pair(
            conn,
            actor,
            parent,
            child,
            CommentKind::RemoveSubIssue,
            CommentKind::RemoveParentIssue,
        )
    }
}
