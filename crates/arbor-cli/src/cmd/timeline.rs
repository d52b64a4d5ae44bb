//! `arbor timeline`: sub-issue events recorded on an issue.

use anyhow::Result;
use arbor_core::db::comments::{CommentKind, TimelineComment, list_comments};
use chrono::DateTime;
use clap::Args;
use std::io::Write as _;

use super::Context;
use crate::output::render;

#[derive(Args, Debug)]
pub struct TimelineArgs {
    /// Index of the issue.
    pub index: i64,
}

pub fn run_timeline(args: &TimelineArgs, ctx: &Context) -> Result<()> {
    let conn = ctx.open_db()?;
    let issue = ctx.issue_by_index(&conn, args.index)?;
    let comments = list_comments(&conn, issue.id)?;

    render(ctx.output, &comments, |comments, w| {
        if comments.is_empty() {
            return writeln!(w, "No sub-issue events for #{}", issue.index);
        }
        for comment in comments {
            writeln!(w, "{}", describe(comment))?;
        }
        Ok(())
    })
}

fn describe(comment: &TimelineComment) -> String {
    let when = DateTime::from_timestamp(comment.created_unix, 0)
        .map_or_else(|| comment.created_unix.to_string(), |t| t.to_rfc3339());
    let action = match comment.kind {
        CommentKind::AddSubIssue => "added sub-issue",
        CommentKind::RemoveSubIssue => "removed sub-issue",
        CommentKind::AddParentIssue => "set parent to",
        CommentKind::RemoveParentIssue => "removed parent",
    };
    format!(
        "{when}  {} {action} {}",
        comment.poster_name, comment.related_issue_id
    )
}
