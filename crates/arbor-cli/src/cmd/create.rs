//! `arbor create`: add a root issue.

use anyhow::Result;
use arbor_core::NewIssue;
use arbor_core::db::issues::insert_issue;
use clap::Args;
use std::io::Write as _;

use super::Context;
use crate::output::render;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Issue title.
    pub title: String,
}

/// New issues never get a parent; use `arbor link` afterwards.
pub fn run_create(args: &CreateArgs, ctx: &Context) -> Result<()> {
    let title = args.title.trim();
    if title.is_empty() {
        anyhow::bail!("title must not be empty");
    }

    let conn = ctx.open_db()?;
    let issue = insert_issue(&conn, &NewIssue::new(ctx.repo_id, title))?;
    tracing::info!(id = issue.id, index = issue.index, "issue created");

    render(ctx.output, &issue, |issue, w| {
        writeln!(w, "Created #{} (id {}): {}", issue.index, issue.id, issue.title)
    })
}
