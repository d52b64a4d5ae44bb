//! `arbor link` and `arbor unlink`: change an issue's parent.

use anyhow::Result;
use arbor_core::hierarchy::{ChangeKind, ParentChangeOutcome};
use arbor_core::{CancelToken, HierarchyService, Issue};
use clap::Args;
use std::io::Write as _;

use super::Context;
use crate::output::render;

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Index of the issue to attach.
    pub index: i64,

    /// Global ID of the new parent issue.
    #[arg(long)]
    pub parent: i64,
}

#[derive(Args, Debug)]
pub struct UnlinkArgs {
    /// Index of the issue to detach from its parent.
    pub index: i64,
}

pub fn run_link(args: &LinkArgs, ctx: &Context) -> Result<()> {
    let actor = ctx.require_actor()?;
    let mut conn = ctx.open_db()?;
    let mut child = ctx.issue_by_index(&conn, args.index)?;
    let mut parent = arbor_core::db::issues::get_issue_by_id(&conn, args.parent)?
        .ok_or_else(|| anyhow::anyhow!("parent issue {} not found", args.parent))?;

    let service = HierarchyService::new(ctx.config.clone());
    let outcome = service
        .set_parent(
            &mut conn,
            &CancelToken::new(),
            &mut child,
            Some(&mut parent),
            actor,
        )
        .map_err(|e| ctx.fail(e))?;

    report(ctx, &outcome, &child, Some(&parent))
}

pub fn run_unlink(args: &UnlinkArgs, ctx: &Context) -> Result<()> {
    let actor = ctx.require_actor()?;
    let mut conn = ctx.open_db()?;
    let mut child = ctx.issue_by_index(&conn, args.index)?;

    let service = HierarchyService::new(ctx.config.clone());
    let outcome = service
        .set_parent(&mut conn, &CancelToken::new(), &mut child, None, actor)
        .map_err(|e| ctx.fail(e))?;

    report(ctx, &outcome, &child, None)
}

fn report(
    ctx: &Context,
    outcome: &ParentChangeOutcome,
    child: &Issue,
    parent: Option<&Issue>,
) -> Result<()> {
    render(ctx.output, outcome, |o, w| match (o.kind, parent) {
        (ChangeKind::Unchanged, Some(p)) => {
            writeln!(w, "#{} is already a sub-issue of #{}", child.index, p.index)
        }
        (ChangeKind::Unchanged, None) => writeln!(w, "#{} has no parent", child.index),
        (_, Some(p)) => writeln!(
            w,
            "Linked #{} under #{} ({})",
            child.index, p.index, p.title
        ),
        (_, None) => writeln!(
            w,
            "Unlinked #{} from issue {}",
            child.index,
            o.old_parent_id.map_or_else(|| "?".to_string(), |id| id.to_string())
        ),
    })
}
