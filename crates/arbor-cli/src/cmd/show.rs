//! `arbor show`: where an issue sits in its tree.

use anyhow::Result;
use arbor_core::Issue;
use arbor_core::hierarchy::{ancestors, count_descendants, subtree_stats};
use clap::Args;
use serde::Serialize;
use std::io::Write as _;

use super::Context;
use crate::output::{kv, render, section};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Index of the issue to show.
    pub index: i64,
}

#[derive(Debug, Serialize)]
struct ShowReport {
    issue: Issue,
    parent: Option<Issue>,
    root: Issue,
    depth: usize,
    descendants: usize,
    height: usize,
    ancestors: Vec<Issue>,
    children: Vec<Issue>,
}

pub fn run_show(args: &ShowArgs, ctx: &Context) -> Result<()> {
    let conn = ctx.open_db()?;
    let mut issue = ctx.issue_by_index(&conn, args.index)?;

    let chain = ancestors(&conn, &mut issue).map_err(|e| ctx.fail(e))?;
    let descendants = count_descendants(&conn, &mut issue).map_err(|e| ctx.fail(e))?;
    let height = subtree_stats(&conn, issue.id)
        .map_err(|e| ctx.fail(e))?
        .height;

    let report = ShowReport {
        parent: issue.cached_parent().cloned(),
        root: chain.last().cloned().unwrap_or_else(|| issue.detached()),
        depth: chain.len(),
        descendants,
        height,
        children: issue.cached_sub_issues().unwrap_or_default().to_vec(),
        ancestors: chain,
        issue: issue.detached(),
    };

    render(ctx.output, &report, |r, w| {
        writeln!(w, "#{} {}", r.issue.index, r.issue.title)?;
        kv(w, "id", r.issue.id.to_string())?;
        kv(
            w,
            "parent",
            r.parent
                .as_ref()
                .map_or_else(|| "(none)".to_string(), |p| format!("#{} {}", p.index, p.title)),
        )?;
        kv(w, "root", format!("#{} {}", r.root.index, r.root.title))?;
        kv(w, "depth", r.depth.to_string())?;
        kv(w, "descendants", r.descendants.to_string())?;
        kv(w, "height", r.height.to_string())?;

        if !r.children.is_empty() {
            writeln!(w)?;
            section(w, "Sub-issues")?;
            for child in &r.children {
                writeln!(w, "  #{:<6} {}", child.index, child.title)?;
            }
        }
        Ok(())
    })
}
