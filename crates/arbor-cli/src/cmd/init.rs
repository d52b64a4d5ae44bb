//! `arbor init`: create or upgrade the issue database.

use anyhow::Result;
use arbor_core::db::{migrations, open_database};
use serde::Serialize;
use std::io::Write as _;

use super::Context;
use crate::output::{kv, render};

#[derive(Debug, Serialize)]
struct InitReport {
    path: String,
    schema_version: u32,
    created: bool,
}

pub fn run_init(ctx: &Context) -> Result<()> {
    let created = !ctx.db_path.exists();
    let conn = open_database(&ctx.db_path)?;
    let report = InitReport {
        path: ctx.db_path.display().to_string(),
        schema_version: migrations::current_schema_version(&conn)?,
        created,
    };
    tracing::info!(path = %report.path, created, "issue database ready");

    render(ctx.output, &report, |r, w| {
        let verb = if r.created { "Created" } else { "Opened" };
        writeln!(w, "{verb} issue database")?;
        kv(w, "path", &r.path)?;
        kv(w, "schema", r.schema_version.to_string())
    })
}
