pub mod completions;
pub mod create;
pub mod init;
pub mod link;
pub mod show;
pub mod timeline;

use anyhow::{Context as _, Result, bail};
use arbor_core::db::{issues, open_database};
use arbor_core::hierarchy::HierarchyError;
use arbor_core::{Actor, ConfigHandle, Issue};
use rusqlite::Connection;
use std::path::PathBuf;

use crate::output::{CliError, OutputMode, render_error};

/// Settings shared by every command, resolved from global flags.
#[derive(Debug, Clone)]
pub struct Context {
    pub db_path: PathBuf,
    pub repo_id: i64,
    pub output: OutputMode,
    pub config: ConfigHandle,
    pub actor: Option<Actor>,
}

impl Context {
    /// Open the issue database; it must already exist.
    pub fn open_db(&self) -> Result<Connection> {
        if !self.db_path.exists() {
            bail!(
                "no issue database at {}. Run `arbor init` first.",
                self.db_path.display()
            );
        }
        open_database(&self.db_path)
    }

    /// Look up an issue by its index in the selected repository.
    pub fn issue_by_index(&self, conn: &Connection, index: i64) -> Result<Issue> {
        issues::get_issue_by_index(conn, self.repo_id, index)?.with_context(|| {
            format!("issue #{index} not found in repository {}", self.repo_id)
        })
    }

    /// The actor for mutating commands.
    pub fn require_actor(&self) -> Result<&Actor> {
        match &self.actor {
            Some(actor) => Ok(actor),
            None => {
                render_error(
                    self.output,
                    &CliError::new("an actor is required for this command")
                        .with_hint("Pass --actor <name> or set ARBOR_ACTOR"),
                )?;
                bail!("missing actor")
            }
        }
    }

    /// Print `err` for the operator and turn it into the command's failure.
    pub fn fail(&self, err: HierarchyError) -> anyhow::Error {
        if let Err(render) = render_error(self.output, &CliError::from(&err)) {
            return render;
        }
        anyhow::Error::new(err)
    }
}
