//! Audit trail hook for sub-issue link changes.
//!
//! The mutator calls the sink after the parent pointer has been committed:
//! once for the old parent (unlink) and once for the new parent (link).
//! A sink error is surfaced to the caller but does not undo the change.

use anyhow::Result;
use rusqlite::Connection;

use crate::model::{Actor, Issue};

/// Records timeline entries for link/unlink events.
pub trait AuditSink {
    /// `child` was attached under `parent` by `actor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be recorded.
    fn record_sub_issue_linked(
        &self,
        conn: &Connection,
        actor: &Actor,
        parent: &Issue,
        child: &Issue,
    ) -> Result<()>;

    /// `child` was detached from `parent` by `actor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be recorded.
    fn record_sub_issue_unlinked(
        &self,
        conn: &Connection,
        actor: &Actor,
        parent: &Issue,
        child: &Issue,
    ) -> Result<()>;
}

impl<T: AuditSink + ?Sized> AuditSink for &T {
    fn record_sub_issue_linked(
        &self,
        conn: &Connection,
        actor: &Actor,
        parent: &Issue,
        child: &Issue,
    ) -> Result<()> {
        (**self).record_sub_issue_linked(conn, actor, parent, child)
    }

    fn record_sub_issue_unlinked(
        &self,
        conn: &Connection,
        actor: &Actor,
        parent: &Issue,
        child: &Issue,
    ) -> Result<()> {
        (**self).record_sub_issue_unlinked(conn, actor, parent, child)
    }
}
