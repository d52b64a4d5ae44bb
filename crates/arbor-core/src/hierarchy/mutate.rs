//! Validate, commit and audit a parent change.
//!
//! [`HierarchyService::set_parent`] is the single entry point for callers.
//! It is split into [`HierarchyService::plan_parent_change`] (read-only) and
//! [`HierarchyService::apply_parent_change`] (transaction, caches, audit) so
//! the two halves can be driven separately.
//!
//! The pointer write is a compare-and-set against the parent the plan saw,
//! so a concurrent move surfaces as [`HierarchyError::ParentChanged`]. In
//! both validation modes the ancestors of the new parent are walked again
//! after the write, inside the transaction, so a cycle can never commit.
//! Only the depth and count limits are left to the optimistic race.
//!
//! Cancellation is polled at each [`Checkpoint`]. Before the transaction
//! opens and before commit it aborts with nothing written. After commit it
//! skips the audit and reports [`HierarchyError::Cancelled`] with
//! `committed: true`.

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::audit::AuditSink;
use super::validate::{self, ChangeKind, ParentChange};
use super::{HierarchyError, store};
use crate::cancel::{Cancellation, Checkpoint};
use crate::config::{ConfigHandle, HierarchyConfig};
use crate::db::comments::CommentAuditSink;
use crate::db::issues;
use crate::model::{Actor, Issue};
use crate::timing::timed;

/// How validation relates to the write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Validate outside the write; commit in a `DEFERRED` transaction.
    ///
    /// Two concurrent links under the same nearly full root can both pass
    /// validation and both commit, leaving the tree one issue over the
    /// count limit.
    Optimistic,
    /// Take the write lock up front (`IMMEDIATE`) and re-run the link checks
    /// against fresh rows before writing.
    Serialized,
}

impl ValidationMode {
    #[must_use]
    pub const fn from_config(config: &HierarchyConfig) -> Self {
        if config.revalidate_in_transaction {
            Self::Serialized
        } else {
            Self::Optimistic
        }
    }

    const fn behavior(self) -> TransactionBehavior {
        match self {
            Self::Optimistic => TransactionBehavior::Deferred,
            Self::Serialized => TransactionBehavior::Immediate,
        }
    }
}

/// What a successful [`HierarchyService::set_parent`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParentChangeOutcome {
    pub child_id: i64,
    pub old_parent_id: Option<i64>,
    pub new_parent_id: Option<i64>,
    pub kind: ChangeKind,
}

impl ParentChangeOutcome {
    /// `false` when the issue already had the requested parent.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.kind != ChangeKind::Unchanged
    }
}

/// Applies parent changes under the current limits and records them.
#[derive(Debug, Clone)]
pub struct HierarchyService<A = CommentAuditSink> {
    config: ConfigHandle,
    audit: A,
}

impl HierarchyService {
    /// Service that records timeline comments in the same database.
    #[must_use]
    pub fn new(config: ConfigHandle) -> Self {
        Self::with_audit(config, CommentAuditSink)
    }
}

impl<A: AuditSink> HierarchyService<A> {
    #[must_use]
    pub const fn with_audit(config: ConfigHandle, audit: A) -> Self {
        Self { config, audit }
    }

    #[must_use]
    pub const fn config(&self) -> &ConfigHandle {
        &self.config
    }

    #[must_use]
    pub const fn audit(&self) -> &A {
        &self.audit
    }

    /// Attach `child` under `new_parent`, or make it a root when `None`.
    ///
    /// On success the stored parent pointer, `child.parent_id` and both
    /// timelines reflect the change. Setting the parent an issue already has
    /// returns an outcome with [`ChangeKind::Unchanged`] and writes nothing.
    ///
    /// # Errors
    ///
    /// - [`HierarchyError::TooDeep`], [`HierarchyError::TooMany`],
    ///   [`HierarchyError::Circular`] or [`HierarchyError::CrossRepository`]
    ///   when the change is rejected. Nothing is written.
    /// - [`HierarchyError::Cancelled`] when `cancel` fires; see the module
    ///   docs for what has been written by then.
    /// - [`HierarchyError::Audit`] when the change committed but the
    ///   timeline entries could not be written.
    /// - [`HierarchyError::CorruptHierarchy`], [`HierarchyError::IssueNotFound`]
    ///   or [`HierarchyError::Store`] for storage problems.
    pub fn set_parent(
        &self,
        conn: &mut Connection,
        cancel: &impl Cancellation,
        child: &mut Issue,
        mut new_parent: Option<&mut Issue>,
        actor: &Actor,
    ) -> Result<ParentChangeOutcome, HierarchyError> {
        let plan = self.plan_parent_change(conn, child, new_parent.as_deref_mut())?;
        self.apply_parent_change(conn, cancel, &plan, child, new_parent, actor)
    }

    /// Validate a parent change under the current limits without writing.
    ///
    /// # Errors
    ///
    /// See [`HierarchyService::set_parent`].
    pub fn plan_parent_change(
        &self,
        conn: &Connection,
        child: &mut Issue,
        new_parent: Option<&mut Issue>,
    ) -> Result<ParentChange, HierarchyError> {
        let config = self.config.snapshot();
        timed("hierarchy.validate", || {
            validate::validate_parent_change(conn, &config, child, new_parent)
        })
        .inspect_err(|e| {
            if e.is_user_facing() {
                info!(child = child.id, error = %e, "parent change rejected");
            }
        })
    }

    /// Commit a planned change, refresh caches and record the audit trail.
    ///
    /// `child` and `new_parent` must be the issues the plan was made for.
    ///
    /// # Errors
    ///
    /// See [`HierarchyService::set_parent`].
    pub fn apply_parent_change(
        &self,
        conn: &mut Connection,
        cancel: &impl Cancellation,
        plan: &ParentChange,
        child: &mut Issue,
        mut new_parent: Option<&mut Issue>,
        actor: &Actor,
    ) -> Result<ParentChangeOutcome, HierarchyError> {
        debug_assert_eq!(plan.child_id, child.id);
        debug_assert_eq!(plan.new_parent_id, new_parent.as_ref().map(|p| p.id));

        let outcome = ParentChangeOutcome {
            child_id: plan.child_id,
            old_parent_id: plan.old_parent_id(),
            new_parent_id: plan.new_parent_id,
            kind: plan.kind(),
        };
        if !outcome.changed() {
            return Ok(outcome);
        }

        if cancel.should_stop(Checkpoint::BeforeWrite) {
            info!(child = child.id, "parent change cancelled before write");
            return Err(HierarchyError::Cancelled { committed: false });
        }

        let config = self.config.snapshot();
        let mode = ValidationMode::from_config(&config);
        timed("hierarchy.commit", || -> Result<(), HierarchyError> {
            let tx = conn.transaction_with_behavior(mode.behavior())?;

            if let (ValidationMode::Serialized, Some(parent_id)) = (mode, plan.new_parent_id) {
                let mut fresh_child = issues::get_issue_by_id(&tx, plan.child_id)?
                    .ok_or(HierarchyError::IssueNotFound(plan.child_id))?;
                let mut fresh_parent = issues::get_issue_by_id(&tx, parent_id)?
                    .ok_or(HierarchyError::IssueNotFound(parent_id))?;
                validate::validate_link(&tx, &config, &mut fresh_child, &mut fresh_parent)
                    .inspect_err(|e| {
                        warn!(child = plan.child_id, error = %e, "revalidation under write lock failed");
                    })?;
            }

            store::replace_parent(&tx, plan.child_id, plan.old_parent_id(), plan.new_parent_id)
                .inspect_err(|e| {
                    warn!(child = plan.child_id, error = %e, "parent pointer write rejected");
                })?;
            if let Some(parent_id) = plan.new_parent_id {
                validate::ensure_not_ancestor(&tx, plan.child_id, parent_id).inspect_err(|e| {
                    warn!(child = plan.child_id, error = %e, "link would close a cycle");
                })?;
            }

            if cancel.should_stop(Checkpoint::BeforeCommit) {
                info!(child = plan.child_id, "parent change cancelled before commit");
                return Err(HierarchyError::Cancelled { committed: false });
            }
            tx.commit()?;
            Ok(())
        })?;

        child.parent_id = plan.new_parent_id;
        child.invalidate_parent();
        if let Some(parent) = new_parent.as_deref_mut() {
            parent.invalidate_sub_issues();
        }
        debug!(child = child.id, "hierarchy caches invalidated");

        if cancel.should_stop(Checkpoint::BeforeAudit) {
            warn!(child = child.id, "parent change cancelled after commit; audit skipped");
            return Err(HierarchyError::Cancelled { committed: true });
        }

        timed("hierarchy.audit", || self.record(conn, actor, plan, child, new_parent.as_deref()))?;

        info!(
            child = outcome.child_id,
            old_parent = ?outcome.old_parent_id,
            new_parent = ?outcome.new_parent_id,
            kind = ?outcome.kind,
            actor = %actor.name,
            "sub-issue parent changed"
        );
        Ok(outcome)
    }

    fn record(
        &self,
        conn: &Connection,
        actor: &Actor,
        plan: &ParentChange,
        child: &Issue,
        new_parent: Option<&Issue>,
    ) -> Result<(), HierarchyError> {
        let failed = |source: anyhow::Error| {
            warn!(child = child.id, error = %source, "timeline audit failed after commit");
            HierarchyError::Audit { source }
        };

        if let Some(old) = &plan.old_parent {
            self.audit
                .record_sub_issue_unlinked(conn, actor, old, child)
                .map_err(failed)?;
        }
        if let Some(parent) = new_parent {
            self.audit
                .record_sub_issue_linked(conn, actor, parent, child)
                .map_err(failed)?;
        }
        Ok(())
    }
}
