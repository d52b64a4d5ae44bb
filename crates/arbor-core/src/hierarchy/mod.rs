//! Parent/sub-issue relationships.
//!
//! Each issue has at most one parent, so issues form a forest. Changes are
//! validated against configurable depth and size limits, then written in a
//! single transaction, then recorded on both issues' timelines.
//!
//! ## Submodules
//!
//! - [`store`]: reads and writes of the parent pointer, plus the memoized
//!   [`Issue::load_parent`](crate::model::Issue::load_parent) and
//!   [`Issue::load_sub_issues`](crate::model::Issue::load_sub_issues).
//! - [`validate`]: root lookup, descendant counting and the link checks.
//! - [`mutate`]: [`HierarchyService`], which validates, commits and audits.
//! - [`audit`]: the [`AuditSink`] seam for timeline entries.

pub mod audit;
pub mod error;
pub mod mutate;
pub mod store;
pub mod validate;

pub use audit::AuditSink;
pub use error::HierarchyError;
pub use mutate::{HierarchyService, ParentChangeOutcome, ValidationMode};
pub use validate::{
    ChangeKind, ParentChange, RootLookup, SubtreeStats, ancestors, count_descendants,
    ensure_not_ancestor, lookup_root, subtree_stats,
};
