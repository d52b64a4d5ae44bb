use crate::error::ErrorCode;

/// Errors from hierarchy reads, validation and mutation.
///
/// `TooDeep`, `TooMany`, `Circular`, `CrossRepository` and `ParentChanged`
/// are expected rejections: nothing was written and the caller may retry
/// with other input or fresh state. `Audit` and `Cancelled { committed: true }` are reported after
/// the new parent pointer was already committed.
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    /// Attaching would push some issue past the configured depth limit.
    #[error("sub-issues depth has reached limit [id: {child}, parent: {parent}, root: {root}]")]
    TooDeep { child: i64, parent: i64, root: i64 },

    /// Attaching would push the root's subtree past the configured size limit.
    #[error("sub-issues count has reached limit [id: {child}, parent: {parent}, root: {root}]")]
    TooMany { child: i64, parent: i64, root: i64 },

    /// The proposed parent is the child itself or one of its descendants.
    #[error("circular parent issues [id: {child}, parent: {parent}]")]
    Circular { child: i64, parent: i64 },

    /// The parent belongs to another repository and cross-repository links
    /// are disabled.
    #[error("parent issue is in another repository [id: {child}, parent: {parent}]")]
    CrossRepository { child: i64, parent: i64 },

    /// The stored parent no longer matches the one the change was planned
    /// against; another writer moved the issue first.
    #[error(
        "parent of issue changed concurrently [id: {child}, expected: {expected:?}, found: {found:?}]"
    )]
    ParentChanged {
        child: i64,
        expected: Option<i64>,
        found: Option<i64>,
    },

    /// A parent cycle was found in stored data.
    #[error("corrupt issue hierarchy: issue {issue_id} reached twice while walking the tree")]
    CorruptHierarchy { issue_id: i64 },

    /// An issue referenced by ID does not exist.
    #[error("issue not found: {0}")]
    IssueNotFound(i64),

    /// The caller cancelled the operation.
    #[error("parent change cancelled [committed: {committed}]")]
    Cancelled { committed: bool },

    /// The parent pointer was committed but the timeline entry failed.
    #[error("parent change committed but audit comment failed: {source:#}")]
    Audit {
        #[source]
        source: anyhow::Error,
    },

    /// An underlying database error.
    #[error("store error: {0:#}")]
    Store(#[source] anyhow::Error),
}

impl HierarchyError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::TooDeep { .. } => ErrorCode::HierarchyTooDeep,
            Self::TooMany { .. } => ErrorCode::HierarchyTooMany,
            Self::Circular { .. } => ErrorCode::CircularHierarchy,
            Self::CrossRepository { .. } => ErrorCode::CrossRepository,
            Self::ParentChanged { .. } => ErrorCode::ParentChanged,
            Self::CorruptHierarchy { .. } => ErrorCode::CorruptHierarchy,
            Self::IssueNotFound(_) => ErrorCode::IssueNotFound,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
            Self::Audit { .. } => ErrorCode::AuditFailed,
            Self::Store(_) => ErrorCode::StoreFailure,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Returns `true` for rejections that are meant to be shown to the
    /// end user verbatim.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::TooDeep { .. }
                | Self::TooMany { .. }
                | Self::Circular { .. }
                | Self::CrossRepository { .. }
                | Self::ParentChanged { .. }
        )
    }

    /// Returns `true` when the parent pointer change is already durable.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(
            self,
            Self::Audit { .. } | Self::Cancelled { committed: true }
        )
    }
}

impl From<anyhow::Error> for HierarchyError {
    fn from(e: anyhow::Error) -> Self {
        Self::Store(e)
    }
}

impl From<rusqlite::Error> for HierarchyError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.into())
    }
}
