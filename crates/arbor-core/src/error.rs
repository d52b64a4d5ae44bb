use std::fmt;

/// Machine-readable error codes for hierarchy operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    IssueNotFound,
    CircularHierarchy,
    HierarchyTooDeep,
    HierarchyTooMany,
    CrossRepository,
    ParentChanged,
    CorruptHierarchy,
    StoreFailure,
    AuditFailed,
    Cancelled,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::IssueNotFound => "E2001",
            Self::CircularHierarchy => "E2003",
            Self::HierarchyTooDeep => "E2006",
            Self::HierarchyTooMany => "E2007",
            Self::CrossRepository => "E2008",
            Self::ParentChanged => "E2009",
            Self::CorruptHierarchy => "E3003",
            Self::StoreFailure => "E5001",
            Self::AuditFailed => "E5003",
            Self::Cancelled => "E5004",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::IssueNotFound => "Issue not found",
            Self::CircularHierarchy => "Parent would create a cycle",
            Self::HierarchyTooDeep => "Sub-issue depth limit reached",
            Self::HierarchyTooMany => "Sub-issue count limit reached",
            Self::CrossRepository => "Parent issue is in another repository",
            Self::ParentChanged => "Parent changed since the request was validated",
            Self::CorruptHierarchy => "Corrupt issue hierarchy",
            Self::StoreFailure => "Issue store failure",
            Self::AuditFailed => "Audit comment could not be recorded",
            Self::Cancelled => "Operation cancelled",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .arbor/config.toml and retry."),
            Self::IssueNotFound => None,
            Self::CircularHierarchy => {
                Some("Pick a parent that is not the issue itself or one of its sub-issues.")
            }
            Self::HierarchyTooDeep => {
                Some("Attach the issue higher in the tree or raise max_sub_issues_depth.")
            }
            Self::HierarchyTooMany => {
                Some("Split the tree or raise max_sub_issues in the hierarchy config.")
            }
            Self::CrossRepository => {
                Some("Enable allow_cross_repository to link issues across repositories.")
            }
            Self::ParentChanged => Some("Reload the issue and retry the change."),
            Self::CorruptHierarchy => {
                Some("A parent cycle exists in stored data. Unlink one issue on the cycle.")
            }
            Self::StoreFailure => Some("Check the database file and retry."),
            Self::AuditFailed => {
                Some("The link was saved but its timeline entry is missing. Record it manually.")
            }
            Self::Cancelled => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
