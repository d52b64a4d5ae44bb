//! Canonical SQLite schema for the issue database.
//!
//! - `issues` holds one row per issue; `parent_id` encodes the child→parent
//!   edge of the sub-issue forest
//! - `issue_comments` holds timeline entries written by the audit sink

/// Migration v1: issue and timeline tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id INTEGER NOT NULL,
    idx INTEGER NOT NULL CHECK (idx > 0),
    title TEXT NOT NULL,
    parent_id INTEGER REFERENCES issues(id) ON DELETE SET NULL,
    created_unix INTEGER NOT NULL,
    UNIQUE (repo_id, idx),
    CHECK (parent_id IS NULL OR parent_id <> id)
);

CREATE TABLE IF NOT EXISTS issue_comments (
    comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN (
        'add_sub_issue',
        'remove_sub_issue',
        'add_parent_issue',
        'remove_parent_issue'
    )),
    poster_id INTEGER NOT NULL,
    poster_name TEXT NOT NULL,
    related_issue_id INTEGER NOT NULL,
    created_unix INTEGER NOT NULL
);
";

/// Migration v2: read-path indexes for child lookups and timelines.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_issues_parent_created
    ON issues(parent_id, created_unix, id);

CREATE INDEX IF NOT EXISTS idx_issue_comments_issue_created
    ON issue_comments(issue_id, created_unix, comment_id);
";

/// Indexes expected after all migrations.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_issues_parent_created",
    "idx_issue_comments_issue_created",
];
