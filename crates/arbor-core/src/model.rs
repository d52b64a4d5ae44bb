//! Issue and actor types shared by the store, validator and mutator.
//!
//! An [`Issue`] carries its persisted columns plus two per-instance caches:
//! the resolved parent and the resolved direct sub-issues. Each cache is a
//! [`Cached`] value that is either loaded or empty; staleness is never
//! inferred by comparing IDs. The mutator clears the caches it affects
//! with [`Issue::invalidate_parent`] / [`Issue::invalidate_sub_issues`].

use serde::Serialize;

/// A memoized value that is either loaded or not.
#[derive(Debug, Clone)]
pub struct Cached<T>(Option<T>);

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> Cached<T> {
    /// Returns `true` when a value is memoized.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.0.is_some()
    }

    #[must_use]
    pub const fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    /// Store `value`, replacing anything memoized.
    pub fn set(&mut self, value: T) -> &mut T {
        self.0.insert(value)
    }

    /// Drop the memoized value, returning it.
    pub fn invalidate(&mut self) -> Option<T> {
        self.0.take()
    }

    /// Return the memoized value, loading it with `load` first if empty.
    ///
    /// # Errors
    ///
    /// Propagates the error from `load`; the cache stays empty.
    pub fn get_or_try_load<E>(&mut self, load: impl FnOnce() -> Result<T, E>) -> Result<&mut T, E> {
        let value = match self.0.take() {
            Some(value) => value,
            None => load()?,
        };
        Ok(self.0.insert(value))
    }
}

/// An issue row as seen by the hierarchy engine.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    /// Process-wide unique ID.
    pub id: i64,
    pub repo_id: i64,
    /// Per-repository issue number.
    pub index: i64,
    pub title: String,
    pub parent_id: Option<i64>,
    pub created_unix: i64,
    #[serde(skip)]
    pub(crate) parent: Cached<Box<Issue>>,
    #[serde(skip)]
    pub(crate) sub_issues: Cached<Vec<Issue>>,
}

impl Issue {
    #[must_use]
    pub fn new(
        id: i64,
        repo_id: i64,
        index: i64,
        title: impl Into<String>,
        parent_id: Option<i64>,
        created_unix: i64,
    ) -> Self {
        Self {
            id,
            repo_id,
            index,
            title: title.into(),
            parent_id,
            created_unix,
            parent: Cached::default(),
            sub_issues: Cached::default(),
        }
    }

    /// Returns `true` when the issue has no parent.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// The memoized parent, if it has been loaded.
    #[must_use]
    pub fn cached_parent(&self) -> Option<&Self> {
        self.parent.get().map(AsRef::as_ref)
    }

    /// The memoized direct sub-issues, if they have been loaded.
    #[must_use]
    pub fn cached_sub_issues(&self) -> Option<&[Self]> {
        self.sub_issues.get().map(Vec::as_slice)
    }

    #[must_use]
    pub const fn is_parent_loaded(&self) -> bool {
        self.parent.is_loaded()
    }

    #[must_use]
    pub const fn is_sub_issues_loaded(&self) -> bool {
        self.sub_issues.is_loaded()
    }

    /// Forget the resolved parent; the next load reads the store again.
    pub fn invalidate_parent(&mut self) {
        self.parent.invalidate();
    }

    /// Forget the resolved sub-issues; the next load reads the store again.
    pub fn invalidate_sub_issues(&mut self) {
        self.sub_issues.invalidate();
    }

    /// Copy of the persisted columns without any cached relations.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self::new(
            self.id,
            self.repo_id,
            self.index,
            self.title.clone(),
            self.parent_id,
            self.created_unix,
        )
    }
}

/// Two issues are equal when their persisted columns are equal.
impl PartialEq for Issue {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.repo_id == other.repo_id
            && self.index == other.index
            && self.title == other.title
            && self.parent_id == other.parent_id
            && self.created_unix == other.created_unix
    }
}

impl Eq for Issue {}

/// Fields needed to insert a new issue row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub repo_id: i64,
    pub title: String,
    pub created_unix: i64,
}

impl NewIssue {
    /// A new issue stamped with the current time.
    #[must_use]
    pub fn new(repo_id: i64, title: impl Into<String>) -> Self {
        Self {
            repo_id,
            title: title.into(),
            created_unix: chrono::Utc::now().timestamp(),
        }
    }

    #[must_use]
    pub const fn created_at(mut self, created_unix: i64) -> Self {
        self.created_unix = created_unix;
        self
    }
}

/// The user a relationship change is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: i64,
    pub name: String,
}

impl Actor {
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
