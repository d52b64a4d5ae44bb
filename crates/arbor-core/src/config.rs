use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Project-relative location of the hierarchy config file.
pub const PROJECT_CONFIG_PATH: &str = ".arbor/config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArborConfig {
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
}

/// Limits and policy applied when an issue is attached under a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Maximum number of parent edges between any issue and its root.
    #[serde(default = "default_max_depth")]
    pub max_sub_issues_depth: usize,
    /// Maximum number of descendants under a single root.
    #[serde(default = "default_max_count")]
    pub max_sub_issues: usize,
    /// Allow a parent that lives in a different repository than the child.
    #[serde(default)]
    pub allow_cross_repository: bool,
    /// Re-run validation inside an `IMMEDIATE` write transaction.
    ///
    /// Off by default: validation then reads outside the write transaction
    /// and two concurrent links under a nearly full root may both commit.
    #[serde(default)]
    pub revalidate_in_transaction: bool,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_sub_issues_depth: default_max_depth(),
            max_sub_issues: default_max_count(),
            allow_cross_repository: false,
            revalidate_in_transaction: false,
        }
    }
}

const fn default_max_depth() -> usize {
    10
}

const fn default_max_count() -> usize {
    100
}

/// Shared, hot-reloadable view of the hierarchy limits.
///
/// Readers take a snapshot per operation; nothing downstream keeps the
/// values across calls, so [`ConfigHandle::replace`] takes effect on the
/// next validation.
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<HierarchyConfig>>,
}

impl ConfigHandle {
    #[must_use]
    pub fn new(config: HierarchyConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Current limits.
    #[must_use]
    pub fn snapshot(&self) -> HierarchyConfig {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in new limits for subsequent operations.
    pub fn replace(&self, config: HierarchyConfig) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = config;
        tracing::debug!(
            max_depth = config.max_sub_issues_depth,
            max_count = config.max_sub_issues,
            "hierarchy config replaced"
        );
    }

    /// Reload limits from `path`, keeping defaults for a missing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    /// The previous limits stay in place in that case.
    pub fn reload_from(&self, path: &Path) -> Result<HierarchyConfig> {
        let config = load_config(path)?.hierarchy;
        self.replace(config);
        Ok(config)
    }
}

/// Load the config file at `path`, returning defaults when it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<ArborConfig> {
    if !path.exists() {
        return Ok(ArborConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ArborConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve which config file applies.
///
/// Precedence: explicit path, then `.arbor/config.toml` under
/// `project_root`, then `arbor/config.toml` in the user config dir.
/// Returns `None` when no candidate exists.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>, project_root: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let project = project_root.join(PROJECT_CONFIG_PATH);
    if project.exists() {
        return Some(project);
    }

    dirs::config_dir()
        .map(|dir| dir.join("arbor/config.toml"))
        .filter(|path| path.exists())
}
