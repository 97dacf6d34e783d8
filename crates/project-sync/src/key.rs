//! Cache keys and project path normalization.
//!
//! Keys hold their identifying fields separately, so `("ab", "c")` and
//! `("a", "bc")` are different keys even though their concatenations match.

use crate::types::WorkspaceId;

/// Path separator used by the workspace agent.
pub const PATH_SEPARATOR: char = '/';

/// Strip a single leading separator from a project path.
///
/// `"/console"` becomes `"console"`; paths without a leading separator are
/// returned unchanged.
pub fn normalize_project_path(path: &str) -> &str {
    path.strip_prefix(PATH_SEPARATOR).unwrap_or(path)
}

/// Number of separators in a path; a root-level entry has exactly one.
pub fn separator_count(path: &str) -> usize {
    path.matches(PATH_SEPARATOR).count()
}

/// Key of a per-project record (details, resolution candidates).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectKey {
    pub workspace_id: WorkspaceId,
    pub path: String,
}

impl ProjectKey {
    /// Key on the path exactly as given.
    pub fn raw(workspace_id: &WorkspaceId, path: &str) -> Self {
        Self {
            workspace_id: workspace_id.clone(),
            path: path.to_string(),
        }
    }

    /// Key on the normalized path.
    pub fn normalized(workspace_id: &WorkspaceId, path: &str) -> Self {
        Self::raw(workspace_id, normalize_project_path(path))
    }
}

/// Key of an estimate: a project checked against one project type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EstimateKey {
    pub workspace_id: WorkspaceId,
    pub path: String,
    pub project_type: String,
}

impl EstimateKey {
    pub fn new(workspace_id: &WorkspaceId, path: &str, project_type: &str) -> Self {
        Self {
            workspace_id: workspace_id.clone(),
            path: normalize_project_path(path).to_string(),
            project_type: project_type.to_string(),
        }
    }
}
