//! Remote procedure interface of the workspace agent's project API.

use crate::error::Result;
use crate::types::{Estimate, ProjectDetails, ProjectReference, ResolutionCandidates, WorkspaceId};
use async_trait::async_trait;

/// Project operations served by a workspace agent.
///
/// Every call yields exactly one success or one failure. Implementations do
/// not retry. Paths passed to `details`, `estimate` and `resolve` are already
/// normalized (no leading separator).
#[async_trait]
pub trait ProjectService: Send + Sync {
    /// List the projects of a workspace
    async fn list(&self, workspace_id: &WorkspaceId) -> Result<Vec<ProjectReference>>;

    /// Import a project at `path`
    async fn import(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        body: &ProjectDetails,
    ) -> Result<ProjectDetails>;

    /// Create a project at `path`
    async fn create(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        body: &ProjectDetails,
    ) -> Result<ProjectDetails>;

    /// Fetch the full record of a project; `None` when the agent sends nothing
    async fn details(&self, workspace_id: &WorkspaceId, path: &str)
    -> Result<Option<ProjectDetails>>;

    /// Check a project against a candidate type
    async fn estimate(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        project_type: &str,
    ) -> Result<Option<Estimate>>;

    /// Suggest project types for an unclassified project
    async fn resolve(&self, workspace_id: &WorkspaceId, path: &str)
    -> Result<Option<ResolutionCandidates>>;

    /// Rename a project
    async fn rename(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        new_name: &str,
    ) -> Result<ProjectDetails>;

    /// Delete a project
    async fn remove(&self, workspace_id: &WorkspaceId, path: &str) -> Result<()>;

    /// Replace a project's configuration
    async fn update(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        body: &ProjectDetails,
    ) -> Result<ProjectDetails>;
}
