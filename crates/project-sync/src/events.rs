//! Change notifications pushed by a workspace's event channel.

use crate::key::separator_count;
use crate::types::WorkspaceId;
use serde::{Deserialize, Serialize};

/// Topic the workspace agent publishes filesystem changes on.
pub const VFS_TOPIC: &str = "vfs";

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Created,
    ContentUpdated,
    Moved,
    Renamed,
    Deleted,
    /// Any kind this crate does not know about
    #[serde(other)]
    Unknown,
}

impl ChangeKind {
    /// Kinds that can change the set of projects in a workspace.
    pub fn alters_project_set(self) -> bool {
        matches!(self, Self::Created | Self::Deleted | Self::Renamed)
    }
}

/// A filesystem change in a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VfsEvent {
    pub workspace_id: WorkspaceId,

    #[serde(rename = "type")]
    pub kind: ChangeKind,

    pub path: String,
}

impl VfsEvent {
    pub fn new(
        workspace_id: impl Into<WorkspaceId>,
        kind: ChangeKind,
        path: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            kind,
            path: path.into(),
        }
    }

    /// Whether the change happened directly under the workspace root.
    pub fn is_root_level(&self) -> bool {
        separator_count(&self.path) == 1
    }

    /// Whether a subscription for `subscribed` should refetch the project list.
    ///
    /// Nested-file churn is ignored; only root-level creations, deletions and
    /// renames in the subscribed workspace count.
    pub fn triggers_refetch(&self, subscribed: &WorkspaceId) -> bool {
        &self.workspace_id == subscribed && self.kind.alters_project_set() && self.is_root_level()
    }
}
