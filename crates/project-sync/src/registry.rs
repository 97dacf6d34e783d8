//! Source of the active workspace set.

use crate::types::{Workspace, WorkspaceId};
use tokio::sync::watch;
use tracing::debug;

/// Supplies the active workspaces and notifies when the set changes.
pub trait WorkspaceRegistry: Send + Sync {
    /// Current active workspaces
    fn active_workspaces(&self) -> Vec<Workspace>;

    /// Receiver that is marked changed whenever the set is replaced
    fn watch(&self) -> watch::Receiver<Vec<Workspace>>;
}

/// Registry holding an explicitly managed workspace list.
#[derive(Debug)]
pub struct StaticWorkspaceRegistry {
    sender: watch::Sender<Vec<Workspace>>,
}

impl StaticWorkspaceRegistry {
    pub fn new(workspaces: Vec<Workspace>) -> Self {
        let (sender, _) = watch::channel(workspaces);
        Self { sender }
    }

    /// Replace the whole set
    pub fn replace(&self, workspaces: Vec<Workspace>) {
        debug!("Workspace registry replaced with {} workspaces", workspaces.len());
        self.sender.send_replace(workspaces);
    }

    /// Add a workspace, or replace the one with the same id
    pub fn upsert(&self, workspace: Workspace) {
        self.sender.send_modify(|workspaces| {
            match workspaces.iter_mut().find(|existing| existing.id == workspace.id) {
                Some(existing) => *existing = workspace,
                None => workspaces.push(workspace),
            }
        });
    }

    /// Remove a workspace; returns whether it was present
    pub fn remove(&self, workspace_id: &WorkspaceId) -> bool {
        self.sender.send_if_modified(|workspaces| {
            let before = workspaces.len();
            workspaces.retain(|workspace| &workspace.id != workspace_id);
            workspaces.len() != before
        })
    }
}

impl Default for StaticWorkspaceRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl WorkspaceRegistry for StaticWorkspaceRegistry {
    fn active_workspaces(&self) -> Vec<Workspace> {
        self.sender.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Vec<Workspace>> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_and_remove() {
        let registry = StaticWorkspaceRegistry::default();
        registry.upsert(Workspace::new("w1", "first"));
        registry.upsert(Workspace::new("w2", "second"));
        registry.upsert(Workspace::new("w1", "renamed"));

        let workspaces = registry.active_workspaces();
        assert_eq!(workspaces.len(), 2);
        assert_eq!(workspaces[0].config.name, "renamed");

        assert!(registry.remove(&"w2".into()));
        assert!(!registry.remove(&"w2".into()));
        assert_eq!(registry.active_workspaces().len(), 1);
    }

    #[tokio::test]
    async fn test_watch_sees_changes() {
        let registry = StaticWorkspaceRegistry::new(vec![Workspace::new("w1", "dev")]);
        let mut receiver = registry.watch();

        registry.replace(vec![Workspace::new("w2", "ops")]);
        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update()[0].id, WorkspaceId::from("w2"));
    }

    #[test]
    fn test_noop_remove_does_not_notify() {
        let registry = StaticWorkspaceRegistry::new(vec![Workspace::new("w1", "dev")]);
        let receiver = registry.watch();
        registry.remove(&"missing".into());
        assert!(!receiver.has_changed().unwrap());
    }
}
