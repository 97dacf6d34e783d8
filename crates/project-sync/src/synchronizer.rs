//! Project synchronizer: keeps the project cache of every tracked workspace
//! consistent with the workspace agent.
//!
//! # Flow
//!
//! - [`ProjectSynchronizer::on_workspaces_changed`] replaces the tracked set,
//!   seeds each workspace's listing from its static configuration and
//!   (re)subscribes to its event channel.
//! - Each subscription runs in its own task and refetches the project list
//!   when a root-level project is created, deleted or renamed.
//! - Listing refreshes never fail outward; a failed refresh keeps the last
//!   known listing. Write operations surface remote failures unchanged.
//!
//! # Example
//!
//! ```no_run
//! use project_sync::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> project_sync::Result<()> {
//! let service = Arc::new(HttpProjectService::new("http://localhost:8080/api")?);
//! let bus = Arc::new(BroadcastEventBus::default());
//! let synchronizer = ProjectSynchronizer::new(service, bus);
//!
//! synchronizer.on_workspaces_changed(vec![Workspace::new("workspace42", "dev")]);
//! synchronizer
//!     .fetch_projects_for_workspace_id(&"workspace42".into())
//!     .await;
//!
//! for project in synchronizer.all_projects() {
//!     println!("{} {}", project.name, project.path);
//! }
//! # Ok(())
//! # }
//! ```

use crate::bus::EventChannel;
use crate::cache::ProjectCache;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::events::{VfsEvent, VFS_TOPIC};
use crate::key::{normalize_project_path, EstimateKey, ProjectKey};
use crate::registry::WorkspaceRegistry;
use crate::remote::ProjectService;
use crate::types::{
    Estimate, ProjectDetails, ProjectReference, ResolutionCandidates, Workspace, WorkspaceId,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Behaviour switches of the synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Event channel topic carrying filesystem changes
    pub topic: String,

    /// Drop a workspace's cache entries when it leaves the tracked set
    pub purge_on_workspace_removal: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            topic: VFS_TOPIC.to_string(),
            purge_on_workspace_removal: false,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            topic: config.events.topic.clone(),
            purge_on_workspace_removal: config.cache.purge_on_workspace_removal,
        }
    }
}

/// Result of a listing refresh. A refresh never fails outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched listing was installed
    Updated,
    /// A newer request was applied first; this response was dropped
    Superseded,
    /// The agent answered "not modified"; the cache is unchanged
    NotModified,
    /// The call failed; the error was logged and the cache is unchanged
    Failed,
}

struct Inner {
    service: Arc<dyn ProjectService>,
    events: Arc<dyn EventChannel>,
    cache: ProjectCache,
    tracked: RwLock<Vec<Workspace>>,
    subscriptions: Mutex<HashMap<WorkspaceId, JoinHandle<()>>>,
    options: SyncOptions,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (_, handle) in self.subscriptions.get_mut().drain() {
            handle.abort();
        }
    }
}

/// Owner of all project state of all tracked workspaces.
///
/// Cloning is cheap; clones share the same cache and subscriptions.
#[derive(Clone)]
pub struct ProjectSynchronizer {
    inner: Arc<Inner>,
}

impl ProjectSynchronizer {
    pub fn new(service: Arc<dyn ProjectService>, events: Arc<dyn EventChannel>) -> Self {
        Self::with_options(service, events, SyncOptions::default())
    }

    pub fn with_options(
        service: Arc<dyn ProjectService>,
        events: Arc<dyn EventChannel>,
        options: SyncOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                service,
                events,
                cache: ProjectCache::new(),
                tracked: RwLock::new(Vec::new()),
                subscriptions: Mutex::new(HashMap::new()),
                options,
            }),
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.inner.options
    }

    // ========================================================================
    // Workspace tracking
    // ========================================================================

    /// Replace the tracked workspace set.
    ///
    /// Every workspace in `workspaces` gets a fresh event subscription (any
    /// previous one for the same id is torn down) and a listing seeded from
    /// its static configuration, so the listing is available as soon as this
    /// returns. Workspaces no longer present lose their subscription; their
    /// cache entries are purged only when `purge_on_workspace_removal` is set.
    ///
    /// Must be called within a Tokio runtime. Returns the number of tracked
    /// workspaces.
    pub fn on_workspaces_changed(&self, workspaces: Vec<Workspace>) -> usize {
        let workspaces = dedup_by_id(workspaces);
        let incoming: HashSet<&WorkspaceId> = workspaces.iter().map(|w| &w.id).collect();

        let dropped: Vec<WorkspaceId> = {
            let tracked = self.inner.tracked.read();
            tracked
                .iter()
                .filter(|workspace| !incoming.contains(&workspace.id))
                .map(|workspace| workspace.id.clone())
                .collect()
        };
        for workspace_id in &dropped {
            self.untrack(workspace_id);
        }

        for workspace in &workspaces {
            self.subscribe(&workspace.id);
            self.fetch_projects_for_workspace(workspace);
        }

        let count = workspaces.len();
        *self.inner.tracked.write() = workspaces;

        info!("Tracking {} workspaces ({} dropped)", count, dropped.len());
        count
    }

    /// Seed a workspace's listing from its static configuration.
    ///
    /// No remote call is made; each project is stamped with the workspace id
    /// and name.
    pub fn fetch_projects_for_workspace(&self, workspace: &Workspace) {
        let projects = workspace.project_references();
        debug!(
            "Seeding {} projects for workspace {}",
            projects.len(),
            workspace.id
        );
        self.inner.cache.seed(&workspace.id, projects);
    }

    /// Follow a registry: apply its current set now and every change after.
    ///
    /// The returned task ends when the registry is dropped or this
    /// synchronizer is.
    pub fn follow_registry(&self, registry: &dyn WorkspaceRegistry) -> JoinHandle<()> {
        let mut receiver = registry.watch();
        let initial = receiver.borrow_and_update().clone();
        self.on_workspaces_changed(initial);

        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let workspaces = receiver.borrow_and_update().clone();
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                Self { inner }.on_workspaces_changed(workspaces);
            }
            debug!("Stopped following workspace registry");
        })
    }

    pub fn tracked_workspaces(&self) -> Vec<Workspace> {
        self.inner.tracked.read().clone()
    }

    /// Number of live event subscriptions
    pub fn subscription_count(&self) -> usize {
        self.inner
            .subscriptions
            .lock()
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Tear down every subscription and forget the tracked set.
    ///
    /// Cached entries stay available to the query methods.
    pub fn shutdown(&self) {
        let handles: Vec<_> = self.inner.subscriptions.lock().drain().collect();
        for (workspace_id, handle) in handles {
            debug!("Unsubscribing from workspace {}", workspace_id);
            handle.abort();
        }
        self.inner.tracked.write().clear();
    }

    fn untrack(&self, workspace_id: &WorkspaceId) {
        if let Some(handle) = self.inner.subscriptions.lock().remove(workspace_id) {
            handle.abort();
        }
        if self.inner.options.purge_on_workspace_removal {
            self.inner.cache.purge_workspace(workspace_id);
        }
        debug!("Workspace {} is no longer tracked", workspace_id);
    }

    fn subscribe(&self, workspace_id: &WorkspaceId) {
        let receiver = match self
            .inner
            .events
            .subscribe(workspace_id, &self.inner.options.topic)
        {
            Ok(receiver) => receiver,
            Err(e) => {
                warn!(
                    workspace = %workspace_id,
                    error = %e,
                    "Failed to subscribe to workspace events"
                );
                return;
            }
        };

        let handle = tokio::spawn(watch_workspace(
            Arc::downgrade(&self.inner),
            workspace_id.clone(),
            receiver,
        ));

        let previous = self
            .inner
            .subscriptions
            .lock()
            .insert(workspace_id.clone(), handle);
        if let Some(previous) = previous {
            trace!("Replacing subscription of workspace {}", workspace_id);
            previous.abort();
        }
    }

    // ========================================================================
    // Listing refresh
    // ========================================================================

    /// Refresh a workspace's project list from the agent.
    ///
    /// On success the cached listing is replaced wholesale, unless a newer
    /// refresh was applied in the meantime. "Not modified" and failures leave
    /// the cache untouched; failures are logged, never returned.
    pub async fn fetch_projects_for_workspace_id(
        &self,
        workspace_id: &WorkspaceId,
    ) -> RefreshOutcome {
        let token = self.inner.cache.begin_refresh(workspace_id);

        match self.inner.service.list(workspace_id).await {
            Ok(projects) => {
                let projects = self.annotate(workspace_id, projects);
                if self.inner.cache.apply_listing(workspace_id, token, projects) {
                    debug!("Project list of workspace {} refreshed", workspace_id);
                    RefreshOutcome::Updated
                } else {
                    RefreshOutcome::Superseded
                }
            }
            Err(e) if e.is_not_modified() => {
                debug!("Project list of workspace {} not modified", workspace_id);
                RefreshOutcome::NotModified
            }
            Err(e) => {
                warn!(
                    workspace = %workspace_id,
                    error = %e,
                    "Failed to refresh project list, keeping cached list"
                );
                RefreshOutcome::Failed
            }
        }
    }

    /// Fill in the owning workspace on listed projects that lack it.
    fn annotate(
        &self,
        workspace_id: &WorkspaceId,
        mut projects: Vec<ProjectReference>,
    ) -> Vec<ProjectReference> {
        let workspace_name = self
            .inner
            .tracked
            .read()
            .iter()
            .find(|workspace| &workspace.id == workspace_id)
            .map(|workspace| workspace.config.name.clone());

        for project in &mut projects {
            if project.workspace_id.is_none() {
                project.workspace_id = Some(workspace_id.clone());
            }
            if project.workspace_name.is_none() {
                project.workspace_name = workspace_name.clone();
            }
        }
        projects
    }

    fn spawn_refresh(&self, workspace_id: &WorkspaceId) {
        let synchronizer = self.clone();
        let workspace_id = workspace_id.clone();
        tokio::spawn(async move {
            synchronizer.fetch_projects_for_workspace_id(&workspace_id).await;
        });
    }

    // ========================================================================
    // Write operations
    // ========================================================================

    /// Import a project, then refresh the listing in the background.
    ///
    /// A description is only accepted together with a project type, so it is
    /// dropped from an untyped body. The refresh starts once the import call
    /// has settled, whatever its outcome, and does not affect the result.
    pub async fn import_project(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        mut body: ProjectDetails,
    ) -> Result<ProjectDetails> {
        if !body.has_type() && body.description.is_some() {
            body.description = None;
        }
        let result = self.inner.service.import(workspace_id, path, &body).await;
        self.spawn_refresh(workspace_id);
        result
    }

    /// Create a project, then refresh the listing in the background.
    pub async fn create_project(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        body: &ProjectDetails,
    ) -> Result<ProjectDetails> {
        let result = self.inner.service.create(workspace_id, path, body).await;
        self.spawn_refresh(workspace_id);
        result
    }

    /// Update a project and wait for the listing refresh that follows.
    ///
    /// The workspace annotation is local bookkeeping and is not sent. The
    /// refresh only runs after a successful update.
    pub async fn update_project(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        details: &ProjectDetails,
    ) -> Result<ProjectDetails> {
        let mut body = details.clone();
        body.workspace_id = None;

        let updated = self.inner.service.update(workspace_id, path, &body).await?;
        self.fetch_projects_for_workspace_id(workspace_id).await;
        Ok(updated)
    }

    /// Update a cached details record in place, addressed by its workspace and name
    pub async fn update_project_details(&self, details: &ProjectDetails) -> Result<ProjectDetails> {
        let workspace_id = details.workspace_id.clone().ok_or_else(|| {
            SyncError::invalid_input(format!(
                "project '{}' carries no workspace id",
                details.name
            ))
        })?;
        self.update_project(&workspace_id, &details.name, details).await
    }

    pub async fn rename(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        new_name: &str,
    ) -> Result<ProjectDetails> {
        self.inner.service.rename(workspace_id, path, new_name).await
    }

    pub async fn remove(&self, workspace_id: &WorkspaceId, path: &str) -> Result<()> {
        self.inner.service.remove(workspace_id, path).await
    }

    // ========================================================================
    // Derived records
    // ========================================================================

    /// Fetch and cache the full record of a project.
    ///
    /// The record is stamped with `workspace_id` and cached under the path as
    /// given. An empty answer leaves the cache untouched and yields `None`.
    pub async fn fetch_project_details(
        &self,
        workspace_id: &WorkspaceId,
        project_path: &str,
    ) -> Result<Option<ProjectDetails>> {
        let normalized = normalize_project_path(project_path);
        let epoch = self.inner.cache.epoch(workspace_id);
        let details = self.inner.service.details(workspace_id, normalized).await?;

        match details {
            Some(mut details) if !details.is_empty() => {
                details.workspace_id = Some(workspace_id.clone());
                self.inner.cache.insert_details(
                    epoch,
                    ProjectKey::raw(workspace_id, project_path),
                    details.clone(),
                );
                Ok(Some(details))
            }
            _ => {
                debug!("Empty details for {}{}", workspace_id, project_path);
                Ok(None)
            }
        }
    }

    /// Fetch and cache the estimate of a project against `project_type`
    pub async fn fetch_estimate(
        &self,
        workspace_id: &WorkspaceId,
        project_path: &str,
        project_type: &str,
    ) -> Result<Option<Estimate>> {
        let normalized = normalize_project_path(project_path);
        let epoch = self.inner.cache.epoch(workspace_id);
        let estimate = self
            .inner
            .service
            .estimate(workspace_id, normalized, project_type)
            .await?;

        match estimate {
            Some(estimate) if !estimate.is_empty() => {
                self.inner.cache.insert_estimate(
                    epoch,
                    EstimateKey::new(workspace_id, normalized, project_type),
                    estimate.clone(),
                );
                Ok(Some(estimate))
            }
            _ => {
                debug!(
                    "Empty estimate for {}{} as {}",
                    workspace_id, project_path, project_type
                );
                Ok(None)
            }
        }
    }

    /// Fetch and cache the resolution candidates of a project
    pub async fn fetch_resolve(
        &self,
        workspace_id: &WorkspaceId,
        project_path: &str,
    ) -> Result<Option<ResolutionCandidates>> {
        let normalized = normalize_project_path(project_path);
        let epoch = self.inner.cache.epoch(workspace_id);
        let candidates = self.inner.service.resolve(workspace_id, normalized).await?;

        match candidates {
            Some(candidates) if !candidates.is_empty() => {
                self.inner.cache.insert_resolution(
                    epoch,
                    ProjectKey::raw(workspace_id, normalized),
                    candidates.clone(),
                );
                Ok(Some(candidates))
            }
            _ => {
                debug!("No resolution candidates for {}{}", workspace_id, project_path);
                Ok(None)
            }
        }
    }

    // ========================================================================
    // Queries (cache only, never remote)
    // ========================================================================

    /// Snapshot of the listing of every workspace
    pub fn get_projects_by_workspace_map(&self) -> HashMap<WorkspaceId, Vec<ProjectReference>> {
        self.inner.cache.projects_by_workspace()
    }

    pub fn get_projects(&self, workspace_id: &WorkspaceId) -> Option<Vec<ProjectReference>> {
        self.inner.cache.projects(workspace_id)
    }

    /// Projects across all workspaces, computed from the per-workspace listings
    pub fn all_projects(&self) -> Vec<ProjectReference> {
        self.inner.cache.all_projects()
    }

    pub fn get_project_details_by_key(
        &self,
        workspace_id: &WorkspaceId,
        project_path: &str,
    ) -> Option<ProjectDetails> {
        self.inner
            .cache
            .details(&ProjectKey::raw(workspace_id, project_path))
    }

    pub fn remove_project_details_by_key(
        &self,
        workspace_id: &WorkspaceId,
        project_path: &str,
    ) -> Option<ProjectDetails> {
        self.inner
            .cache
            .remove_details(&ProjectKey::raw(workspace_id, project_path))
    }

    pub fn get_estimate(
        &self,
        workspace_id: &WorkspaceId,
        project_path: &str,
        project_type: &str,
    ) -> Option<Estimate> {
        self.inner
            .cache
            .estimate(&EstimateKey::new(workspace_id, project_path, project_type))
    }

    pub fn get_resolve(
        &self,
        workspace_id: &WorkspaceId,
        project_path: &str,
    ) -> Option<ResolutionCandidates> {
        self.inner
            .cache
            .resolution(&ProjectKey::normalized(workspace_id, project_path))
    }
}

/// Keep one entry per workspace id, the last occurrence winning, in order of
/// first appearance
fn dedup_by_id(workspaces: Vec<Workspace>) -> Vec<Workspace> {
    let mut index: HashMap<WorkspaceId, usize> = HashMap::with_capacity(workspaces.len());
    let mut unique: Vec<Workspace> = Vec::with_capacity(workspaces.len());
    for workspace in workspaces {
        match index.get(&workspace.id) {
            Some(&slot) => unique[slot] = workspace,
            None => {
                index.insert(workspace.id.clone(), unique.len());
                unique.push(workspace);
            }
        }
    }
    unique
}

/// Subscription task of one workspace.
async fn watch_workspace(
    inner: Weak<Inner>,
    workspace_id: WorkspaceId,
    mut receiver: broadcast::Receiver<VfsEvent>,
) {
    loop {
        let refetch = match receiver.recv().await {
            Ok(event) => {
                let refetch = event.triggers_refetch(&workspace_id);
                trace!(
                    "Event {:?} {} on {}: refetch={}",
                    event.kind, event.path, workspace_id, refetch
                );
                refetch
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(
                    "Subscription of workspace {} missed {} events, refreshing",
                    workspace_id, missed
                );
                true
            }
            Err(RecvError::Closed) => {
                debug!("Event channel of workspace {} closed", workspace_id);
                break;
            }
        };

        if !refetch {
            continue;
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        ProjectSynchronizer { inner }.spawn_refresh(&workspace_id);
    }
}
