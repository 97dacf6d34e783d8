//! In-memory project cache.
//!
//! Listing writes are fenced per workspace: every refresh takes a token when
//! its request is issued, and a response is installed only if no newer
//! request has already been applied. The cache therefore reflects the last
//! request issued, not the last response to arrive.
//!
//! Per-project records are fenced by a workspace epoch that a purge bumps, so
//! a fetch that started before the purge cannot write its answer back.

use crate::key::{EstimateKey, ProjectKey};
use crate::types::{Estimate, ProjectDetails, ProjectReference, ResolutionCandidates, WorkspaceId};
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Request-time token of a listing refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshToken(u64);

impl RefreshToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Purge generation of a workspace, captured before a remote fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEpoch(u64);

#[derive(Debug, Default)]
struct Listing {
    /// Last token handed out
    issued: u64,
    /// Token of the installed listing
    applied: u64,
    projects: Option<Vec<ProjectReference>>,
}

/// Project listings, details, estimates and resolutions for all workspaces.
#[derive(Debug, Default)]
pub struct ProjectCache {
    listings: DashMap<WorkspaceId, Listing>,
    epochs: DashMap<WorkspaceId, u64>,
    details: DashMap<ProjectKey, ProjectDetails>,
    estimates: DashMap<EstimateKey, Estimate>,
    resolutions: DashMap<ProjectKey, ResolutionCandidates>,
}

impl ProjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------

    /// Take a token for a listing request about to be issued
    pub fn begin_refresh(&self, workspace_id: &WorkspaceId) -> RefreshToken {
        let mut listing = self.listings.entry(workspace_id.clone()).or_default();
        listing.issued += 1;
        RefreshToken(listing.issued)
    }

    /// Install a listing unless a newer request has already been applied.
    ///
    /// The previous listing is replaced as a whole. Returns whether the
    /// listing was installed.
    pub fn apply_listing(
        &self,
        workspace_id: &WorkspaceId,
        token: RefreshToken,
        projects: Vec<ProjectReference>,
    ) -> bool {
        let mut listing = self.listings.entry(workspace_id.clone()).or_default();
        if token.0 <= listing.applied {
            debug!(
                "Discarding listing for {} (token {} <= applied {})",
                workspace_id, token.0, listing.applied
            );
            return false;
        }
        listing.applied = token.0;
        listing.projects = Some(projects);
        true
    }

    /// Install a listing known at request time, such as static configuration
    pub fn seed(&self, workspace_id: &WorkspaceId, projects: Vec<ProjectReference>) {
        let token = self.begin_refresh(workspace_id);
        self.apply_listing(workspace_id, token, projects);
    }

    pub fn projects(&self, workspace_id: &WorkspaceId) -> Option<Vec<ProjectReference>> {
        self.listings
            .get(workspace_id)
            .and_then(|listing| listing.projects.clone())
    }

    /// Snapshot of every installed listing
    pub fn projects_by_workspace(&self) -> HashMap<WorkspaceId, Vec<ProjectReference>> {
        self.listings
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .projects
                    .clone()
                    .map(|projects| (entry.key().clone(), projects))
            })
            .collect()
    }

    /// All projects of all workspaces, grouped by workspace id in id order
    pub fn all_projects(&self) -> Vec<ProjectReference> {
        let mut by_workspace: Vec<_> = self.projects_by_workspace().into_iter().collect();
        by_workspace.sort_by(|a, b| a.0.cmp(&b.0));
        by_workspace
            .into_iter()
            .flat_map(|(_, projects)| projects)
            .collect()
    }

    // ------------------------------------------------------------------
    // Per-project records
    // ------------------------------------------------------------------

    /// Current purge generation of a workspace
    pub fn epoch(&self, workspace_id: &WorkspaceId) -> CacheEpoch {
        CacheEpoch(self.epochs.get(workspace_id).map_or(0, |epoch| *epoch))
    }

    /// Run `write` unless the workspace was purged since `epoch` was taken.
    ///
    /// The epoch entry stays locked during the write, so a purge cannot slip
    /// in between the check and the insert.
    fn write_if_current(
        &self,
        workspace_id: &WorkspaceId,
        epoch: CacheEpoch,
        write: impl FnOnce(),
    ) -> bool {
        let current = self.epochs.entry(workspace_id.clone()).or_default();
        if *current != epoch.0 {
            debug!(
                "Discarding record for purged workspace {} (epoch {} != {})",
                workspace_id, epoch.0, *current
            );
            return false;
        }
        write();
        true
    }

    /// Cache details fetched at `epoch`. Returns whether they were stored.
    pub fn insert_details(
        &self,
        epoch: CacheEpoch,
        key: ProjectKey,
        details: ProjectDetails,
    ) -> bool {
        trace!("Caching details for {:?}", key);
        let workspace_id = key.workspace_id.clone();
        self.write_if_current(&workspace_id, epoch, || {
            self.details.insert(key, details);
        })
    }

    pub fn details(&self, key: &ProjectKey) -> Option<ProjectDetails> {
        self.details.get(key).map(|entry| entry.clone())
    }

    pub fn remove_details(&self, key: &ProjectKey) -> Option<ProjectDetails> {
        self.details.remove(key).map(|(_, details)| details)
    }

    pub fn insert_estimate(
        &self,
        epoch: CacheEpoch,
        key: EstimateKey,
        estimate: Estimate,
    ) -> bool {
        let workspace_id = key.workspace_id.clone();
        self.write_if_current(&workspace_id, epoch, || {
            self.estimates.insert(key, estimate);
        })
    }

    pub fn estimate(&self, key: &EstimateKey) -> Option<Estimate> {
        self.estimates.get(key).map(|entry| entry.clone())
    }

    pub fn insert_resolution(
        &self,
        epoch: CacheEpoch,
        key: ProjectKey,
        candidates: ResolutionCandidates,
    ) -> bool {
        let workspace_id = key.workspace_id.clone();
        self.write_if_current(&workspace_id, epoch, || {
            self.resolutions.insert(key, candidates);
        })
    }

    pub fn resolution(&self, key: &ProjectKey) -> Option<ResolutionCandidates> {
        self.resolutions.get(key).map(|entry| entry.clone())
    }

    // ------------------------------------------------------------------
    // Eviction
    // ------------------------------------------------------------------

    /// Drop every entry of a workspace.
    ///
    /// Requests already in flight for it are invalidated too, listings and
    /// per-project records alike. Returns the number of entries removed.
    pub fn purge_workspace(&self, workspace_id: &WorkspaceId) -> usize {
        let mut removed = 0;

        // Held until the records are gone; writers take it before inserting
        let mut epoch = self.epochs.entry(workspace_id.clone()).or_default();
        *epoch += 1;

        if let Some(mut listing) = self.listings.get_mut(workspace_id) {
            listing.applied = listing.issued;
            if listing.projects.take().is_some() {
                removed += 1;
            }
        }

        let before = self.details.len();
        self.details.retain(|key, _| &key.workspace_id != workspace_id);
        removed += before - self.details.len();

        let before = self.estimates.len();
        self.estimates.retain(|key, _| &key.workspace_id != workspace_id);
        removed += before - self.estimates.len();

        let before = self.resolutions.len();
        self.resolutions.retain(|key, _| &key.workspace_id != workspace_id);
        removed += before - self.resolutions.len();
        drop(epoch);

        debug!("Purged {} cache entries for workspace {}", removed, workspace_id);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws(id: &str) -> WorkspaceId {
        WorkspaceId::from(id)
    }

    fn listing(names: &[&str]) -> Vec<ProjectReference> {
        names
            .iter()
            .map(|name| ProjectReference::new(*name, format!("/{name}")))
            .collect()
    }

    #[test]
    fn test_listing_replaced_wholesale() {
        let cache = ProjectCache::new();
        cache.seed(&ws("w1"), listing(&["a", "b"]));
        cache.seed(&ws("w1"), listing(&["c"]));

        assert_eq!(cache.projects(&ws("w1")), Some(listing(&["c"])));
    }

    #[test]
    fn test_older_request_loses() {
        let cache = ProjectCache::new();
        let first = cache.begin_refresh(&ws("w1"));
        let second = cache.begin_refresh(&ws("w1"));

        assert!(cache.apply_listing(&ws("w1"), second, listing(&["new"])));
        assert!(!cache.apply_listing(&ws("w1"), first, listing(&["old"])));
        assert_eq!(cache.projects(&ws("w1")), Some(listing(&["new"])));
    }

    #[test]
    fn test_in_order_responses_apply() {
        let cache = ProjectCache::new();
        let first = cache.begin_refresh(&ws("w1"));
        let second = cache.begin_refresh(&ws("w1"));

        assert!(cache.apply_listing(&ws("w1"), first, listing(&["old"])));
        assert!(cache.apply_listing(&ws("w1"), second, listing(&["new"])));
        assert_eq!(cache.projects(&ws("w1")), Some(listing(&["new"])));
    }

    #[test]
    fn test_tokens_are_per_workspace() {
        let cache = ProjectCache::new();
        let w1 = cache.begin_refresh(&ws("w1"));
        let _ = cache.begin_refresh(&ws("w2"));
        let _ = cache.begin_refresh(&ws("w2"));

        assert!(cache.apply_listing(&ws("w1"), w1, listing(&["a"])));
    }

    #[test]
    fn test_pending_refresh_is_not_a_listing() {
        let cache = ProjectCache::new();
        let _ = cache.begin_refresh(&ws("w1"));
        assert!(cache.projects(&ws("w1")).is_none());
        assert!(cache.projects_by_workspace().is_empty());
    }

    #[test]
    fn test_all_projects_is_derived() {
        let cache = ProjectCache::new();
        cache.seed(&ws("w2"), listing(&["c"]));
        cache.seed(&ws("w1"), listing(&["a", "b"]));

        let names: Vec<_> = cache.all_projects().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        cache.seed(&ws("w1"), Vec::new());
        let names: Vec<_> = cache.all_projects().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["c"]);
    }

    #[test]
    fn test_purge_workspace() {
        let cache = ProjectCache::new();
        cache.seed(&ws("w1"), listing(&["a"]));
        cache.seed(&ws("w2"), listing(&["b"]));
        let w1 = cache.epoch(&ws("w1"));
        cache.insert_details(w1, ProjectKey::raw(&ws("w1"), "/a"), ProjectDetails::named("a"));
        cache.insert_details(
            cache.epoch(&ws("w2")),
            ProjectKey::raw(&ws("w2"), "/b"),
            ProjectDetails::named("b"),
        );
        cache.insert_estimate(w1, EstimateKey::new(&ws("w1"), "/a", "maven"), Estimate::default());
        cache.insert_resolution(w1, ProjectKey::normalized(&ws("w1"), "/a"), Vec::new());

        let in_flight = cache.begin_refresh(&ws("w1"));
        assert_eq!(cache.purge_workspace(&ws("w1")), 4);

        assert!(cache.projects(&ws("w1")).is_none());
        assert!(cache.details(&ProjectKey::raw(&ws("w1"), "/a")).is_none());
        assert!(cache.details(&ProjectKey::raw(&ws("w2"), "/b")).is_some());
        assert_eq!(cache.projects(&ws("w2")), Some(listing(&["b"])));

        // A response to a request issued before the purge must not resurrect it
        assert!(!cache.apply_listing(&ws("w1"), in_flight, listing(&["stale"])));
        assert!(cache.projects(&ws("w1")).is_none());
    }

    #[test]
    fn test_remove_details() {
        let cache = ProjectCache::new();
        let key = ProjectKey::raw(&ws("w1"), "/a");
        cache.insert_details(cache.epoch(&ws("w1")), key.clone(), ProjectDetails::named("a"));
        assert_eq!(cache.remove_details(&key).map(|d| d.name), Some("a".to_string()));
        assert!(cache.details(&key).is_none());
    }

    #[test]
    fn test_purge_fences_records_fetched_before_it() {
        let cache = ProjectCache::new();
        let before = cache.epoch(&ws("w1"));
        cache.purge_workspace(&ws("w1"));

        let details_key = ProjectKey::raw(&ws("w1"), "/a");
        let estimate_key = EstimateKey::new(&ws("w1"), "/a", "maven");
        let resolution_key = ProjectKey::normalized(&ws("w1"), "/a");
        assert!(!cache.insert_details(before, details_key.clone(), ProjectDetails::named("a")));
        assert!(!cache.insert_estimate(before, estimate_key.clone(), Estimate::default()));
        assert!(!cache.insert_resolution(before, resolution_key.clone(), Vec::new()));
        assert!(cache.details(&details_key).is_none());
        assert!(cache.estimate(&estimate_key).is_none());
        assert!(cache.resolution(&resolution_key).is_none());

        let after = cache.epoch(&ws("w1"));
        assert!(cache.insert_details(after, details_key.clone(), ProjectDetails::named("a")));
        assert!(cache.details(&details_key).is_some());
    }

    #[test]
    fn test_purge_leaves_other_epochs_alone() {
        let cache = ProjectCache::new();
        let w2 = cache.epoch(&ws("w2"));
        cache.purge_workspace(&ws("w1"));

        assert_eq!(cache.epoch(&ws("w2")), w2);
        let key = ProjectKey::raw(&ws("w2"), "/b");
        assert!(cache.insert_details(w2, key, ProjectDetails::named("b")));
    }
}
