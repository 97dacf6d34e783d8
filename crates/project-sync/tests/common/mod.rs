//! Shared fixtures for synchronizer integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use project_sync::bus::BroadcastEventBus;
use project_sync::{
    Estimate, ProjectDetails, ProjectReference, ProjectSynchronizer, ResolutionCandidates, Result,
    SyncError, SyncOptions, WorkspaceId,
};
use project_sync::remote::ProjectService;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// A call received by the fake agent
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List(WorkspaceId),
    Import(WorkspaceId, String, ProjectDetails),
    Create(WorkspaceId, String, ProjectDetails),
    Details(WorkspaceId, String),
    Estimate(WorkspaceId, String, String),
    Resolve(WorkspaceId, String),
    Rename(WorkspaceId, String, String),
    Remove(WorkspaceId, String),
    Update(WorkspaceId, String, ProjectDetails),
}

struct ListStep {
    result: Result<Vec<ProjectReference>>,
    gate: Option<oneshot::Receiver<()>>,
}

/// Scripted in-memory `ProjectService`.
///
/// Listing calls consume scripted steps first and fall back to the current
/// listing. Write calls fail with `write_failure` when it is set.
#[derive(Default)]
pub struct FakeProjectService {
    calls: Mutex<Vec<Call>>,
    list_steps: Mutex<VecDeque<ListStep>>,
    listing: Mutex<Vec<ProjectReference>>,
    details: Mutex<Option<ProjectDetails>>,
    details_gate: Mutex<Option<oneshot::Receiver<()>>>,
    estimate: Mutex<Option<Estimate>>,
    resolution: Mutex<Option<ResolutionCandidates>>,
    write_failure: Mutex<Option<u16>>,
}

impl FakeProjectService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_listing(&self, projects: Vec<ProjectReference>) {
        *self.listing.lock() = projects;
    }

    /// Answer the next listing call with `result`
    pub fn push_list_result(&self, result: Result<Vec<ProjectReference>>) {
        self.list_steps.lock().push_back(ListStep { result, gate: None });
    }

    /// Answer the next listing call with `result` once the returned sender fires
    pub fn push_gated_list_result(
        &self,
        result: Result<Vec<ProjectReference>>,
    ) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.list_steps.lock().push_back(ListStep {
            result,
            gate: Some(gate),
        });
        release
    }

    pub fn set_details(&self, details: Option<ProjectDetails>) {
        *self.details.lock() = details;
    }

    /// Hold the next details answer until the returned sender fires
    pub fn gate_details(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        *self.details_gate.lock() = Some(gate);
        release
    }

    pub fn set_estimate(&self, estimate: Option<Estimate>) {
        *self.estimate.lock() = estimate;
    }

    pub fn set_resolution(&self, resolution: Option<ResolutionCandidates>) {
        *self.resolution.lock() = resolution;
    }

    pub fn fail_writes_with(&self, status: u16) {
        *self.write_failure.lock() = Some(status);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn list_calls(&self, workspace_id: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::List(id) if id.as_str() == workspace_id))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn write_result(&self, details: ProjectDetails) -> Result<ProjectDetails> {
        match *self.write_failure.lock() {
            Some(status) => Err(SyncError::remote(status, "write rejected")),
            None => Ok(details),
        }
    }
}

#[async_trait]
impl ProjectService for FakeProjectService {
    async fn list(&self, workspace_id: &WorkspaceId) -> Result<Vec<ProjectReference>> {
        self.record(Call::List(workspace_id.clone()));
        let step = self.list_steps.lock().pop_front();
        let Some(ListStep { result, gate }) = step else {
            let listing = self.listing.lock().clone();
            return Ok(listing);
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }

    async fn import(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        body: &ProjectDetails,
    ) -> Result<ProjectDetails> {
        self.record(Call::Import(workspace_id.clone(), path.to_string(), body.clone()));
        self.write_result(body.clone())
    }

    async fn create(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        body: &ProjectDetails,
    ) -> Result<ProjectDetails> {
        self.record(Call::Create(workspace_id.clone(), path.to_string(), body.clone()));
        self.write_result(body.clone())
    }

    async fn details(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
    ) -> Result<Option<ProjectDetails>> {
        self.record(Call::Details(workspace_id.clone(), path.to_string()));
        let gate = self.details_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(self.details.lock().clone())
    }

    async fn estimate(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        project_type: &str,
    ) -> Result<Option<Estimate>> {
        self.record(Call::Estimate(
            workspace_id.clone(),
            path.to_string(),
            project_type.to_string(),
        ));
        Ok(self.estimate.lock().clone())
    }

    async fn resolve(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
    ) -> Result<Option<ResolutionCandidates>> {
        self.record(Call::Resolve(workspace_id.clone(), path.to_string()));
        Ok(self.resolution.lock().clone())
    }

    async fn rename(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        new_name: &str,
    ) -> Result<ProjectDetails> {
        self.record(Call::Rename(
            workspace_id.clone(),
            path.to_string(),
            new_name.to_string(),
        ));
        self.write_result(ProjectDetails::named(new_name))
    }

    async fn remove(&self, workspace_id: &WorkspaceId, path: &str) -> Result<()> {
        self.record(Call::Remove(workspace_id.clone(), path.to_string()));
        self.write_result(ProjectDetails::default()).map(|_| ())
    }

    async fn update(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        body: &ProjectDetails,
    ) -> Result<ProjectDetails> {
        self.record(Call::Update(workspace_id.clone(), path.to_string(), body.clone()));
        self.write_result(body.clone())
    }
}

/// Synchronizer wired to a fake agent and an in-process bus
pub struct Harness {
    pub service: Arc<FakeProjectService>,
    pub bus: Arc<BroadcastEventBus>,
    pub synchronizer: ProjectSynchronizer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(SyncOptions::default())
    }

    pub fn with_options(options: SyncOptions) -> Self {
        Self::with_bus(options, BroadcastEventBus::default())
    }

    pub fn with_bus(options: SyncOptions, bus: BroadcastEventBus) -> Self {
        let service = FakeProjectService::new();
        let bus = Arc::new(bus);
        let synchronizer = ProjectSynchronizer::with_options(service.clone(), bus.clone(), options);
        Self {
            service,
            bus,
            synchronizer,
        }
    }
}

/// Poll `condition` until it holds or a second has passed
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Give spawned tasks a chance to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub fn project(name: &str) -> ProjectReference {
    ProjectReference::new(name, format!("/{name}"))
}
