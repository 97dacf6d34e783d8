//! Client-side project synchronization for remote development workspaces.
//!
//! This crate keeps a local view of the projects of every open workspace in
//! sync with the workspace agent. Listings, details, type estimates and
//! resolution candidates are cached per workspace, and refreshed when the
//! workspace's event channel reports root-level project changes.

pub mod bus;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod key;
pub mod logging;
pub mod registry;
pub mod remote;
pub mod synchronizer;
pub mod types;

pub use error::{Result, SyncError};
pub use synchronizer::{ProjectSynchronizer, RefreshOutcome, SyncOptions};
pub use types::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bus::{BroadcastEventBus, EventChannel};
    pub use crate::config::SyncConfig;
    pub use crate::error::{Result, SyncError};
    pub use crate::events::{ChangeKind, VfsEvent};
    pub use crate::http::HttpProjectService;
    pub use crate::registry::{StaticWorkspaceRegistry, WorkspaceRegistry};
    pub use crate::remote::ProjectService;
    pub use crate::synchronizer::{ProjectSynchronizer, RefreshOutcome, SyncOptions};
    pub use crate::types::*;
}
