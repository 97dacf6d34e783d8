//! Records exchanged with the workspace agent and kept in the project cache.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a workspace, stable for the lifetime of a workspace session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Create an ID from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkspaceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for WorkspaceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for WorkspaceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Summary record of a project, as listed for a workspace.
///
/// The path keeps its leading separator (`/name`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectReference {
    pub name: String,

    pub path: String,

    #[serde(rename = "type")]
    pub project_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Owning workspace, stamped when seeded from workspace configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,

    /// Display name of the owning workspace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,

    /// Fields the agent sends that this crate does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectReference {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = project_type.into();
        self
    }
}

/// Where a project's sources come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceStorage {
    #[serde(rename = "type")]
    pub source_type: String,

    pub location: String,

    pub parameters: BTreeMap<String, String>,
}

/// A problem the agent reports against a project configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectProblem {
    pub code: i32,
    pub message: String,
}

/// Full record for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectDetails {
    pub name: String,

    pub path: String,

    #[serde(rename = "type")]
    pub project_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceStorage>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<ProjectProblem>,

    /// Owning workspace; stamped on every record the cache stores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,

    /// Runner/builder configuration and anything else not modelled here
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectDetails {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True when the payload carries no project data at all (e.g. `{}`).
    ///
    /// The workspace annotation is not project data and is ignored.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.path.is_empty()
            && self.project_type.is_empty()
            && self.description.is_none()
            && self.mixins.is_empty()
            && self.attributes.is_empty()
            && self.source.is_none()
            && self.problems.is_empty()
            && self.extra.is_empty()
    }

    /// True when the record declares a project type
    pub fn has_type(&self) -> bool {
        !self.project_type.is_empty()
    }
}

/// Judgment of whether a project matches a candidate project type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Estimate {
    #[serde(rename = "type")]
    pub project_type: String,

    pub matched: bool,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Vec<String>>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub resolution: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Estimate {
    pub fn is_empty(&self) -> bool {
        self.project_type.is_empty()
            && !self.matched
            && self.attributes.is_empty()
            && self.resolution.is_empty()
            && self.extra.is_empty()
    }
}

/// One suggested project type configuration for an unclassified project.
pub type SourceEstimation = Estimate;

/// Ordered suggestions returned by the resolve call.
pub type ResolutionCandidates = Vec<SourceEstimation>;

/// Static configuration of a workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub name: String,

    pub projects: Vec<ProjectReference>,
}

/// A workspace as supplied by the workspace registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,

    #[serde(default)]
    pub config: WorkspaceConfig,
}

impl Workspace {
    pub fn new(id: impl Into<WorkspaceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config: WorkspaceConfig {
                name: name.into(),
                projects: Vec::new(),
            },
        }
    }

    pub fn with_project(mut self, project: ProjectReference) -> Self {
        self.config.projects.push(project);
        self
    }

    /// The pre-declared projects, each stamped with this workspace's id and name.
    pub fn project_references(&self) -> Vec<ProjectReference> {
        self.config
            .projects
            .iter()
            .cloned()
            .map(|mut project| {
                project.workspace_id = Some(self.id.clone());
                project.workspace_name = Some(self.config.name.clone());
                project
            })
            .collect()
    }
}
