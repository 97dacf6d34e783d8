//! HTTP client for the workspace agent's project REST API.
//!
//! Routes live under `{base_url}/project/{workspaceId}`. The client issues one
//! request per call and never retries; retry and reconnection policy belong
//! to the caller.

use crate::config::AgentConfig;
use crate::error::{Result, SyncError};
use crate::remote::ProjectService;
use crate::types::{Estimate, ProjectDetails, ProjectReference, ResolutionCandidates, WorkspaceId};
use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// `ProjectService` backed by the workspace agent REST API
#[derive(Debug, Clone)]
pub struct HttpProjectService {
    /// Base URL of the agent API, e.g. `http://localhost:8080/api`
    base_url: Url,

    /// HTTP client with connection pooling
    client: reqwest::Client,
}

impl HttpProjectService {
    /// Create a client with default timeouts
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(&AgentConfig {
            base_url: base_url.to_string(),
            ..AgentConfig::default()
        })
    }

    /// Create a client from the agent section of the configuration
    pub fn with_config(config: &AgentConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            SyncError::config(format!("Invalid agent URL '{}': {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::config(format!(
                "Agent URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/project/{workspace}/{route...}/{path segments...}`
    fn project_url(
        &self,
        workspace_id: &WorkspaceId,
        route: Option<&str>,
        path: Option<&str>,
    ) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SyncError::config("Agent URL cannot carry a path"))?;
            segments.pop_if_empty();
            segments.push("project");
            segments.push(workspace_id.as_str());
            if let Some(route) = route {
                segments.push(route);
            }
            if let Some(path) = path {
                segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
            }
        }
        Ok(url)
    }
}

/// Map the response status onto the error taxonomy.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::NOT_MODIFIED {
        return Err(SyncError::NotModified);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(SyncError::remote(status.as_u16(), message));
    }
    Ok(response)
}

/// Decode a JSON body; an empty body or `null` is `None`.
async fn decode_optional<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
    let response = ensure_success(response).await?;
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let body = response.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(serde_json::from_slice::<Option<T>>(&body)?)
}

/// Decode a JSON body, falling back to the default value when it is empty.
async fn decode<T: DeserializeOwned + Default>(response: Response) -> Result<T> {
    Ok(decode_optional(response).await?.unwrap_or_default())
}

#[async_trait]
impl ProjectService for HttpProjectService {
    #[instrument(skip(self), fields(workspace = %workspace_id))]
    async fn list(&self, workspace_id: &WorkspaceId) -> Result<Vec<ProjectReference>> {
        let url = self.project_url(workspace_id, None, None)?;
        debug!("Listing projects: {}", url);
        let response = self.client.get(url).send().await?;
        decode(response).await
    }

    #[instrument(skip(self, body), fields(workspace = %workspace_id))]
    async fn import(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        body: &ProjectDetails,
    ) -> Result<ProjectDetails> {
        let url = self.project_url(workspace_id, Some("import"), Some(path))?;
        let response = self.client.post(url).json(body).send().await?;
        decode(response).await
    }

    #[instrument(skip(self, body), fields(workspace = %workspace_id))]
    async fn create(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        body: &ProjectDetails,
    ) -> Result<ProjectDetails> {
        let mut url = self.project_url(workspace_id, None, None)?;
        url.query_pairs_mut().append_pair("name", path);
        let response = self.client.post(url).json(body).send().await?;
        decode(response).await
    }

    #[instrument(skip(self), fields(workspace = %workspace_id))]
    async fn details(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
    ) -> Result<Option<ProjectDetails>> {
        let url = self.project_url(workspace_id, None, Some(path))?;
        let response = self.client.get(url).send().await?;
        decode_optional(response).await
    }

    #[instrument(skip(self), fields(workspace = %workspace_id))]
    async fn estimate(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        project_type: &str,
    ) -> Result<Option<Estimate>> {
        let mut url = self.project_url(workspace_id, Some("estimate"), Some(path))?;
        url.query_pairs_mut().append_pair("type", project_type);
        let response = self.client.get(url).send().await?;
        decode_optional(response).await
    }

    #[instrument(skip(self), fields(workspace = %workspace_id))]
    async fn resolve(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
    ) -> Result<Option<ResolutionCandidates>> {
        let url = self.project_url(workspace_id, Some("resolve"), Some(path))?;
        let response = self.client.get(url).send().await?;
        decode_optional(response).await
    }

    #[instrument(skip(self), fields(workspace = %workspace_id))]
    async fn rename(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        new_name: &str,
    ) -> Result<ProjectDetails> {
        let mut url = self.project_url(workspace_id, Some("rename"), Some(path))?;
        url.query_pairs_mut().append_pair("name", new_name);
        let response = self.client.post(url).send().await?;
        decode(response).await
    }

    #[instrument(skip(self), fields(workspace = %workspace_id))]
    async fn remove(&self, workspace_id: &WorkspaceId, path: &str) -> Result<()> {
        let url = self.project_url(workspace_id, None, Some(path))?;
        let response = self.client.delete(url).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    #[instrument(skip(self, body), fields(workspace = %workspace_id))]
    async fn update(
        &self,
        workspace_id: &WorkspaceId,
        path: &str,
        body: &ProjectDetails,
    ) -> Result<ProjectDetails> {
        let url = self.project_url(workspace_id, None, Some(path))?;
        let response = self.client.put(url).json(body).send().await?;
        decode(response).await
    }
}
