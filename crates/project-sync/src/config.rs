//! Configuration for the project synchronizer.
//!
//! Configuration is read from a TOML file and can be overridden through
//! environment variables:
//!
//! ```toml
//! [agent]
//! base_url = "http://localhost:8080/api"
//! request_timeout_secs = 30
//!
//! [events]
//! topic = "vfs"
//!
//! [cache]
//! purge_on_workspace_removal = false
//!
//! [logging]
//! level = "info"
//!
//! [[workspaces]]
//! id = "workspace42"
//! config = { name = "dev", projects = [{ name = "console", path = "/console", type = "maven" }] }
//! ```

use crate::bus::DEFAULT_CHANNEL_CAPACITY;
use crate::error::{Result, SyncError};
use crate::events::VFS_TOPIC;
use crate::types::Workspace;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_FILE: &str = "project-sync.toml";

// Environment variable names
pub const ENV_CONFIG_PATH: &str = "PROJECT_SYNC_CONFIG_PATH";
pub const ENV_AGENT_URL: &str = "PROJECT_SYNC_AGENT_URL";
pub const ENV_LOG_LEVEL: &str = "PROJECT_SYNC_LOG_LEVEL";
pub const ENV_EVENT_TOPIC: &str = "PROJECT_SYNC_EVENT_TOPIC";

/// Connection to the workspace agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the agent REST API
    pub base_url: String,

    /// Timeout for each remote call (seconds)
    pub request_timeout_secs: u64,

    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_secs: 30,
            pool_max_idle_per_host: 10,
        }
    }
}

/// Event channel subscription settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Topic carrying filesystem changes
    pub topic: String,

    /// Buffer size of each in-process channel
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            topic: VFS_TOPIC.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Cache retention
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Drop every cached entry of a workspace once it stops being tracked
    pub purge_on_workspace_removal: bool,
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete synchronizer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub agent: AgentConfig,
    pub events: EventConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,

    /// Statically registered workspaces
    pub workspaces: Vec<Workspace>,
}

impl SyncConfig {
    /// Resolve the config path from `PROJECT_SYNC_CONFIG_PATH` or the default file name
    pub fn default_path() -> PathBuf {
        std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load from the default path, falling back to defaults when the file is
    /// missing. Environment overrides are applied and the result validated.
    pub async fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if tokio::fs::try_exists(&path).await? {
            Self::load_from_path(&path).await?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SyncError::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` to read variables
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_AGENT_URL) {
            debug!("Agent URL overridden from environment");
            self.agent.base_url = url;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(topic) = lookup(ENV_EVENT_TOPIC) {
            self.events.topic = topic;
        }
    }

    /// Check the configuration for values the synchronizer cannot run with
    pub fn validate(&self) -> Result<()> {
        let base_url = reqwest::Url::parse(&self.agent.base_url).map_err(|e| {
            SyncError::config(format!("Invalid agent URL '{}': {e}", self.agent.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::config(format!(
                "Agent URL '{}' cannot carry a path",
                self.agent.base_url
            )));
        }

        if self.agent.request_timeout_secs == 0 {
            return Err(SyncError::config("request_timeout_secs must be positive"));
        }
        if self.events.channel_capacity == 0 {
            return Err(SyncError::config("channel_capacity must be positive"));
        }
        if self.events.topic.is_empty() {
            return Err(SyncError::config("event topic must not be empty"));
        }

        let mut seen = HashSet::new();
        for workspace in &self.workspaces {
            if workspace.id.is_empty() {
                return Err(SyncError::config("workspace id must not be empty"));
            }
            if !seen.insert(&workspace.id) {
                return Err(SyncError::config(format!(
                    "workspace '{}' is declared twice",
                    workspace.id
                )));
            }
        }

        Ok(())
    }
}
