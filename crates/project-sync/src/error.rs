//! Error types for project synchronization.

/// Result type alias for synchronizer operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for the project synchronizer.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The agent answered "not modified"; the cached value is still current
    #[error("Not modified")]
    NotModified,

    /// The agent answered with a non-success status
    #[error("Remote call failed with status {status}: {message}")]
    Remote { status: u16, message: String },

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event channel errors
    #[error("Event channel error: {0}")]
    Channel(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Create a new remote error
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Create a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new event channel error
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a "not modified" answer, whichever way it arrived
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::NotModified | Self::Remote { status: 304, .. })
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotModified => Some(304),
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status == reqwest::StatusCode::NOT_MODIFIED => Self::NotModified,
            Some(status) => Self::remote(status.as_u16(), err.to_string()),
            None if err.is_decode() => Self::Internal(format!("Failed to decode response: {err}")),
            None => Self::transport(err.to_string()),
        }
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("Failed to parse config: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_modified_detection() {
        assert!(SyncError::NotModified.is_not_modified());
        assert!(SyncError::remote(304, "cached").is_not_modified());
        assert!(!SyncError::remote(500, "boom").is_not_modified());
        assert!(!SyncError::transport("connection refused").is_not_modified());
    }

    #[test]
    fn test_status() {
        assert_eq!(SyncError::NotModified.status(), Some(304));
        assert_eq!(SyncError::remote(404, "missing").status(), Some(404));
        assert_eq!(SyncError::internal("x").status(), None);
    }

    #[test]
    fn test_display() {
        let err = SyncError::remote(500, "agent crashed");
        assert_eq!(
            err.to_string(),
            "Remote call failed with status 500: agent crashed"
        );
    }
}
