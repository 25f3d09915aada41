//! Error types for the sync engine

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Input rejected before any gateway call
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Network failure, timeout or non-2xx response
    #[error("{message}")]
    Gateway {
        status: Option<u16>,
        message: String,
    },

    /// Mutation target absent on the server or in the local cache
    #[error("{message}")]
    NotFound {
        message: String,
        missing_ids: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// `SyncScheduler::start` called while a scheduler task is live
    #[error("sync scheduler is already running")]
    SchedulerRunning,

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }

    pub fn gateway(status: Option<u16>, message: impl Into<String>) -> Self {
        SyncError::Gateway {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        SyncError::NotFound {
            message: message.into(),
            missing_ids: Vec::new(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    /// Whether the failure came back from the remote side and belongs in the
    /// cache's `error` slot.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::Gateway { .. } | SyncError::NotFound { .. } | SyncError::Json(_)
        )
    }

    /// Human-readable message for display next to the failed action.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        // Timeouts are not distinguished from other transport failures.
        SyncError::Gateway {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
