use thiserror::Error;

/// Typed error hierarchy for taskrelay.
///
/// Use at module boundaries (store access, scheduler ticks, channel I/O).
/// Internal/leaf functions can continue using `anyhow::Result` — the `Internal`
/// variant allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Malformed task record '{task}': {reason}")]
    MalformedRecord { task: String, reason: String },

    #[error("Invalid repeat state for task '{task}': remain={remain}")]
    InvalidRepeatState { task: String, remain: i64 },

    #[error("Task '{0}' not found")]
    NotFound(String),

    #[error("Task storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Channel contention on '{channel}': {message}")]
    ChannelContention { channel: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using `RelayError`.
pub type RelayResult<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Whether the scheduler should retry this task on the next tick
    /// rather than discard it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayError::MalformedRecord { .. } | RelayError::StorageUnavailable(_)
        )
    }
}
