/// Errors from hub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The hub task has shut down and no longer accepts commands.
    #[error("hub is closed")]
    Closed,
}

/// Result alias for hub operations.
pub type HubResult<T> = Result<T, HubError>;
