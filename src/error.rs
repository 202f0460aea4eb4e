//! Error types for the task store and access control.
//!
//! Both are recoverable: the store rolls back and reports, the access layer
//! refuses and explains. `main` and the command layer wrap them in `anyhow`.

use thiserror::Error;

use crate::models::{Device, TaskId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote store cannot be reached; callers fall back to the cache.
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote store rejected the operation: {0}")]
    Remote(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Device limit reached: at most {limit} devices can be registered")]
    DeviceLimitReached { limit: usize, registered: Vec<Device> },

    #[error("Cannot remove the current device")]
    CannotRemoveCurrentDevice,

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Invalid security key")]
    InvalidSecurityKey,

    #[error("Locked: run `tdue unlock <key>` first")]
    Locked,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
