//! Error types for job registration.

use thiserror::Error;

/// Errors that can occur when building descriptors or mutating a registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The job name is empty.
    #[error("job name cannot be empty")]
    EmptyName,

    /// The job name contains characters the scheduler does not accept.
    #[error("invalid job name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// The project or region of a scope is empty.
    #[error("job scope {field} cannot be empty")]
    EmptyScope { field: &'static str },

    /// A job with this name is already registered.
    #[error("job '{0}' is already registered")]
    DuplicateJob(String),

    /// No job with this name is registered.
    #[error("job '{0}' is not registered")]
    JobNotFound(String),
}

impl ScheduleError {
    /// Returns true if this error rejected a duplicate registration.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ScheduleError::DuplicateJob(_))
    }

    /// Returns true if this error reports a missing job.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScheduleError::JobNotFound(_))
    }
}
