//! Error types for deploy and teardown.

use std::io;
use std::path::PathBuf;

use goblet_cloud::CloudError;
use goblet_schedule::{JobScope, ScheduleError};
use thiserror::Error;

/// Errors raised while resolving deployment configuration.
///
/// All of these surface before the first provider call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no project configured (set GOOGLE_PROJECT or \"project\" in .goblet/config.json)")]
    MissingProject,

    #[error("no region configured (set GOOGLE_LOCATION or \"location\" in .goblet/config.json)")]
    MissingRegion,

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("jobs are registered for {registry} but the service deploys to {target}")]
    ScopeMismatch { registry: JobScope, target: JobScope },

    #[error("invalid service name {name:?}: {reason}")]
    InvalidServiceName { name: String, reason: &'static str },

    #[error(transparent)]
    Scope(#[from] ScheduleError),
}

/// Errors raised by a deploy or teardown run.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("packaging failed: {0}")]
    Io(#[from] io::Error),

    #[error("failed to walk project tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    /// The build ran and finished unsuccessfully.
    #[error("build {id} finished with status {status}{}", log_url.as_deref().map(|u| format!(" (logs: {u})")).unwrap_or_default())]
    BuildFailed {
        id: String,
        status: String,
        log_url: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_failure_mentions_logs() {
        let err = DeployError::BuildFailed {
            id: "b-1".to_string(),
            status: "FAILURE".to_string(),
            log_url: Some("https://logs/b-1".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "build b-1 finished with status FAILURE (logs: https://logs/b-1)"
        );

        let err = DeployError::BuildFailed {
            id: "b-2".to_string(),
            status: "TIMEOUT".to_string(),
            log_url: None,
        };
        assert_eq!(err.to_string(), "build b-2 finished with status TIMEOUT");
    }

    #[test]
    fn missing_project_names_env_var() {
        let err = DeployError::from(ConfigError::MissingProject);
        assert!(err.to_string().contains("GOOGLE_PROJECT"));
    }
}
