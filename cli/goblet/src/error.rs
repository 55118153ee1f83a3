//! Error display for the CLI.

use std::path::PathBuf;

use colored::Colorize;
use goblet_cloud::CloudError;
use goblet_deploy::{ConfigError, DeployError};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot derive a service name from {}", .0.display())]
    NoServiceName(PathBuf),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(hint) = hint(err) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

/// A follow-up suggestion for errors users can fix themselves.
fn hint(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(CliError::NoServiceName(_)) = err.downcast_ref::<CliError>() {
        return Some("Pass --service or set GOBLET_SERVICE.");
    }

    let cloud = err.downcast_ref::<CloudError>().or_else(|| {
        match err.downcast_ref::<DeployError>() {
            Some(DeployError::Cloud(e)) => Some(e),
            _ => None,
        }
    });
    let config = err.downcast_ref::<ConfigError>().or_else(|| {
        match err.downcast_ref::<DeployError>() {
            Some(DeployError::Config(e)) => Some(e),
            _ => None,
        }
    });

    if let Some(config) = config {
        return match config {
            ConfigError::MissingProject | ConfigError::MissingRegion => Some(
                "Set GOOGLE_PROJECT and GOOGLE_LOCATION, or add \"project\" and \"location\" to .goblet/config.json.",
            ),
            ConfigError::Parse { .. } => Some("Check that .goblet/config.json is valid JSON."),
            ConfigError::ScopeMismatch { .. } => Some(
                "Build the App from the same configuration that --config or --project-dir selects.",
            ),
            _ => None,
        };
    }

    if let Some(DeployError::BuildFailed { .. }) = err.downcast_ref::<DeployError>() {
        return Some("Open the build log for details.");
    }

    match cloud? {
        CloudError::Unauthenticated { .. } => {
            Some("Your access token may have expired. Run `gcloud auth login` or pass --access-token.")
        }
        CloudError::Auth(_) => {
            Some("Install the gcloud CLI and run `gcloud auth login`, or set GOBLET_ACCESS_TOKEN.")
        }
        CloudError::Api { status: 403, .. } => {
            Some("The active account may be missing a role for this operation.")
        }
        CloudError::Network(_) => Some("Check your network connection."),
        CloudError::OperationTimeout { .. } => {
            Some("The operation may still finish; check the Cloud console.")
        }
        _ => None,
    }
}
