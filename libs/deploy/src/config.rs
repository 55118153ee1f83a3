//! Deployment configuration.
//!
//! Read from `<project_dir>/.goblet/config.json`. A missing file is an empty
//! configuration. Project and region come from `GOOGLE_PROJECT` /
//! `GOOGLE_LOCATION` first, then from the file.

use std::path::{Path, PathBuf};

use goblet_cloud::Binding;
use goblet_schedule::JobScope;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ConfigError;

pub const CONFIG_DIR: &str = ".goblet";
pub const CONFIG_FILE: &str = "config.json";

pub const PROJECT_ENV: &str = "GOOGLE_PROJECT";
pub const LOCATION_ENV: &str = "GOOGLE_LOCATION";
/// Service name seen by the deployed app.
pub const SERVICE_ENV: &str = "GOBLET_SERVICE";

/// Snapshot of `.goblet/config.json`.
///
/// Provider override sections are kept as raw JSON objects and spread into
/// the request bodies as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Extra `Build` fields. `artifact_registry` names the image to push.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub cloudbuild: Map<String, Value>,

    /// Replaces the service IAM policy when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub cloudrun: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub cloudrun_revision: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub cloudrun_container: Map<String, Value>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub dockerfile: DockerfileConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Identity used for OIDC tokens on jobs that do not set their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Upload bucket, `{project}_cloudbuild` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Paths relative to the project root left out of the source archive.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// Inputs of the generated Dockerfile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rust_version: Option<String>,
}

impl DeploymentConfig {
    /// Path of the config file inside `project_dir`.
    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load the project's config file, or an empty config when there is none.
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(project_dir);
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Load a config snapshot from an explicit file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Resolve project and region from the process environment and this file.
    pub fn scope(&self) -> Result<JobScope, ConfigError> {
        self.scope_with(|key| std::env::var(key).ok())
    }

    /// Resolve project and region, looking variables up through `env`.
    pub fn scope_with<F>(&self, env: F) -> Result<JobScope, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |value: &String| !value.trim().is_empty();
        let pick = |key: &str, fallback: &Option<String>| {
            env(key)
                .filter(non_blank)
                .or_else(|| fallback.clone().filter(non_blank))
        };

        let project = pick(PROJECT_ENV, &self.project).ok_or(ConfigError::MissingProject)?;
        let region = pick(LOCATION_ENV, &self.location).ok_or(ConfigError::MissingRegion)?;

        Ok(JobScope::new(project, region)?)
    }

    /// Image override from `cloudbuild.artifact_registry`.
    pub fn artifact_registry(&self) -> Option<&str> {
        self.cloudbuild
            .get("artifact_registry")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Upload bucket for `project`.
    pub fn source_bucket(&self, project: &str) -> String {
        self.source
            .bucket
            .clone()
            .unwrap_or_else(|| format!("{project}_cloudbuild"))
    }
}
