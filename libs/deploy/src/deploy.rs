//! Deploy orchestration.

use std::path::{Path, PathBuf};

use goblet_cloud::{GcpClient, StorageSource};
use goblet_schedule::HandlerRegistry;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::build::{build_request, image_for, run_build};
use crate::config::DeploymentConfig;
use crate::error::DeployError;
use crate::iam::apply_bindings;
use crate::jobs::sync_jobs;
use crate::package::{ensure_dockerfile, package_source, SourceArchive};
use crate::revision::{deploy_revision, pinned_image, service_body};
use crate::target::Target;
use crate::upload::upload_source;

/// Per-invocation deploy switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Upload the source even when an identical archive is already stored.
    pub force: bool,
}

/// What a deploy did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub service: String,
    pub image: String,
    pub source: StorageSource,
    pub dockerfile_written: bool,
    pub upload_skipped: bool,
    pub build_id: String,
    pub uri: Option<String>,
    pub iam_applied: bool,
    pub jobs: Vec<String>,
}

/// Runs the deploy pipeline for one service.
///
/// Steps run strictly in order: package, upload, build, revision, IAM, job
/// sync. The first failure stops the run; earlier steps are not undone.
#[derive(Debug, Clone)]
pub struct Deployer {
    client: GcpClient,
    target: Target,
    project_dir: PathBuf,
    config: DeploymentConfig,
}

impl Deployer {
    pub fn new(
        client: GcpClient,
        target: Target,
        project_dir: impl Into<PathBuf>,
        config: DeploymentConfig,
    ) -> Self {
        Self {
            client,
            target,
            project_dir: project_dir.into(),
            config,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// Deploy the service and sync the jobs in `registry`.
    ///
    /// `override_config` replaces the stored configuration for this run; the
    /// two are never merged.
    #[instrument(skip_all, fields(service = %self.target.name()))]
    pub async fn deploy<H>(
        &self,
        registry: &HandlerRegistry<H>,
        options: DeployOptions,
        override_config: Option<&DeploymentConfig>,
    ) -> Result<DeployReport, DeployError> {
        let config = override_config.unwrap_or(&self.config);
        let target = &self.target;
        target.ensure_same_scope(registry.scope())?;

        info!(scope = %target.scope(), force = options.force, "Deploying");

        let (dockerfile_written, archive) =
            package_project(&self.project_dir, config, target.name()).await?;

        let bucket = config.source_bucket(target.project());
        let upload = upload_source(&self.client, target, &bucket, &archive, options.force).await?;

        let image = image_for(target, config);
        let request = build_request(&image, &upload.source, &config.cloudbuild);
        let build = run_build(&self.client, target.project(), &request).await?;

        let pinned = pinned_image(&image, build.image_digest(&image));
        let body = service_body(config, target, &pinned);
        let service = deploy_revision(&self.client, target, &body).await?;

        let iam_applied = apply_bindings(&self.client, target, &config.bindings).await?;

        let jobs = match service.uri.as_deref() {
            Some(uri) => {
                sync_jobs(
                    &self.client,
                    registry,
                    uri,
                    config.scheduler.service_account.as_deref(),
                )
                .await?
            }
            None if registry.is_empty() => Vec::new(),
            None => {
                warn!(
                    jobs = registry.len(),
                    "Service has no URI yet, scheduler jobs not synced"
                );
                Vec::new()
            }
        };

        info!(image = %pinned, uri = service.uri.as_deref().unwrap_or_default(), "Deploy complete");

        Ok(DeployReport {
            service: target.name().to_string(),
            image: pinned,
            source: upload.source,
            dockerfile_written,
            upload_skipped: upload.skipped,
            build_id: build.id,
            uri: service.uri,
            iam_applied,
            jobs,
        })
    }
}

/// Write the default Dockerfile if needed and pack the tree off the runtime.
///
/// Returns whether a Dockerfile was written, and the archive.
pub async fn package_project(
    project_dir: &Path,
    config: &DeploymentConfig,
    service: &str,
) -> Result<(bool, SourceArchive), DeployError> {
    let project_dir = project_dir.to_path_buf();
    let dockerfile = config.dockerfile.clone();
    let exclude = config.source.exclude.clone();
    let service = service.to_string();

    tokio::task::spawn_blocking(move || -> Result<_, DeployError> {
        let written = ensure_dockerfile(&project_dir, &dockerfile, &service)?;
        let archive = package_source(&project_dir, &exclude)?;
        Ok((written, archive))
    })
    .await
    .map_err(|e| DeployError::Io(std::io::Error::other(e)))?
}
