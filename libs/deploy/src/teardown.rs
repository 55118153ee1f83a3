//! Resource teardown.

use goblet_cloud::{CloudError, GcpClient, PackageRef};
use goblet_schedule::HandlerRegistry;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::build::image_for;
use crate::config::DeploymentConfig;
use crate::error::DeployError;
use crate::jobs::delete_jobs;
use crate::target::Target;

/// What a teardown removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub jobs: Vec<String>,
    pub service_deleted: bool,
    pub package_deleted: bool,
    pub objects_deleted: usize,
}

/// Removes what a deploy created.
#[derive(Debug, Clone)]
pub struct Teardown {
    client: GcpClient,
    target: Target,
    config: DeploymentConfig,
}

impl Teardown {
    pub fn new(client: GcpClient, target: Target, config: DeploymentConfig) -> Self {
        Self {
            client,
            target,
            config,
        }
    }

    /// Delete scheduler jobs, then the service, then with `all` the image
    /// package and uploaded sources. Missing resources are skipped.
    #[instrument(skip_all, fields(service = %self.target.name(), all = all))]
    pub async fn destroy<H>(
        &self,
        registry: &HandlerRegistry<H>,
        all: bool,
    ) -> Result<TeardownReport, DeployError> {
        self.target.ensure_same_scope(registry.scope())?;

        let mut report = TeardownReport {
            jobs: delete_jobs(&self.client, registry).await?,
            ..Default::default()
        };

        report.service_deleted = self.delete_service().await?;

        if all {
            report.package_deleted = self.delete_package().await?;
            report.objects_deleted = self.delete_sources().await?;
        }

        info!(
            jobs = report.jobs.len(),
            service = report.service_deleted,
            package = report.package_deleted,
            objects = report.objects_deleted,
            "Teardown complete"
        );
        Ok(report)
    }

    async fn delete_service(&self) -> Result<bool, CloudError> {
        let path = self.target.service_path();
        match skip_missing(self.client.delete_service(&path).await)? {
            Some(operation) => {
                self.client.wait_run_operation(operation).await?;
                info!(service = %path, "Deleted service");
                Ok(true)
            }
            None => {
                info!(service = %path, "Service already gone");
                Ok(false)
            }
        }
    }

    async fn delete_package(&self) -> Result<bool, CloudError> {
        let image = image_for(&self.target, &self.config);
        let Some(package) = PackageRef::from_image(&image) else {
            debug!(image = %image, "Image is not in Artifact Registry, leaving it");
            return Ok(false);
        };

        match skip_missing(self.client.delete_package(&package).await)? {
            Some(operation) => {
                self.client.wait_artifact_operation(operation).await?;
                Ok(true)
            }
            None => {
                info!(package = %package.path(), "Package already gone");
                Ok(false)
            }
        }
    }

    async fn delete_sources(&self) -> Result<usize, CloudError> {
        let bucket = self.config.source_bucket(self.target.project());
        let prefix = self.target.source_prefix();

        let objects = skip_missing(self.client.list_objects(&bucket, &prefix).await)?
            .unwrap_or_default();

        let mut deleted = 0;
        for object in objects {
            if skip_missing(self.client.delete_object(&bucket, &object.name).await)?.is_some() {
                deleted += 1;
            }
        }

        if deleted > 0 {
            info!(bucket = %bucket, prefix = %prefix, objects = deleted, "Deleted source archives");
        }
        Ok(deleted)
    }
}

fn skip_missing<T>(result: Result<T, CloudError>) -> Result<Option<T>, CloudError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
