//! Artifact Registry packages.

use tracing::info;

use crate::client::{ApiService, GcpClient};
use crate::error::CloudError;
use crate::operation::Operation;

/// A Docker package in an Artifact Registry repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub project: String,
    pub location: String,
    pub repository: String,
    pub package: String,
}

impl PackageRef {
    /// Parse `{location}-docker.pkg.dev/{project}/{repository}/{image}[:tag][@digest]`.
    ///
    /// Returns `None` for references outside Artifact Registry.
    pub fn from_image(image: &str) -> Option<Self> {
        let image = image.split('@').next().unwrap_or(image);
        let (host, rest) = image.split_once('/')?;
        let location = host.strip_suffix("-docker.pkg.dev")?;

        let mut parts = rest.splitn(3, '/');
        let project = parts.next()?;
        let repository = parts.next()?;
        let package = parts.next()?;

        // A tag is a ':' in the last path segment.
        let package = match package.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => name,
            _ => package,
        };

        if [location, project, repository, package]
            .iter()
            .any(|part| part.is_empty())
        {
            return None;
        }

        Some(Self {
            project: project.to_string(),
            location: location.to_string(),
            repository: repository.to_string(),
            package: package.to_string(),
        })
    }

    /// Resource path with the package id unencoded.
    pub fn path(&self) -> String {
        format!(
            "projects/{}/locations/{}/repositories/{}/packages/{}",
            self.project, self.location, self.repository, self.package
        )
    }
}

impl GcpClient {
    /// Delete a package and every version in it.
    pub async fn delete_package(&self, package: &PackageRef) -> Result<Operation, CloudError> {
        let url = self.segments_url(
            ApiService::ArtifactRegistry,
            &[
                "v1",
                "projects",
                &package.project,
                "locations",
                &package.location,
                "repositories",
                &package.repository,
                "packages",
                &package.package,
            ],
        )?;
        let operation: Operation = self.delete(ApiService::ArtifactRegistry, url).await?;
        info!(package = %package.path(), "Deleting package");
        Ok(operation)
    }

    /// Wait for an Artifact Registry operation.
    pub async fn wait_artifact_operation(
        &self,
        operation: Operation,
    ) -> Result<Operation, CloudError> {
        self.wait_operation(ApiService::ArtifactRegistry, "v1", operation)
            .await
    }
}
