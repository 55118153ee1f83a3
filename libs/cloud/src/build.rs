//! Cloud Build.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{ApiService, GcpClient};
use crate::error::CloudError;
use crate::operation::Operation;

/// The parts of a `Build` resource goblet reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    #[serde(default)]
    pub id: String,

    /// `QUEUED`, `WORKING`, `SUCCESS`, `FAILURE`, `TIMEOUT`, ...
    #[serde(default)]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<BuildResults>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResults {
    #[serde(default)]
    pub images: Vec<BuiltImage>,
}

/// An image pushed by a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltImage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl Build {
    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }

    /// Digest of the pushed image called `name`.
    pub fn image_digest(&self, name: &str) -> Option<&str> {
        self.results
            .as_ref()?
            .images
            .iter()
            .find(|image| image.name == name)
            .and_then(|image| image.digest.as_deref())
    }
}

impl GcpClient {
    /// Submit a build. `request` is the full `Build` body.
    pub async fn create_build(
        &self,
        project: &str,
        request: &serde_json::Value,
    ) -> Result<Operation, CloudError> {
        let url = self.url(
            ApiService::CloudBuild,
            &format!("v1/projects/{project}/builds"),
        );
        let operation: Operation = self.post(ApiService::CloudBuild, url, request).await?;
        info!(operation = %operation.name, "Submitted build");
        Ok(operation)
    }

    /// Wait for a build operation and return the finished build.
    ///
    /// A build that ran and failed is returned as `Ok` with its status so
    /// callers can report the log URL; an operation error without a build
    /// record is returned as [`CloudError::OperationFailed`].
    pub async fn wait_build(&self, operation: Operation) -> Result<Build, CloudError> {
        let operation = self
            .poll_operation(ApiService::CloudBuild, "v1", operation)
            .await?;

        let build = match operation.response_as::<Build>()? {
            Some(build) => Some(build),
            None => operation.metadata_field::<Build>("build")?,
        };

        match build {
            Some(build) => Ok(build),
            None => {
                operation.check()?;
                Err(CloudError::Decode {
                    service: ApiService::CloudBuild.name(),
                    message: "finished operation carries no build".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_digest_matches_by_name() {
        let build: Build = serde_json::from_value(serde_json::json!({
            "id": "b-1",
            "status": "SUCCESS",
            "results": {
                "images": [
                    { "name": "other", "digest": "sha256:aaa" },
                    { "name": "us-docker.pkg.dev/p/r/svc", "digest": "sha256:bbb" }
                ]
            }
        }))
        .unwrap();

        assert!(build.is_success());
        assert_eq!(
            build.image_digest("us-docker.pkg.dev/p/r/svc"),
            Some("sha256:bbb")
        );
        assert_eq!(build.image_digest("missing"), None);
    }
}
