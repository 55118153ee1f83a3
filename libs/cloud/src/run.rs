//! Cloud Run (v2) services.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{ApiService, GcpClient};
use crate::error::{optional, CloudError};
use crate::iam::Policy;
use crate::operation::Operation;

const API_VERSION: &str = "v2";

/// The parts of a `Service` resource goblet reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunService {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_ready_revision: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_created_revision: Option<String>,
}

impl GcpClient {
    /// Fetch a service by resource path, `None` if it does not exist.
    pub async fn get_service(&self, service_path: &str) -> Result<Option<RunService>, CloudError> {
        let url = self.url(ApiService::Run, &format!("{API_VERSION}/{service_path}"));
        optional(self.get(ApiService::Run, url).await)
    }

    /// Create a service under `parent` (`projects/{p}/locations/{r}`).
    pub async fn create_service(
        &self,
        parent: &str,
        service_id: &str,
        body: &serde_json::Value,
    ) -> Result<Operation, CloudError> {
        let url = self.url(ApiService::Run, &format!("{API_VERSION}/{parent}/services"));
        let request = self
            .request(Method::POST, url)
            .query(&[("serviceId", service_id)])
            .json(body);

        let operation: Operation = self.send(ApiService::Run, request).await?;
        info!(service = service_id, operation = %operation.name, "Creating service");
        Ok(operation)
    }

    /// Replace an existing service's configuration, rolling a new revision.
    pub async fn update_service(
        &self,
        service_path: &str,
        body: &serde_json::Value,
    ) -> Result<Operation, CloudError> {
        let url = self.url(ApiService::Run, &format!("{API_VERSION}/{service_path}"));
        let operation: Operation = self.patch(ApiService::Run, url, body).await?;
        info!(service = service_path, operation = %operation.name, "Updating service");
        Ok(operation)
    }

    pub async fn delete_service(&self, service_path: &str) -> Result<Operation, CloudError> {
        let url = self.url(ApiService::Run, &format!("{API_VERSION}/{service_path}"));
        self.delete(ApiService::Run, url).await
    }

    /// Wait for a Cloud Run operation.
    pub async fn wait_run_operation(&self, operation: Operation) -> Result<Operation, CloudError> {
        self.wait_operation(ApiService::Run, API_VERSION, operation)
            .await
    }

    /// Replace the IAM policy of a service.
    pub async fn set_service_iam_policy(
        &self,
        service_path: &str,
        policy: &Policy,
    ) -> Result<Policy, CloudError> {
        self.set_iam_policy(ApiService::Run, API_VERSION, service_path, policy)
            .await
    }
}
