//! Cloud Scheduler jobs.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{ApiService, Empty, GcpClient};
use crate::error::CloudError;

const API_VERSION: &str = "v1";

/// The parts of a `Job` resource goblet reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerJob {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub schedule: String,

    #[serde(default)]
    pub time_zone: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl GcpClient {
    /// Create a job under `parent` (`projects/{p}/locations/{r}`).
    pub async fn create_job<B: Serialize + ?Sized>(
        &self,
        parent: &str,
        job: &B,
    ) -> Result<SchedulerJob, CloudError> {
        let url = self.url(ApiService::Scheduler, &format!("{API_VERSION}/{parent}/jobs"));
        self.post(ApiService::Scheduler, url, job).await
    }

    /// Replace an existing job.
    pub async fn update_job<B: Serialize + ?Sized>(
        &self,
        job_path: &str,
        job: &B,
    ) -> Result<SchedulerJob, CloudError> {
        let url = self.url(ApiService::Scheduler, &format!("{API_VERSION}/{job_path}"));
        self.patch(ApiService::Scheduler, url, job).await
    }

    /// Create the job, or update it when it already exists.
    pub async fn upsert_job<B: Serialize + ?Sized>(
        &self,
        parent: &str,
        job_path: &str,
        job: &B,
    ) -> Result<SchedulerJob, CloudError> {
        match self.create_job(parent, job).await {
            Ok(created) => {
                info!(job = job_path, "Created scheduler job");
                Ok(created)
            }
            Err(e) if e.is_conflict() => {
                debug!(job = job_path, "Job exists, updating");
                let updated = self.update_job(job_path, job).await?;
                info!(job = job_path, "Updated scheduler job");
                Ok(updated)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn delete_job(&self, job_path: &str) -> Result<(), CloudError> {
        let url = self.url(ApiService::Scheduler, &format!("{API_VERSION}/{job_path}"));
        let _: Empty = self.delete(ApiService::Scheduler, url).await?;
        Ok(())
    }
}
