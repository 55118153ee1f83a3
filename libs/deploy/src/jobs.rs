//! Cloud Scheduler job sync.

use goblet_cloud::{CloudError, GcpClient};
use goblet_schedule::HandlerRegistry;
use tracing::{info, warn};

/// Create or update one scheduler job per registered handler.
///
/// Jobs invoke `uri`; `service_account` signs OIDC tokens for jobs that did
/// not register their own identity. Returns the synced job names in
/// registration order.
pub async fn sync_jobs<H>(
    client: &GcpClient,
    registry: &HandlerRegistry<H>,
    uri: &str,
    service_account: Option<&str>,
) -> Result<Vec<String>, CloudError> {
    let mut synced = Vec::with_capacity(registry.len());

    for registration in registry.iter() {
        let descriptor = registration.descriptor();
        let body = descriptor.targeted(uri, service_account);
        if body.oidc_token().is_none() {
            warn!(
                job = descriptor.name(),
                "No service account for job, invocations will be unauthenticated"
            );
        }

        client
            .upsert_job(
                &descriptor.scope().parent(),
                &descriptor.resource_path(),
                &body,
            )
            .await?;
        synced.push(descriptor.name().to_string());
    }

    if !synced.is_empty() {
        info!(jobs = synced.len(), "Synced scheduler jobs");
    }
    Ok(synced)
}

/// Delete every registered job, skipping the ones already gone.
///
/// Returns the names of the jobs actually deleted.
pub async fn delete_jobs<H>(
    client: &GcpClient,
    registry: &HandlerRegistry<H>,
) -> Result<Vec<String>, CloudError> {
    let mut deleted = Vec::new();

    for descriptor in registry.list() {
        match client.delete_job(&descriptor.resource_path()).await {
            Ok(()) => {
                info!(job = descriptor.name(), "Deleted scheduler job");
                deleted.push(descriptor.name().to_string());
            }
            Err(e) if e.is_not_found() => {
                info!(job = descriptor.name(), "Scheduler job already gone");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(deleted)
}
