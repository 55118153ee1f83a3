//! Service IAM bindings.

use goblet_cloud::{Binding, CloudError, GcpClient, Policy};
use tracing::{debug, info};

use crate::target::Target;

/// Replace the service policy with `bindings`.
///
/// Returns `false` without calling the provider when there is nothing to
/// bind.
pub async fn apply_bindings(
    client: &GcpClient,
    target: &Target,
    bindings: &[Binding],
) -> Result<bool, CloudError> {
    if bindings.is_empty() {
        debug!(service = target.name(), "No IAM bindings configured");
        return Ok(false);
    }

    info!(
        service = target.name(),
        bindings = bindings.len(),
        "Adding IAM bindings"
    );
    let policy = Policy {
        bindings: bindings.to_vec(),
        etag: None,
    };
    client
        .set_service_iam_policy(&target.service_path(), &policy)
        .await?;
    Ok(true)
}
