//! Source upload to Cloud Storage.

use goblet_cloud::{CloudError, GcpClient, StorageSource};
use tracing::info;

use crate::package::{SourceArchive, ARCHIVE_CONTENT_TYPE};
use crate::target::Target;

/// Where the archive ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub source: StorageSource,

    /// The object already existed and `force` was not set.
    pub skipped: bool,
}

/// Upload `archive` for `target` into `bucket`, creating the bucket if needed.
///
/// Object names are content-addressed, so an existing object already holds
/// these exact bytes and is reused unless `force` is set.
pub async fn upload_source(
    client: &GcpClient,
    target: &Target,
    bucket: &str,
    archive: &SourceArchive,
    force: bool,
) -> Result<UploadOutcome, CloudError> {
    if !client.bucket_exists(bucket).await? {
        client
            .create_bucket(target.project(), bucket, target.region())
            .await?;
    }

    let object = archive.object_name(target.name());

    if !force {
        if let Some(existing) = client.get_object(bucket, &object).await? {
            info!(bucket, object = %object, "Source unchanged, skipping upload");
            return Ok(UploadOutcome {
                source: existing.storage_source(),
                skipped: true,
            });
        }
    }

    info!(
        bucket,
        object = %object,
        size = archive.size(),
        "Uploading source"
    );
    let uploaded = client
        .upload_object(
            bucket,
            &object,
            ARCHIVE_CONTENT_TYPE,
            archive.bytes().to_vec(),
        )
        .await?;

    Ok(UploadOutcome {
        source: uploaded.storage_source(),
        skipped: false,
    })
}
