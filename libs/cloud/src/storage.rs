//! Cloud Storage objects.

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{ApiService, Empty, GcpClient};
use crate::error::{optional, CloudError};

/// Reference to an uploaded object, as Cloud Build expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSource {
    pub bucket: String,
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
}

/// Object metadata returned by the JSON API.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectMetadata {
    pub bucket: String,
    pub name: String,
    #[serde(default)]
    pub generation: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl ObjectMetadata {
    pub fn storage_source(&self) -> StorageSource {
        StorageSource {
            bucket: self.bucket.clone(),
            object: self.name.clone(),
            generation: self.generation.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectMetadata>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateBucketRequest<'a> {
    name: &'a str,
    location: &'a str,
}

impl GcpClient {
    /// Check whether a bucket exists.
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool, CloudError> {
        let url = self.segments_url(ApiService::Storage, &["storage", "v1", "b", bucket])?;
        let found: Option<serde_json::Value> = optional(self.get(ApiService::Storage, url).await)?;
        Ok(found.is_some())
    }

    /// Create a bucket owned by `project`.
    pub async fn create_bucket(
        &self,
        project: &str,
        bucket: &str,
        location: &str,
    ) -> Result<(), CloudError> {
        let url = self.segments_url(ApiService::Storage, &["storage", "v1", "b"])?;
        let request = self
            .request(Method::POST, url)
            .query(&[("project", project)])
            .json(&CreateBucketRequest {
                name: bucket,
                location,
            });

        let _: serde_json::Value = self.send(ApiService::Storage, request).await?;
        info!(bucket, location, "Created bucket");
        Ok(())
    }

    /// Fetch object metadata, `None` if the object does not exist.
    pub async fn get_object(
        &self,
        bucket: &str,
        object: &str,
    ) -> Result<Option<ObjectMetadata>, CloudError> {
        let url = self.segments_url(
            ApiService::Storage,
            &["storage", "v1", "b", bucket, "o", object],
        )?;
        optional(self.get(ApiService::Storage, url).await)
    }

    /// Upload `bytes` as a single-request media upload.
    pub async fn upload_object(
        &self,
        bucket: &str,
        object: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<ObjectMetadata, CloudError> {
        let url = self.segments_url(
            ApiService::Storage,
            &["upload", "storage", "v1", "b", bucket, "o"],
        )?;
        let size = bytes.len();
        let request = self
            .request(Method::POST, url)
            .query(&[("uploadType", "media"), ("name", object)])
            .header(CONTENT_TYPE, content_type)
            .body(bytes);

        let metadata: ObjectMetadata = self.send(ApiService::Storage, request).await?;
        debug!(bucket, object, size, "Uploaded object");
        Ok(metadata)
    }

    /// List every object whose name starts with `prefix`.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectMetadata>, CloudError> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.segments_url(ApiService::Storage, &["storage", "v1", "b", bucket, "o"])?;
            let mut request = self
                .request(Method::GET, url)
                .query(&[("prefix", prefix)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ObjectList = self.send(ApiService::Storage, request).await?;
            out.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(out)
    }

    /// Delete an object.
    pub async fn delete_object(&self, bucket: &str, object: &str) -> Result<(), CloudError> {
        let url = self.segments_url(
            ApiService::Storage,
            &["storage", "v1", "b", bucket, "o", object],
        )?;
        let _: Empty = self.delete(ApiService::Storage, url).await?;
        Ok(())
    }
}
