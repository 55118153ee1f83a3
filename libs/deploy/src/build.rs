//! Container image builds.

use goblet_cloud::{Build, GcpClient, StorageSource};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::DeploymentConfig;
use crate::error::DeployError;
use crate::target::Target;

pub const DOCKER_BUILDER: &str = "gcr.io/cloud-builders/docker";

const ARTIFACT_REGISTRY_KEY: &str = "artifact_registry";
const CLOUD_LOGGING_ONLY: &str = "CLOUD_LOGGING_ONLY";

/// The image a deploy of `target` builds and pushes.
pub fn image_for(target: &Target, config: &DeploymentConfig) -> String {
    config
        .artifact_registry()
        .map(str::to_string)
        .unwrap_or_else(|| target.default_image())
}

/// Assemble the `Build` body.
///
/// The `cloudbuild` overrides are spread over the generated fields and win
/// on conflicts. A build with a custom service account and no logs bucket
/// logs to Cloud Logging only.
pub fn build_request(image: &str, source: &StorageSource, overrides: &Map<String, Value>) -> Value {
    let mut overrides = overrides.clone();
    overrides.remove(ARTIFACT_REGISTRY_KEY);

    let has_account = overrides
        .get("serviceAccount")
        .is_some_and(|v| !v.is_null());
    let has_logs_bucket = overrides.get("logsBucket").is_some_and(|v| !v.is_null());

    if has_account && !has_logs_bucket {
        let options = overrides
            .entry("options")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(options) = options {
            if options.get("logging").is_none_or(Value::is_null) {
                info!("Service account without logs bucket, logging to Cloud Logging only");
                options.insert("logging".to_string(), json!(CLOUD_LOGGING_ONLY));
            }
        }
    }

    let mut body = Map::new();
    body.insert("source".to_string(), json!({ "storageSource": source }));
    body.insert(
        "steps".to_string(),
        json!([{ "name": DOCKER_BUILDER, "args": ["build", "-t", image, "."] }]),
    );
    body.insert("images".to_string(), json!([image]));
    body.extend(overrides);

    Value::Object(body)
}

/// Submit the build and wait for it; a build that did not succeed is an error.
pub async fn run_build(
    client: &GcpClient,
    project: &str,
    request: &Value,
) -> Result<Build, DeployError> {
    let operation = client.create_build(project, request).await?;
    let build = client.wait_build(operation).await?;

    if !build.is_success() {
        warn!(
            build = %build.id,
            status = %build.status,
            logs = build.log_url.as_deref().unwrap_or_default(),
            "Build failed"
        );
        return Err(DeployError::BuildFailed {
            id: build.id,
            status: build.status,
            log_url: build.log_url,
        });
    }

    info!(build = %build.id, "Build finished");
    Ok(build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use goblet_schedule::JobScope;

    fn source() -> StorageSource {
        StorageSource {
            bucket: "p_cloudbuild".to_string(),
            object: "goblet/svc/source-abc.tar.gz".to_string(),
            generation: None,
        }
    }

    fn overrides(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn request_without_overrides() {
        let image = "us-central1-docker.pkg.dev/p/cloud-run-source-deploy/svc";
        let body = build_request(image, &source(), &Map::new());

        assert_eq!(
            body,
            json!({
                "source": {
                    "storageSource": {
                        "bucket": "p_cloudbuild",
                        "object": "goblet/svc/source-abc.tar.gz"
                    }
                },
                "steps": [{
                    "name": "gcr.io/cloud-builders/docker",
                    "args": ["build", "-t", image, "."]
                }],
                "images": [image]
            })
        );
    }

    #[test]
    fn overrides_are_spread_and_registry_removed() {
        let body = build_request(
            "img",
            &source(),
            &overrides(json!({
                "artifact_registry": "img",
                "timeout": "1200s",
                "images": ["img", "img:latest"]
            })),
        );

        assert!(body.get("artifact_registry").is_none());
        assert_eq!(body["timeout"], "1200s");
        assert_eq!(body["images"], json!(["img", "img:latest"]));
    }

    #[test]
    fn service_account_defaults_logging() {
        let body = build_request(
            "img",
            &source(),
            &overrides(json!({ "serviceAccount": "projects/p/serviceAccounts/b@p" })),
        );
        assert_eq!(body["options"]["logging"], "CLOUD_LOGGING_ONLY");

        let body = build_request(
            "img",
            &source(),
            &overrides(json!({
                "serviceAccount": "projects/p/serviceAccounts/b@p",
                "options": { "machineType": "E2_HIGHCPU_8" }
            })),
        );
        assert_eq!(body["options"]["logging"], "CLOUD_LOGGING_ONLY");
        assert_eq!(body["options"]["machineType"], "E2_HIGHCPU_8");
    }

    #[test]
    fn explicit_logging_choices_are_kept() {
        let body = build_request(
            "img",
            &source(),
            &overrides(json!({
                "serviceAccount": "sa",
                "logsBucket": "gs://logs"
            })),
        );
        assert!(body.get("options").is_none());

        let body = build_request(
            "img",
            &source(),
            &overrides(json!({
                "serviceAccount": "sa",
                "options": { "logging": "GCS_ONLY" }
            })),
        );
        assert_eq!(body["options"]["logging"], "GCS_ONLY");
    }

    #[test]
    fn image_prefers_artifact_registry_override() {
        let target = Target::new(JobScope::new("p", "us-central1").unwrap(), "svc").unwrap();
        let mut config = DeploymentConfig::default();
        assert_eq!(
            image_for(&target, &config),
            "us-central1-docker.pkg.dev/p/cloud-run-source-deploy/svc"
        );

        config
            .cloudbuild
            .insert("artifact_registry".to_string(), json!("eu.gcr.io/p/custom"));
        assert_eq!(image_for(&target, &config), "eu.gcr.io/p/custom");
    }
}
