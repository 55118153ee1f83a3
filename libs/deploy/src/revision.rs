//! Cloud Run revisions.

use goblet_cloud::{CloudError, GcpClient, RunService};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::{DeploymentConfig, LOCATION_ENV, PROJECT_ENV, SERVICE_ENV};
use crate::target::Target;

/// Reference `image` by digest when one is known.
///
/// Any tag or earlier digest on `image` is dropped first.
pub fn pinned_image(image: &str, digest: Option<&str>) -> String {
    let Some(digest) = digest.filter(|d| !d.is_empty()) else {
        return image.to_string();
    };

    let repository = image.split('@').next().unwrap_or(image);
    let repository = match repository.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => name,
        _ => repository,
    };

    format!("{repository}@{digest}")
}

/// Assemble the `Service` body.
///
/// `cloudrun` is the base, `cloudrun_revision` is merged into its
/// `template`, and the template carries exactly one container built from
/// `cloudrun_container` plus `image`. The container environment gets the
/// project, region and service name so the served app resolves the same
/// target; entries already present in `cloudrun_container.env` are left
/// alone.
pub fn service_body(config: &DeploymentConfig, target: &Target, image: &str) -> Value {
    let mut body = config.cloudrun.clone();

    let mut template = match body.remove("template") {
        Some(Value::Object(template)) => template,
        _ => Map::new(),
    };
    template.extend(config.cloudrun_revision.clone());

    let mut container = config.cloudrun_container.clone();
    container.insert("image".to_string(), json!(image));
    add_target_env(&mut container, target);
    template.insert("containers".to_string(), json!([container]));

    body.insert("template".to_string(), Value::Object(template));
    Value::Object(body)
}

fn add_target_env(container: &mut Map<String, Value>, target: &Target) {
    let env = container
        .entry("env")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(env) = env else {
        return;
    };

    let vars = [
        (PROJECT_ENV, target.project()),
        (LOCATION_ENV, target.region()),
        (SERVICE_ENV, target.name()),
    ];
    for (name, value) in vars {
        let present = env
            .iter()
            .any(|var| var.get("name").and_then(Value::as_str) == Some(name));
        if !present {
            env.push(json!({ "name": name, "value": value }));
        }
    }
}

/// Create or update the service so it runs `body`, and wait for the rollout.
pub async fn deploy_revision(
    client: &GcpClient,
    target: &Target,
    body: &Value,
) -> Result<RunService, CloudError> {
    let service_path = target.service_path();

    let operation = match client.get_service(&service_path).await? {
        None => {
            info!(service = target.name(), "Service not found, creating");
            client
                .create_service(&target.parent(), target.name(), body)
                .await?
        }
        Some(existing) => {
            debug!(
                service = target.name(),
                revision = existing.latest_ready_revision.as_deref().unwrap_or_default(),
                "Service exists, deploying new revision"
            );
            client.update_service(&service_path, body).await?
        }
    };

    let operation = client.wait_run_operation(operation).await?;

    let service = match operation.response_as::<RunService>()? {
        Some(service) if service.uri.is_some() => service,
        _ => client
            .get_service(&service_path)
            .await?
            .unwrap_or_else(|| RunService {
                name: service_path.clone(),
                ..Default::default()
            }),
    };

    info!(
        service = target.name(),
        uri = service.uri.as_deref().unwrap_or_default(),
        revision = service.latest_ready_revision.as_deref().unwrap_or_default(),
        "Revision deployed"
    );
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use goblet_schedule::JobScope;
    use rstest::rstest;

    fn target() -> Target {
        Target::new(JobScope::new("p", "us-central1").unwrap(), "svc").unwrap()
    }

    #[rstest]
    #[case("us-docker.pkg.dev/p/r/svc", "us-docker.pkg.dev/p/r/svc@sha256:abc")]
    #[case("us-docker.pkg.dev/p/r/svc:latest", "us-docker.pkg.dev/p/r/svc@sha256:abc")]
    #[case("us-docker.pkg.dev/p/r/svc@sha256:old", "us-docker.pkg.dev/p/r/svc@sha256:abc")]
    #[case("localhost:5000/svc", "localhost:5000/svc@sha256:abc")]
    fn pins_digest(#[case] image: &str, #[case] expected: &str) {
        assert_eq!(pinned_image(image, Some("sha256:abc")), expected);
    }

    #[test]
    fn unknown_digest_keeps_image() {
        assert_eq!(pinned_image("img:v1", None), "img:v1");
        assert_eq!(pinned_image("img:v1", Some("")), "img:v1");
    }

    #[test]
    fn body_layers_overrides() {
        let config: DeploymentConfig = serde_json::from_value(json!({
            "cloudrun": {
                "ingress": "INGRESS_TRAFFIC_INTERNAL_ONLY",
                "template": { "timeout": "300s" }
            },
            "cloudrun_revision": { "serviceAccount": "run@p.iam.gserviceaccount.com" },
            "cloudrun_container": {
                "image": "ignored",
                "resources": { "limits": { "memory": "1Gi" } }
            }
        }))
        .unwrap();

        let body = service_body(&config, &target(), "img@sha256:abc");

        assert_eq!(
            body,
            json!({
                "ingress": "INGRESS_TRAFFIC_INTERNAL_ONLY",
                "template": {
                    "timeout": "300s",
                    "serviceAccount": "run@p.iam.gserviceaccount.com",
                    "containers": [{
                        "image": "img@sha256:abc",
                        "resources": { "limits": { "memory": "1Gi" } },
                        "env": [
                            { "name": "GOOGLE_PROJECT", "value": "p" },
                            { "name": "GOOGLE_LOCATION", "value": "us-central1" },
                            { "name": "GOBLET_SERVICE", "value": "svc" }
                        ]
                    }]
                }
            })
        );
    }

    #[test]
    fn empty_config_gives_minimal_body() {
        let body = service_body(&DeploymentConfig::default(), &target(), "img");
        assert_eq!(
            body,
            json!({ "template": { "containers": [{
                "image": "img",
                "env": [
                    { "name": "GOOGLE_PROJECT", "value": "p" },
                    { "name": "GOOGLE_LOCATION", "value": "us-central1" },
                    { "name": "GOBLET_SERVICE", "value": "svc" }
                ]
            }] } })
        );
    }

    #[test]
    fn configured_scope_env_is_kept() {
        let config: DeploymentConfig = serde_json::from_value(json!({
            "cloudrun_container": {
                "env": [{ "name": "GOOGLE_PROJECT", "value": "other" }]
            }
        }))
        .unwrap();

        let body = service_body(&config, &target(), "img");
        let env = &body["template"]["containers"][0]["env"];
        assert_eq!(env.as_array().unwrap().len(), 3);
        assert_eq!(env[0]["value"], "other");
        assert_eq!(env[1]["name"], "GOOGLE_LOCATION");
    }
}
