//! The Cloud Run service a deploy targets.

use goblet_schedule::JobScope;

use crate::error::ConfigError;

/// Repository Cloud Run source deploys push to by default.
pub const DEFAULT_REPOSITORY: &str = "cloud-run-source-deploy";

const MAX_SERVICE_NAME_LEN: usize = 49;

/// A named service inside a `(project, region)` scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    scope: JobScope,
    name: String,
}

impl Target {
    pub fn new(scope: JobScope, name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        validate_service_name(&name)?;
        Ok(Self { scope, name })
    }

    pub fn scope(&self) -> &JobScope {
        &self.scope
    }

    /// Jobs registered under `registry` must live where the service does.
    pub fn ensure_same_scope(&self, registry: &JobScope) -> Result<(), ConfigError> {
        if registry != &self.scope {
            return Err(ConfigError::ScopeMismatch {
                registry: registry.clone(),
                target: self.scope.clone(),
            });
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project(&self) -> &str {
        self.scope.project()
    }

    pub fn region(&self) -> &str {
        self.scope.region()
    }

    /// `projects/{project}/locations/{region}`
    pub fn parent(&self) -> String {
        self.scope.parent()
    }

    /// `projects/{project}/locations/{region}/services/{name}`
    pub fn service_path(&self) -> String {
        format!("{}/services/{}", self.scope.parent(), self.name)
    }

    /// `{region}-docker.pkg.dev/{project}/cloud-run-source-deploy/{name}`
    pub fn default_image(&self) -> String {
        format!(
            "{}-docker.pkg.dev/{}/{}/{}",
            self.region(),
            self.project(),
            DEFAULT_REPOSITORY,
            self.name
        )
    }

    /// Object-name prefix of uploaded source archives.
    pub fn source_prefix(&self) -> String {
        format!("goblet/{}/", self.name)
    }
}

fn validate_service_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidServiceName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_SERVICE_NAME_LEN {
        return Err(invalid("must be at most 49 characters"));
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid("must start with a lowercase letter"));
    }
    if name.ends_with('-') {
        return Err(invalid("must not end with a hyphen"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid("may only contain lowercase letters, digits and hyphens"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn scope() -> JobScope {
        JobScope::new("proj", "us-central1").unwrap()
    }

    #[test]
    fn derives_paths_and_default_image() {
        let target = Target::new(scope(), "svc").unwrap();
        assert_eq!(target.parent(), "projects/proj/locations/us-central1");
        assert_eq!(
            target.service_path(),
            "projects/proj/locations/us-central1/services/svc"
        );
        assert_eq!(
            target.default_image(),
            "us-central1-docker.pkg.dev/proj/cloud-run-source-deploy/svc"
        );
        assert_eq!(target.source_prefix(), "goblet/svc/");
    }

    #[rstest]
    #[case("")]
    #[case("Svc")]
    #[case("1svc")]
    #[case("svc-")]
    #[case("svc_name")]
    #[case("a-very-long-service-name-that-goes-beyond-the-limit")]
    fn rejects_invalid_service_names(#[case] name: &str) {
        assert!(matches!(
            Target::new(scope(), name),
            Err(ConfigError::InvalidServiceName { .. })
        ));
    }

    #[rstest]
    #[case("svc")]
    #[case("my-service-2")]
    fn accepts_valid_service_names(#[case] name: &str) {
        assert!(Target::new(scope(), name).is_ok());
    }
}
