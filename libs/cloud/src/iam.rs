//! IAM policies.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{ApiService, GcpClient};
use crate::error::CloudError;

/// `google.iam.v1.Binding`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,

    #[serde(default)]
    pub members: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

/// `google.iam.v1.Policy`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub bindings: Vec<Binding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

#[derive(Debug, Serialize)]
struct SetIamPolicyRequest<'a> {
    policy: &'a Policy,
}

impl GcpClient {
    /// Replace the IAM policy of `resource`.
    ///
    /// The binding list is replaced as a whole; nothing is merged with the
    /// existing policy.
    pub async fn set_iam_policy(
        &self,
        service: ApiService,
        api_version: &str,
        resource: &str,
        policy: &Policy,
    ) -> Result<Policy, CloudError> {
        let url = self.url(service, &format!("{api_version}/{resource}:setIamPolicy"));
        let applied: Policy = self
            .post(service, url, &SetIamPolicyRequest { policy })
            .await?;
        info!(
            resource,
            bindings = applied.bindings.len(),
            "Applied IAM policy"
        );
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wraps_policy() {
        let policy = Policy {
            bindings: vec![Binding {
                role: "roles/run.invoker".to_string(),
                members: vec!["allUsers".to_string()],
                condition: None,
            }],
            etag: None,
        };
        let body = serde_json::to_value(SetIamPolicyRequest { policy: &policy }).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "policy": {
                    "bindings": [{ "role": "roles/run.invoker", "members": ["allUsers"] }]
                }
            })
        );
    }
}
