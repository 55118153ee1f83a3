//! Long-running operations.

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::client::{ApiService, GcpClient};
use crate::error::CloudError;

/// `google.longrunning.Operation`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    pub name: String,

    #[serde(default)]
    pub done: bool,

    #[serde(default)]
    pub error: Option<Status>,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,

    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

/// `google.rpc.Status`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,

    #[serde(default)]
    pub message: String,
}

impl Operation {
    /// Turn an error status into [`CloudError::OperationFailed`].
    pub fn check(self) -> Result<Self, CloudError> {
        match &self.error {
            Some(status) if status.code != 0 => Err(CloudError::OperationFailed {
                name: self.name.clone(),
                code: status.code,
                message: status.message.clone(),
            }),
            _ => Ok(self),
        }
    }

    /// Decode the operation's response payload.
    pub fn response_as<T: DeserializeOwned>(&self) -> Result<Option<T>, CloudError> {
        decode_field(self.response.as_ref())
    }

    /// Decode one field of the operation's metadata.
    pub fn metadata_field<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, CloudError> {
        decode_field(self.metadata.as_ref().and_then(|m| m.get(field)))
    }
}

fn decode_field<T: DeserializeOwned>(
    value: Option<&serde_json::Value>,
) -> Result<Option<T>, CloudError> {
    value
        .map(|v| {
            serde_json::from_value(v.clone()).map_err(|e| CloudError::Decode {
                service: "operation",
                message: e.to_string(),
            })
        })
        .transpose()
}

impl GcpClient {
    /// Poll `operation` until it is done, without inspecting its status.
    pub async fn poll_operation(
        &self,
        service: ApiService,
        api_version: &str,
        operation: Operation,
    ) -> Result<Operation, CloudError> {
        let poll = self.poll_config();
        let started = Instant::now();
        let mut operation = operation;

        while !operation.done {
            if started.elapsed() >= poll.max_wait {
                return Err(CloudError::OperationTimeout {
                    name: operation.name,
                    waited_secs: started.elapsed().as_secs(),
                });
            }

            tokio::time::sleep(poll.interval).await;

            let url = self.url(service, &format!("{}/{}", api_version, operation.name));
            operation = self.get(service, url).await?;
            debug!(
                operation = %operation.name,
                done = operation.done,
                "Polled operation"
            );
        }

        Ok(operation)
    }

    /// Poll `operation` until it is done and fail on an error status.
    pub async fn wait_operation(
        &self,
        service: ApiService,
        api_version: &str,
        operation: Operation,
    ) -> Result<Operation, CloudError> {
        self.poll_operation(service, api_version, operation)
            .await?
            .check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_reports_error_status() {
        let op = Operation {
            name: "operations/1".to_string(),
            done: true,
            error: Some(Status {
                code: 2,
                message: "Build failed".to_string(),
            }),
            ..Default::default()
        };

        match op.check() {
            Err(CloudError::OperationFailed { name, code, message }) => {
                assert_eq!(name, "operations/1");
                assert_eq!(code, 2);
                assert_eq!(message, "Build failed");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn zero_status_is_success() {
        let op = Operation {
            name: "operations/2".to_string(),
            done: true,
            error: Some(Status::default()),
            ..Default::default()
        };
        assert!(op.check().is_ok());
    }

    #[test]
    fn metadata_field_is_decoded() {
        let op = Operation {
            name: "operations/3".to_string(),
            metadata: Some(serde_json::json!({ "build": { "id": "b-1" } })),
            ..Default::default()
        };
        let build: Option<serde_json::Value> = op.metadata_field("build").unwrap();
        assert_eq!(build.unwrap()["id"], "b-1");
        assert!(op
            .metadata_field::<serde_json::Value>("missing")
            .unwrap()
            .is_none());
    }
}
