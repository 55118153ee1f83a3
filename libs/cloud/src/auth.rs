//! Access tokens.

use std::fmt;

use tokio::process::Command;
use tracing::debug;

use crate::error::CloudError;

/// OAuth2 bearer token sent with every provider call.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Result<Self, CloudError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(CloudError::Auth("access token is empty".to_string()));
        }
        Ok(Self(token))
    }

    /// Use `explicit` when given, otherwise ask the gcloud CLI.
    pub async fn resolve(explicit: Option<String>) -> Result<Self, CloudError> {
        match explicit {
            Some(token) => Self::new(token),
            None => Self::from_gcloud().await,
        }
    }

    /// Print a token for the active gcloud account.
    pub async fn from_gcloud() -> Result<Self, CloudError> {
        debug!("Requesting access token from gcloud");

        let output = Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| CloudError::Auth(format!("failed to run gcloud: {e}")))?;

        if !output.status.success() {
            return Err(CloudError::Auth(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Self::new(String::from_utf8_lossy(&output.stdout).to_string())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}
