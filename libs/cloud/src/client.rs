//! HTTP client for provider API communication.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{IntoUrl, Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::auth::AccessToken;
use crate::error::CloudError;

/// The provider APIs the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiService {
    CloudBuild,
    Run,
    Scheduler,
    Storage,
    ArtifactRegistry,
}

impl ApiService {
    pub fn name(&self) -> &'static str {
        match self {
            ApiService::CloudBuild => "cloudbuild",
            ApiService::Run => "run",
            ApiService::Scheduler => "cloudscheduler",
            ApiService::Storage => "storage",
            ApiService::ArtifactRegistry => "artifactregistry",
        }
    }
}

/// Base URLs of each API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub cloudbuild: String,
    pub run: String,
    pub scheduler: String,
    pub storage: String,
    pub artifact_registry: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            cloudbuild: "https://cloudbuild.googleapis.com".to_string(),
            run: "https://run.googleapis.com".to_string(),
            scheduler: "https://cloudscheduler.googleapis.com".to_string(),
            storage: "https://storage.googleapis.com".to_string(),
            artifact_registry: "https://artifactregistry.googleapis.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Route every API to the same base URL (emulators, tests).
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            cloudbuild: base.clone(),
            run: base.clone(),
            scheduler: base.clone(),
            storage: base.clone(),
            artifact_registry: base,
        }
    }

    pub fn base(&self, service: ApiService) -> &str {
        match service {
            ApiService::CloudBuild => &self.cloudbuild,
            ApiService::Run => &self.run,
            ApiService::Scheduler => &self.scheduler,
            ApiService::Storage => &self.storage,
            ApiService::ArtifactRegistry => &self.artifact_registry,
        }
    }
}

/// Long-running operation polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two polls.
    pub interval: Duration,

    /// Give up once an operation has been pending this long.
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(30 * 60),
        }
    }
}

/// Authenticated client for the provider APIs.
#[derive(Debug, Clone)]
pub struct GcpClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    poll: PollConfig,
}

impl GcpClient {
    /// Create a client that sends `token` with every request.
    pub fn new(token: &AccessToken, endpoints: Endpoints) -> Result<Self, CloudError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.secret()))
            .map_err(|_| CloudError::Auth("invalid token format".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("goblet/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoints,
            poll: PollConfig::default(),
        })
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    /// Build a URL for `path` on `service`.
    pub(crate) fn url(&self, service: ApiService, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoints.base(service).trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Build a URL from path segments, percent-encoding each one.
    ///
    /// Needed where a segment may itself contain `/` (object names).
    pub(crate) fn segments_url(
        &self,
        service: ApiService,
        segments: &[&str],
    ) -> Result<Url, CloudError> {
        let base = self.endpoints.base(service);
        let mut url = Url::parse(base).map_err(|e| CloudError::InvalidUrl(e.to_string()))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| CloudError::InvalidUrl(base.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    pub(crate) fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.http.request(method, url)
    }

    /// Make a GET request.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        service: ApiService,
        url: impl IntoUrl,
    ) -> Result<T, CloudError> {
        self.send(service, self.request(Method::GET, url)).await
    }

    /// Make a POST request with a JSON body.
    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        service: ApiService,
        url: impl IntoUrl,
        body: &B,
    ) -> Result<T, CloudError> {
        self.send(service, self.request(Method::POST, url).json(body))
            .await
    }

    /// Make a PATCH request with a JSON body.
    pub(crate) async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        service: ApiService,
        url: impl IntoUrl,
        body: &B,
    ) -> Result<T, CloudError> {
        self.send(service, self.request(Method::PATCH, url).json(body))
            .await
    }

    /// Make a DELETE request.
    pub(crate) async fn delete<T: DeserializeOwned>(
        &self,
        service: ApiService,
        url: impl IntoUrl,
    ) -> Result<T, CloudError> {
        self.send(service, self.request(Method::DELETE, url)).await
    }

    /// Send a prepared request and decode the response.
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        service: ApiService,
        request: RequestBuilder,
    ) -> Result<T, CloudError> {
        let response = request.send().await?;
        debug!(
            api = service.name(),
            status = response.status().as_u16(),
            url = %response.url(),
            "Provider response"
        );
        self.handle_response(service, response).await
    }

    /// Handle a successful or error response.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        service: ApiService,
        response: reqwest::Response,
    ) -> Result<T, CloudError> {
        if !response.status().is_success() {
            return self.handle_error(service, response).await;
        }

        let bytes = response.bytes().await?;
        // Deletes answer with an empty body.
        let body: &[u8] = if bytes.is_empty() { b"{}" } else { &bytes };

        serde_json::from_slice(body).map_err(|e| CloudError::Decode {
            service: service.name(),
            message: e.to_string(),
        })
    }

    /// Handle an error response.
    async fn handle_error<T>(
        &self,
        service: ApiService,
        response: reqwest::Response,
    ) -> Result<T, CloudError> {
        let status = response.status().as_u16();
        if status == 401 {
            return Err(CloudError::Unauthenticated {
                service: service.name(),
            });
        }

        let body = response.text().await.unwrap_or_default();

        // Google APIs wrap errors as {"error": {"code", "message", "status"}}.
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => (envelope.error.status, envelope.error.message),
            Err(_) if body.trim().is_empty() => (String::new(), "unknown error".to_string()),
            Err(_) => (String::new(), body.trim().to_string()),
        };

        Err(CloudError::api(service.name(), status, code, message))
    }
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Response body of calls that return `google.protobuf.Empty`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Empty {}
