//! Job descriptors and their scheduler wire shape.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// Header naming the kind of trigger that invoked the application.
pub const TYPE_HEADER: &str = "X-Goblet-Type";

/// Header naming the handler a trigger is addressed to.
pub const NAME_HEADER: &str = "X-Goblet-Name";

/// Value of [`TYPE_HEADER`] for scheduler invocations.
pub const SCHEDULE_TYPE: &str = "schedule";

/// Timezone used when a registration does not name one.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Maximum job id length accepted by Cloud Scheduler.
const MAX_NAME_LENGTH: usize = 500;

/// Project and region a job lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobScope {
    project: String,
    region: String,
}

impl JobScope {
    /// Create a scope. Both parts must be non-empty.
    pub fn new(
        project: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, ScheduleError> {
        let project = project.into();
        let region = region.into();

        if project.trim().is_empty() {
            return Err(ScheduleError::EmptyScope { field: "project" });
        }
        if region.trim().is_empty() {
            return Err(ScheduleError::EmptyScope { field: "region" });
        }

        Ok(Self { project, region })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// `projects/{project}/locations/{region}`
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.region)
    }

    /// Fully-qualified resource path of the job called `name`.
    pub fn job_path(&self, name: &str) -> String {
        format!("{}/jobs/{}", self.parent(), name)
    }
}

impl fmt::Display for JobScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.region)
    }
}

/// HTTP method the scheduler uses to invoke the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OIDC identity token the scheduler attaches to each invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcToken {
    /// Service account the token is minted for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_email: Option<String>,

    /// Token audience. Defaults to the target URI at deploy time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

impl OidcToken {
    /// Token minted for `email`, audience left to the deploy step.
    pub fn for_service_account(email: impl Into<String>) -> Self {
        Self {
            service_account_email: Some(email.into()),
            audience: None,
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

/// Optional settings for a schedule registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleOptions {
    /// Free-text description.
    pub description: String,

    /// IANA timezone name. `UTC` when unset.
    pub timezone: Option<String>,

    /// Extra headers sent with each invocation.
    pub headers: BTreeMap<String, String>,

    /// Invocation method.
    pub http_method: HttpMethod,

    /// Identity token placeholder. Serialized as `{}` when unset.
    pub auth: Option<OidcToken>,
}

impl ScheduleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn http_method(mut self, method: HttpMethod) -> Self {
        self.http_method = method;
        self
    }

    pub fn auth(mut self, token: OidcToken) -> Self {
        self.auth = Some(token);
        self
    }
}

/// One scheduled trigger.
///
/// The resource path is never stored; it is recomputed from the scope and
/// name so the two cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    scope: JobScope,
    name: String,
    schedule: String,
    time_zone: String,
    description: String,
    /// Caller headers, protocol headers already removed.
    headers: BTreeMap<String, String>,
    http_method: HttpMethod,
    auth: Option<OidcToken>,
}

impl JobDescriptor {
    /// Build a descriptor.
    ///
    /// The cron expression is forwarded verbatim; the scheduler is the one
    /// that rejects malformed expressions.
    pub fn new(
        scope: JobScope,
        name: impl Into<String>,
        schedule: impl Into<String>,
        options: ScheduleOptions,
    ) -> Result<Self, ScheduleError> {
        let name = name.into();
        validate_name(&name)?;

        let ScheduleOptions {
            description,
            timezone,
            headers,
            http_method,
            auth,
        } = options;

        let time_zone = timezone
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

        // Protocol headers always win over caller headers of the same name.
        let headers = headers
            .into_iter()
            .filter(|(key, _)| !is_protocol_header(key))
            .collect();

        Ok(Self {
            scope,
            name,
            schedule: schedule.into(),
            time_zone,
            description,
            headers,
            http_method,
            auth,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &JobScope {
        &self.scope
    }

    /// `projects/{project}/locations/{region}/jobs/{name}`
    pub fn resource_path(&self) -> String {
        self.scope.job_path(&self.name)
    }

    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn auth(&self) -> Option<&OidcToken> {
        self.auth.as_ref()
    }

    /// All invocation headers in wire order.
    pub fn headers(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::with_capacity(self.headers.len() + 2);
        out.push((TYPE_HEADER, SCHEDULE_TYPE));
        out.push((NAME_HEADER, self.name.as_str()));
        out.extend(self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        out
    }

    /// The request body sent when the job is deployed against `uri`.
    ///
    /// A registered token without an email falls back to
    /// `default_service_account`; a token without an audience gets `uri`.
    /// When no service account is known the token is omitted.
    pub fn targeted<'a>(
        &'a self,
        uri: &'a str,
        default_service_account: Option<&str>,
    ) -> TargetedJob<'a> {
        let registered = self.auth.clone().unwrap_or_default();

        let email = registered
            .service_account_email
            .or_else(|| default_service_account.map(str::to_string));

        let oidc_token = email.map(|email| OidcToken {
            service_account_email: Some(email),
            audience: Some(registered.audience.unwrap_or_else(|| uri.to_string())),
        });

        TargetedJob {
            descriptor: self,
            uri,
            oidc_token,
        }
    }

    fn wire<'a>(
        &'a self,
        uri: Option<&'a str>,
        oidc_token: Option<Cow<'a, OidcToken>>,
    ) -> JobWire<'a> {
        JobWire {
            name: self.resource_path(),
            schedule: &self.schedule,
            time_zone: &self.time_zone,
            description: &self.description,
            http_target: HttpTargetWire {
                uri,
                headers: HeaderWire {
                    name: &self.name,
                    extra: &self.headers,
                },
                http_method: self.http_method,
                oidc_token,
            },
        }
    }
}

impl Serialize for JobDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let token = match &self.auth {
            Some(token) => Cow::Borrowed(token),
            None => Cow::Owned(OidcToken::default()),
        };
        self.wire(None, Some(token)).serialize(serializer)
    }
}

/// A descriptor bound to a deployed target URI.
#[derive(Debug, Clone)]
pub struct TargetedJob<'a> {
    descriptor: &'a JobDescriptor,
    uri: &'a str,
    oidc_token: Option<OidcToken>,
}

impl<'a> TargetedJob<'a> {
    pub fn descriptor(&self) -> &'a JobDescriptor {
        self.descriptor
    }

    pub fn uri(&self) -> &'a str {
        self.uri
    }

    pub fn oidc_token(&self) -> Option<&OidcToken> {
        self.oidc_token.as_ref()
    }
}

impl Serialize for TargetedJob<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.descriptor
            .wire(Some(self.uri), self.oidc_token.as_ref().map(Cow::Borrowed))
            .serialize(serializer)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobWire<'a> {
    name: String,
    schedule: &'a str,
    time_zone: &'a str,
    description: &'a str,
    http_target: HttpTargetWire<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpTargetWire<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<&'a str>,
    headers: HeaderWire<'a>,
    http_method: HttpMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    oidc_token: Option<Cow<'a, OidcToken>>,
}

/// Protocol headers first, then caller headers in key order.
struct HeaderWire<'a> {
    name: &'a str,
    extra: &'a BTreeMap<String, String>,
}

impl Serialize for HeaderWire<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.extra.len() + 2))?;
        map.serialize_entry(TYPE_HEADER, SCHEDULE_TYPE)?;
        map.serialize_entry(NAME_HEADER, self.name)?;
        for (key, value) in self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn is_protocol_header(key: &str) -> bool {
    key.eq_ignore_ascii_case(TYPE_HEADER) || key.eq_ignore_ascii_case(NAME_HEADER)
}

fn validate_name(name: &str) -> Result<(), ScheduleError> {
    if name.is_empty() {
        return Err(ScheduleError::EmptyName);
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ScheduleError::InvalidName {
            name: name.to_string(),
            reason: format!("longer than {MAX_NAME_LENGTH} characters"),
        });
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(ScheduleError::InvalidName {
            name: name.to_string(),
            reason: format!("character '{c}' is not allowed"),
        });
    }
    Ok(())
}
