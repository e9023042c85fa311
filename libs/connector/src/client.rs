use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::StatusCode;
use tokio::sync::Mutex;

use botgate_core::Activity;
use botgate_security::AppCredentials;

use crate::error::ConnectorError;
use crate::types::{ConversationParameters, ConversationResourceResponse, ResourceResponse};

const TOKEN_SCOPE: &str = "https://api.botframework.com/.default";
const DEFAULT_LOGIN_BASE: &str = "https://login.microsoftonline.com";
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Thin contract over the remote conversation API. One implementation per
/// transport; the dispatcher only sees this trait.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    async fn create_conversation(
        &self,
        params: ConversationParameters,
    ) -> Result<ConversationResourceResponse, ConnectorError>;
    async fn send_to_conversation(
        &self,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<ResourceResponse, ConnectorError>;
    async fn reply_to_activity(
        &self,
        conversation_id: &str,
        activity_id: &str,
        activity: &Activity,
    ) -> Result<ResourceResponse, ConnectorError>;
    async fn update_activity(
        &self,
        conversation_id: &str,
        activity_id: &str,
        activity: &Activity,
    ) -> Result<ResourceResponse, ConnectorError>;
    async fn delete_activity(
        &self,
        conversation_id: &str,
        activity_id: &str,
    ) -> Result<(), ConnectorError>;
}

/// Connector REST client bound to a single service URL and one credential
/// set. Bearer tokens are acquired lazily and cached until shortly before
/// expiry. A `mock://` service or login base short-circuits to canned
/// responses for tests and CI runs.
pub struct ConnectorClient {
    http: reqwest::Client,
    credentials: AppCredentials,
    service_url: String,
    login_base: String,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl ConnectorClient {
    pub fn new(
        http: reqwest::Client,
        credentials: AppCredentials,
        service_url: &str,
        login_base: Option<String>,
    ) -> Result<Self, ConnectorError> {
        let trimmed = service_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ConnectorError::Config("empty service url".into()));
        }
        Ok(Self {
            http,
            credentials,
            service_url: trimmed.to_string(),
            login_base: login_base.unwrap_or_else(|| DEFAULT_LOGIN_BASE.into()),
            token: Mutex::new(None),
        })
    }

    /// Service URL this client is bound to.
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    fn is_mock(&self) -> bool {
        self.service_url.starts_with("mock://")
    }

    fn conversations_url(&self) -> String {
        format!("{}/v3/conversations", self.service_url)
    }

    fn activities_url(&self, conversation_id: &str) -> String {
        format!(
            "{}/v3/conversations/{}/activities",
            self.service_url, conversation_id
        )
    }

    fn activity_url(&self, conversation_id: &str, activity_id: &str) -> String {
        format!(
            "{}/v3/conversations/{}/activities/{}",
            self.service_url, conversation_id, activity_id
        )
    }

    fn token_url(&self) -> String {
        format!(
            "{}/botframework.com/oauth2/v2.0/token",
            self.login_base.trim_end_matches('/')
        )
    }

    async fn token(&self) -> Result<Option<String>, ConnectorError> {
        if self.credentials.is_empty() {
            return Ok(None);
        }
        if self.login_base.starts_with("mock://") {
            return Ok(Some("mock-token".into()));
        }

        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(Some(cached.token.clone()));
            }
        }

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.app_id.as_str()),
            ("client_secret", self.credentials.app_password.as_str()),
            ("scope", TOKEN_SCOPE),
        ];
        let response = self
            .http
            .post(self.token_url())
            .form(&form)
            .send()
            .await
            .map_err(|err| transport("token", err))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| transport("token", err))?;
        if !status.is_success() {
            return Err(remote("token", status, None, body));
        }
        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|err| ConnectorError::Decode(format!("token response: {err}")))?;
        let token = value
            .get("access_token")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or_else(|| ConnectorError::Decode("access_token missing in response".into()))?;
        let expires_in = value
            .get("expires_in")
            .and_then(|v| v.as_u64())
            .unwrap_or(3600);
        *guard = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(expires_in)
                - TOKEN_EXPIRY_MARGIN.min(Duration::from_secs(expires_in)),
        });
        Ok(Some(token))
    }

    async fn execute(
        &self,
        endpoint: &'static str,
        builder: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, String), ConnectorError> {
        let builder = match self.token().await? {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let started = Instant::now();
        let response = builder.send().await.map_err(|err| {
            counter!(
                "connector_errors_total",
                "kind" => "transport",
                "endpoint" => endpoint
            )
            .increment(1);
            ConnectorError::Transport(err)
        })?;

        let status = response.status();
        histogram!(
            "connector_roundtrip_seconds",
            "endpoint" => endpoint,
            "status" => status.as_str().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        let retry_after = retry_after(&response);
        let body = response
            .text()
            .await
            .map_err(|err| transport(endpoint, err))?;
        if !status.is_success() {
            counter!(
                "connector_errors_total",
                "kind" => "remote",
                "endpoint" => endpoint
            )
            .increment(1);
            return Err(remote(endpoint, status, retry_after, body));
        }
        Ok((status, body))
    }
}

fn transport(endpoint: &'static str, err: reqwest::Error) -> ConnectorError {
    counter!(
        "connector_errors_total",
        "kind" => "transport",
        "endpoint" => endpoint
    )
    .increment(1);
    ConnectorError::Transport(err)
}

fn remote(
    endpoint: &'static str,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: String,
) -> ConnectorError {
    tracing::warn!(endpoint, status = status.as_u16(), "connector remote error");
    ConnectorError::Remote {
        status,
        retry_after,
        message: truncate_body(body),
    }
}

const MAX_MESSAGE_BYTES: usize = 512;

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_MESSAGE_BYTES {
        let mut end = MAX_MESSAGE_BYTES;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn parse_resource(body: &str) -> Result<ResourceResponse, ConnectorError> {
    if body.trim().is_empty() {
        return Ok(ResourceResponse::default());
    }
    serde_json::from_str(body).map_err(|err| ConnectorError::Decode(err.to_string()))
}

#[async_trait]
impl ChannelApi for ConnectorClient {
    async fn create_conversation(
        &self,
        params: ConversationParameters,
    ) -> Result<ConversationResourceResponse, ConnectorError> {
        if self.is_mock() {
            return Ok(ConversationResourceResponse {
                id: "mock-conversation".into(),
                activity_id: None,
                service_url: Some(self.service_url.clone()),
            });
        }
        let builder = self.http.post(self.conversations_url()).json(&params);
        let (_, body) = self.execute("conversations.create", builder).await?;
        serde_json::from_str(&body).map_err(|err| ConnectorError::Decode(err.to_string()))
    }

    async fn send_to_conversation(
        &self,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<ResourceResponse, ConnectorError> {
        if self.is_mock() {
            return Ok(ResourceResponse {
                id: Some(format!("mock:{conversation_id}")),
            });
        }
        let builder = self
            .http
            .post(self.activities_url(conversation_id))
            .json(activity);
        let (_, body) = self.execute("activities.send", builder).await?;
        parse_resource(&body)
    }

    async fn reply_to_activity(
        &self,
        conversation_id: &str,
        activity_id: &str,
        activity: &Activity,
    ) -> Result<ResourceResponse, ConnectorError> {
        if self.is_mock() {
            return Ok(ResourceResponse {
                id: Some(format!("mock:{conversation_id}:{activity_id}")),
            });
        }
        let builder = self
            .http
            .post(self.activity_url(conversation_id, activity_id))
            .json(activity);
        let (_, body) = self.execute("activities.reply", builder).await?;
        parse_resource(&body)
    }

    async fn update_activity(
        &self,
        conversation_id: &str,
        activity_id: &str,
        activity: &Activity,
    ) -> Result<ResourceResponse, ConnectorError> {
        if self.is_mock() {
            return Ok(ResourceResponse {
                id: Some(activity_id.to_string()),
            });
        }
        let builder = self
            .http
            .put(self.activity_url(conversation_id, activity_id))
            .json(activity);
        let (_, body) = self.execute("activities.update", builder).await?;
        parse_resource(&body)
    }

    async fn delete_activity(
        &self,
        conversation_id: &str,
        activity_id: &str,
    ) -> Result<(), ConnectorError> {
        if self.is_mock() {
            return Ok(());
        }
        let builder = self.http.delete(self.activity_url(conversation_id, activity_id));
        self.execute("activities.delete", builder).await?;
        Ok(())
    }
}

/// One recorded call against [`MockChannelApi`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub op: &'static str,
    pub conversation_id: String,
    pub activity: Option<Activity>,
    pub at: tokio::time::Instant,
}

/// In-memory [`ChannelApi`] that records every call; `fail_on` injects a
/// remote failure at the given call index.
pub struct MockChannelApi {
    pub calls: Mutex<Vec<RecordedCall>>,
    fail_on: Option<usize>,
}

impl MockChannelApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    /// Fails the call with the given zero-based index.
    pub fn failing_on(index: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(index),
        }
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    async fn record(
        &self,
        op: &'static str,
        conversation_id: &str,
        activity: Option<&Activity>,
    ) -> Result<(), ConnectorError> {
        let mut calls = self.calls.lock().await;
        let index = calls.len();
        calls.push(RecordedCall {
            op,
            conversation_id: conversation_id.to_string(),
            activity: activity.cloned(),
            at: tokio::time::Instant::now(),
        });
        if self.fail_on == Some(index) {
            return Err(ConnectorError::Remote {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                retry_after: None,
                message: "injected failure".into(),
            });
        }
        Ok(())
    }
}

impl Default for MockChannelApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelApi for MockChannelApi {
    async fn create_conversation(
        &self,
        params: ConversationParameters,
    ) -> Result<ConversationResourceResponse, ConnectorError> {
        self.record("create", "", params.activity.as_ref()).await?;
        Ok(ConversationResourceResponse {
            id: "mock-conversation".into(),
            activity_id: None,
            service_url: None,
        })
    }

    async fn send_to_conversation(
        &self,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<ResourceResponse, ConnectorError> {
        self.record("send", conversation_id, Some(activity)).await?;
        Ok(ResourceResponse {
            id: Some(format!("sent:{}", self.calls.lock().await.len())),
        })
    }

    async fn reply_to_activity(
        &self,
        conversation_id: &str,
        _activity_id: &str,
        activity: &Activity,
    ) -> Result<ResourceResponse, ConnectorError> {
        self.record("reply", conversation_id, Some(activity)).await?;
        Ok(ResourceResponse {
            id: Some(format!("sent:{}", self.calls.lock().await.len())),
        })
    }

    async fn update_activity(
        &self,
        conversation_id: &str,
        _activity_id: &str,
        activity: &Activity,
    ) -> Result<ResourceResponse, ConnectorError> {
        self.record("update", conversation_id, Some(activity)).await?;
        Ok(ResourceResponse::default())
    }

    async fn delete_activity(
        &self,
        conversation_id: &str,
        _activity_id: &str,
    ) -> Result<(), ConnectorError> {
        self.record("delete", conversation_id, None).await
    }
}
