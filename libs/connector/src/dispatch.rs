use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use botgate_core::{Activity, ActivityKind};
use botgate_security::AppCredentials;

use crate::client::{ChannelApi, ConnectorClient};
use crate::error::{ConnectorError, DispatchError};
use crate::types::ResourceResponse;

/// Builds a channel client for a service URL. One client per distinct URL;
/// a factory owns exactly one credential set, so no client is ever shared
/// across credentials.
pub trait ChannelClientFactory: Send + Sync {
    fn client_for(&self, service_url: &str) -> Result<Arc<dyn ChannelApi>, ConnectorError>;
}

/// Default factory producing [`ConnectorClient`] instances over a shared
/// HTTP connection pool.
pub struct ConnectorClientFactory {
    http: reqwest::Client,
    credentials: AppCredentials,
    login_base: Option<String>,
}

impl ConnectorClientFactory {
    pub fn new(
        http: reqwest::Client,
        credentials: AppCredentials,
        login_base: Option<String>,
    ) -> Self {
        Self {
            http,
            credentials,
            login_base,
        }
    }
}

impl ChannelClientFactory for ConnectorClientFactory {
    fn client_for(&self, service_url: &str) -> Result<Arc<dyn ChannelApi>, ConnectorError> {
        Ok(Arc::new(ConnectorClient::new(
            self.http.clone(),
            self.credentials.clone(),
            service_url,
            self.login_base.clone(),
        )?))
    }
}

/// Factory handing out the same client for every service URL. Test seam.
pub struct FixedClientFactory {
    client: Arc<dyn ChannelApi>,
}

impl FixedClientFactory {
    pub fn new(client: Arc<dyn ChannelApi>) -> Self {
        Self { client }
    }
}

impl ChannelClientFactory for FixedClientFactory {
    fn client_for(&self, _service_url: &str) -> Result<Arc<dyn ChannelApi>, ConnectorError> {
        Ok(self.client.clone())
    }
}

/// Posts an ordered batch of activities to the channel.
///
/// Activities are processed strictly in input order; activity *i+1* never
/// starts before *i*'s remote call (or delay) has completed, so the channel
/// observes replies in the order the bot generated them.
pub struct OutboundDispatcher {
    factory: Arc<dyn ChannelClientFactory>,
}

impl OutboundDispatcher {
    pub fn new(factory: Arc<dyn ChannelClientFactory>) -> Self {
        Self { factory }
    }

    /// Sends each activity in order, collecting per-activity responses.
    ///
    /// `delay` activities pause the batch for `value` milliseconds (default
    /// 1 when unspecified or non-positive) and record an empty response.
    /// The first remote failure aborts the whole batch; collected partial
    /// results are discarded. At most one delivery attempt per activity.
    pub async fn post(
        &self,
        activities: &[Activity],
    ) -> Result<Vec<ResourceResponse>, DispatchError> {
        // Client cache scoped to this call, rebuilt lazily per service URL.
        let mut clients: HashMap<String, Arc<dyn ChannelApi>> = HashMap::new();
        let mut responses = Vec::with_capacity(activities.len());

        for activity in activities {
            if activity.kind == ActivityKind::Delay {
                tokio::time::sleep(Duration::from_millis(delay_ms(activity))).await;
                responses.push(ResourceResponse::default());
                continue;
            }

            let service_url = activity
                .service_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .ok_or(DispatchError::MissingServiceUrl)?;
            let conversation_id = activity
                .conversation_id()
                .ok_or(DispatchError::MissingConversationId)?;

            let client = match clients.get(service_url) {
                Some(client) => client.clone(),
                None => {
                    let client = self
                        .factory
                        .client_for(service_url)
                        .map_err(DispatchError::Client)?;
                    clients.insert(service_url.to_string(), client.clone());
                    client
                }
            };

            let response = match activity.reply_to_id.as_deref() {
                Some(reply_to) => {
                    client
                        .reply_to_activity(conversation_id, reply_to, activity)
                        .await
                }
                None => client.send_to_conversation(conversation_id, activity).await,
            }
            .map_err(DispatchError::Remote)?;

            tracing::debug!(
                conversation = %conversation_id,
                kind = activity.kind.as_str(),
                "activity dispatched"
            );
            responses.push(response);
        }

        Ok(responses)
    }
}

fn delay_ms(activity: &Activity) -> u64 {
    let requested = activity
        .value
        .as_ref()
        .and_then(|value| {
            value
                .as_i64()
                .or_else(|| value.as_f64().map(|ms| ms as i64))
        })
        .unwrap_or(0);
    if requested > 0 { requested as u64 } else { 1 }
}
