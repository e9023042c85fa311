use std::sync::Arc;

use async_trait::async_trait;

use botgate_connector::{DispatchError, OutboundDispatcher, ResourceResponse};
use botgate_core::{Activity, ConversationReference};

/// The receive-handler supplied by the embedding application. Registered
/// exactly once per adapter instance.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn on_turn(&self, turn: &TurnContext) -> anyhow::Result<()>;
}

/// One inbound activity plus the means to answer it. Replies sent through
/// the turn are stamped with the inbound conversation reference before
/// dispatch, so a handler can answer without spelling out addressing.
pub struct TurnContext {
    activity: Activity,
    reference: ConversationReference,
    dispatcher: Arc<OutboundDispatcher>,
}

impl TurnContext {
    pub fn new(activity: Activity, dispatcher: Arc<OutboundDispatcher>) -> Self {
        let reference = ConversationReference::from_activity(&activity);
        Self {
            activity,
            reference,
            dispatcher,
        }
    }

    /// The parsed inbound activity.
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Addressing captured from the inbound activity.
    pub fn reference(&self) -> &ConversationReference {
        &self.reference
    }

    /// Builds a message reply addressed back at the sender.
    pub fn make_reply(&self, text: impl Into<String>) -> Activity {
        let mut reply = Activity::message(text);
        self.reference.apply_as_reply(&mut reply);
        reply
    }

    /// Sends a single activity; unaddressed fields are filled in from the
    /// inbound reference.
    pub async fn send_activity(
        &self,
        activity: Activity,
    ) -> Result<ResourceResponse, DispatchError> {
        let mut responses = self.send_activities(vec![activity]).await?;
        Ok(responses.pop().unwrap_or_default())
    }

    /// Sends an ordered batch of activities through the dispatcher,
    /// preserving order. Dispatch failures surface here, independent of the
    /// inbound request lifecycle.
    pub async fn send_activities(
        &self,
        activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>, DispatchError> {
        let mut stamped = activities;
        for activity in &mut stamped {
            self.reference.apply_as_reply(activity);
        }
        self.dispatcher.post(&stamped).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botgate_connector::{FixedClientFactory, MockChannelApi};
    use botgate_core::{ChannelAccount, ConversationAccount};

    fn inbound() -> Activity {
        let mut activity = Activity::message("ping");
        activity.id = "act-1".into();
        activity.from = Some(ChannelAccount::new("user-1"));
        activity.recipient = Some(ChannelAccount::new("bot-1"));
        activity.conversation = Some(ConversationAccount::new("conv-1"));
        activity.service_url = Some("https://c.example".into());
        activity
    }

    fn turn(client: Arc<MockChannelApi>) -> TurnContext {
        let dispatcher = OutboundDispatcher::new(Arc::new(FixedClientFactory::new(client)));
        TurnContext::new(inbound(), Arc::new(dispatcher))
    }

    #[tokio::test]
    async fn replies_are_stamped_from_the_inbound_reference() {
        let client = Arc::new(MockChannelApi::new());
        let turn = turn(client.clone());

        let reply = turn.make_reply("pong");
        turn.send_activity(reply).await.expect("send");

        let calls = client.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].conversation_id, "conv-1");
        let sent = calls[0].activity.as_ref().unwrap();
        assert_eq!(sent.recipient.as_ref().unwrap().id, "user-1");
        assert_eq!(sent.reply_to_id.as_deref(), Some("act-1"));
    }

    #[tokio::test]
    async fn batch_order_is_preserved() {
        let client = Arc::new(MockChannelApi::new());
        let turn = turn(client.clone());

        turn.send_activities(vec![turn.make_reply("one"), turn.make_reply("two")])
            .await
            .expect("send");

        let calls = client.calls.lock().await;
        let texts: Vec<_> = calls
            .iter()
            .map(|call| call.activity.as_ref().unwrap().text.clone().unwrap())
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
    }
}
