use serde::{Deserialize, Serialize};

use crate::activity::{Activity, ChannelAccount, ConversationAccount};

/// Addressing captured from an inbound activity: the conversation, the
/// service URL that owns it, and the two parties. Immutable once obtained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    #[serde(default)]
    pub activity_id: Option<String>,
    /// The channel-side party of the inbound activity.
    #[serde(default)]
    pub user: Option<ChannelAccount>,
    /// The bot-side party of the inbound activity.
    #[serde(default)]
    pub bot: Option<ChannelAccount>,
    #[serde(default)]
    pub conversation: Option<ConversationAccount>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub service_url: Option<String>,
}

impl ConversationReference {
    /// Captures the reference from an inbound activity.
    pub fn from_activity(activity: &Activity) -> Self {
        Self {
            activity_id: if activity.id.trim().is_empty() {
                None
            } else {
                Some(activity.id.clone())
            },
            user: activity.from.clone(),
            bot: activity.recipient.clone(),
            conversation: activity.conversation.clone(),
            channel_id: activity.channel_id.clone(),
            service_url: activity.service_url.clone(),
        }
    }

    /// Stamps an outbound reply with this reference: conversation, service
    /// URL, channel id, swapped parties, and `replyToId`. Fields already set
    /// on the activity win.
    pub fn apply_as_reply(&self, activity: &mut Activity) {
        if activity.conversation.is_none() {
            activity.conversation = self.conversation.clone();
        }
        if activity.service_url.is_none() {
            activity.service_url = self.service_url.clone();
        }
        if activity.channel_id.is_none() {
            activity.channel_id = self.channel_id.clone();
        }
        if activity.from.is_none() {
            activity.from = self.bot.clone();
        }
        if activity.recipient.is_none() {
            activity.recipient = self.user.clone();
        }
        if activity.reply_to_id.is_none() {
            activity.reply_to_id = self.activity_id.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityKind;

    fn inbound() -> Activity {
        let mut activity = Activity::message("hello");
        activity.id = "act-7".into();
        activity.from = Some(ChannelAccount::new("user-1"));
        activity.recipient = Some(ChannelAccount::new("bot-1"));
        activity.conversation = Some(ConversationAccount::new("conv-9"));
        activity.channel_id = Some("msteams".into());
        activity.service_url = Some("https://smba.example/emea/".into());
        activity
    }

    #[test]
    fn captures_addressing_from_inbound() {
        let reference = ConversationReference::from_activity(&inbound());
        assert_eq!(reference.activity_id.as_deref(), Some("act-7"));
        assert_eq!(reference.user.as_ref().unwrap().id, "user-1");
        assert_eq!(reference.bot.as_ref().unwrap().id, "bot-1");
        assert_eq!(reference.conversation.as_ref().unwrap().id, "conv-9");
        assert_eq!(
            reference.service_url.as_deref(),
            Some("https://smba.example/emea/")
        );
    }

    #[test]
    fn reply_swaps_parties_and_sets_reply_to() {
        let reference = ConversationReference::from_activity(&inbound());
        let mut reply = Activity::message("You said: hello");
        reference.apply_as_reply(&mut reply);

        assert_eq!(reply.kind, ActivityKind::Message);
        assert_eq!(reply.from.as_ref().unwrap().id, "bot-1");
        assert_eq!(reply.recipient.as_ref().unwrap().id, "user-1");
        assert_eq!(reply.conversation.as_ref().unwrap().id, "conv-9");
        assert_eq!(reply.reply_to_id.as_deref(), Some("act-7"));
        assert_eq!(
            reply.service_url.as_deref(),
            Some("https://smba.example/emea/")
        );
    }

    #[test]
    fn reply_preserves_explicit_addressing() {
        let reference = ConversationReference::from_activity(&inbound());
        let mut reply = Activity::message("elsewhere");
        reply.conversation = Some(ConversationAccount::new("conv-other"));
        reply.service_url = Some("https://other.example/".into());
        reference.apply_as_reply(&mut reply);

        assert_eq!(reply.conversation.as_ref().unwrap().id, "conv-other");
        assert_eq!(reply.service_url.as_deref(), Some("https://other.example/"));
    }
}
