use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Activity kinds understood by the gateway (kept small and stable).
///
/// New kinds are a compile-time-checked addition; payloads with a type tag
/// we do not know fold into [`ActivityKind::Other`] instead of failing the
/// whole envelope.
///
/// ```
/// use botgate_core::ActivityKind;
///
/// let kind: ActivityKind = serde_json::from_str("\"conversationUpdate\"").unwrap();
/// assert_eq!(kind, ActivityKind::ConversationUpdate);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    Message,
    ConversationUpdate,
    ContactRelationUpdate,
    Typing,
    EndOfConversation,
    Event,
    /// Scheduling primitive: wait `value` milliseconds before the next send.
    Delay,
    #[serde(other)]
    Other,
}

impl ActivityKind {
    /// Returns the camelCase wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Message => "message",
            ActivityKind::ConversationUpdate => "conversationUpdate",
            ActivityKind::ContactRelationUpdate => "contactRelationUpdate",
            ActivityKind::Typing => "typing",
            ActivityKind::EndOfConversation => "endOfConversation",
            ActivityKind::Event => "event",
            ActivityKind::Delay => "delay",
            ActivityKind::Other => "other",
        }
    }
}

/// Bot Framework activity envelope.
///
/// Inbound activities are parsed from the channel's HTTP POST; outbound
/// activities are assembled by the receive-handler and posted back through
/// the dispatcher. Activities are transient: created, consumed once,
/// discarded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Assigned by the remote endpoint on creation; empty until then.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default)]
    pub from: Option<ChannelAccount>,
    #[serde(default)]
    pub recipient: Option<ChannelAccount>,
    #[serde(default)]
    pub conversation: Option<ConversationAccount>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// For `delay` activities this carries the milliseconds to wait.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub members_added: Vec<ChannelAccount>,
    #[serde(default)]
    pub reply_to_id: Option<String>,
    /// Base address of the remote endpoint that owns the conversation.
    #[serde(default)]
    pub service_url: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub channel_data: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Activity {
    /// Creates a new activity of the provided kind with an empty payload.
    pub fn new(kind: ActivityKind) -> Self {
        Self {
            id: String::new(),
            kind,
            timestamp: None,
            from: None,
            recipient: None,
            conversation: None,
            text: None,
            attachments: Vec::new(),
            value: None,
            members_added: Vec::new(),
            reply_to_id: None,
            service_url: None,
            channel_id: None,
            locale: None,
            channel_data: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Creates a message activity carrying the provided text.
    pub fn message(text: impl Into<String>) -> Self {
        let mut activity = Self::new(ActivityKind::Message);
        activity.text = Some(text.into());
        activity
    }

    /// Creates a delay activity that pauses the outbound batch.
    pub fn delay(milliseconds: u64) -> Self {
        let mut activity = Self::new(ActivityKind::Delay);
        activity.value = Some(serde_json::Value::from(milliseconds));
        activity
    }

    /// Attaches a payload and returns the activity for chaining.
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Fills in the fields the channel expects on every activity.
    pub fn ensure_defaults(&mut self) {
        if self.id.trim().is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(OffsetDateTime::now_utc());
        }
    }

    /// Conversation id, when addressed.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .map(|c| c.id.as_str())
            .filter(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            role: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Attachment carried by an activity: a card payload or an external URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Attachment {
    /// Image attachment referenced by URL.
    pub fn image(content_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            content: serde_json::Value::Null,
            content_url: Some(url.into()),
            name: None,
        }
    }
}
