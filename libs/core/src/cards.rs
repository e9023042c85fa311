use serde::{Deserialize, Serialize};

use crate::activity::Attachment;

/// Content type of a hero card attachment.
pub const HERO_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.hero";

/// Hero card payload: a large image, title, text, and action buttons.
///
/// ```
/// use botgate_core::{CardAction, CardImage, HeroCard};
///
/// let card = HeroCard {
///     title: Some("BotGate Hero Card".into()),
///     subtitle: None,
///     text: Some("A sample card".into()),
///     images: vec![CardImage { url: "https://example.com/logo.png".into(), alt: None }],
///     buttons: vec![CardAction::open_url("Get started", "https://example.com/docs")],
/// };
/// assert_eq!(card.buttons.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HeroCard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub images: Vec<CardImage>,
    #[serde(default)]
    pub buttons: Vec<CardAction>,
}

impl HeroCard {
    /// Wraps the card in an activity attachment.
    pub fn into_attachment(self) -> Attachment {
        Attachment {
            content_type: HERO_CARD_CONTENT_TYPE.into(),
            content: serde_json::to_value(&self).unwrap_or(serde_json::Value::Null),
            content_url: None,
            name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub value: String,
}

impl CardAction {
    /// Button that opens an URL when invoked.
    pub fn open_url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: "openUrl".into(),
            title: title.into(),
            value: url.into(),
        }
    }

    /// Button that posts its value back as a message.
    pub fn im_back(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: "imBack".into(),
            title: title.into(),
            value: value.into(),
        }
    }
}
