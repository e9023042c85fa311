use async_trait::async_trait;

use botgate_adapter::{ActivityHandler, TurnContext};
use botgate_core::{Activity, ActivityKind, Attachment, CardAction, CardImage, HeroCard};

const LOGO_URL: &str = "https://docs.example.com/images/botgate-logo.png";
const ARCHITECTURE_URL: &str = "https://docs.example.com/images/botgate-architecture.png";
const DOCS_URL: &str = "https://docs.example.com/botgate";

pub struct EchoBot;

#[async_trait]
impl ActivityHandler for EchoBot {
    async fn on_turn(&self, turn: &TurnContext) -> anyhow::Result<()> {
        let activity = turn.activity();
        match activity.kind {
            ActivityKind::Message => {
                let reply = reply_for(activity.text.as_deref().unwrap_or_default());
                turn.send_activity(reply).await?;
            }
            ActivityKind::ConversationUpdate => {
                let greetings = welcome_activities(activity);
                if !greetings.is_empty() {
                    turn.send_activities(greetings).await?;
                }
            }
            ActivityKind::ContactRelationUpdate
            | ActivityKind::Typing
            | ActivityKind::EndOfConversation
            | ActivityKind::Event
            | ActivityKind::Delay
            | ActivityKind::Other => {}
        }
        Ok(())
    }
}

/// Builds the unaddressed reply for a message; the turn stamps addressing.
fn reply_for(text: &str) -> Activity {
    let lowered = text.to_lowercase();
    if lowered.contains("hero card") {
        hero_card_reply()
    } else if lowered.contains("image") {
        image_reply()
    } else {
        Activity::message(format!("You said: {text}"))
    }
}

fn hero_card_reply() -> Activity {
    let card = HeroCard {
        title: Some("BotGate Hero Card".into()),
        subtitle: None,
        text: Some("Build chat bots that speak the Bot Framework activity protocol.".into()),
        images: vec![CardImage {
            url: LOGO_URL.into(),
            alt: Some("botgate logo".into()),
        }],
        buttons: vec![CardAction::open_url("Get started", DOCS_URL)],
    };
    Activity::new(ActivityKind::Message).with_attachment(card.into_attachment())
}

fn image_reply() -> Activity {
    Activity::message("Here you go:")
        .with_attachment(Attachment::image("image/png", ARCHITECTURE_URL))
}

/// Greets each member added to the conversation other than the bot itself.
fn welcome_activities(activity: &Activity) -> Vec<Activity> {
    let bot_id = activity.recipient.as_ref().map(|account| account.id.as_str());
    activity
        .members_added
        .iter()
        .filter(|member| Some(member.id.as_str()) != bot_id)
        .map(|member| {
            let name = member.name.as_deref().unwrap_or("there");
            Activity::message(format!(
                "Welcome, {name}! Say \"hero card\" or \"image\", or anything else for an echo."
            ))
        })
        .collect()
}
