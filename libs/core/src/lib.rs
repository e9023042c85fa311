//! Core data model for botgate: the `Activity` message envelope exchanged
//! between a bot and a channel, attachment/card payloads, and conversation
//! addressing.

pub mod activity;
pub mod cards;
pub mod reference;

pub use activity::{Activity, ActivityKind, Attachment, ChannelAccount, ConversationAccount};
pub use cards::{CardAction, CardImage, HeroCard};
pub use reference::ConversationReference;
