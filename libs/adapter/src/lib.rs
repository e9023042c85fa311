//! Inbound activity adapter: the composition root that accepts the
//! channel's HTTP POST, authenticates it, parses the activity envelope, and
//! hands it to the registered receive-handler.

pub mod adapter;
pub mod turn;

pub use adapter::{BotAdapter, router};
pub use turn::{ActivityHandler, TurnContext};
