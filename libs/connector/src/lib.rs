//! Outbound side of botgate: a thin client over the Connector conversation
//! REST API and the ordered dispatcher that drives it.

pub mod client;
pub mod dispatch;
pub mod error;
pub mod types;

pub use client::{ChannelApi, ConnectorClient, MockChannelApi, RecordedCall};
pub use dispatch::{
    ChannelClientFactory, ConnectorClientFactory, FixedClientFactory, OutboundDispatcher,
};
pub use error::{ConnectorError, DispatchError};
pub use types::{ConversationParameters, ConversationResourceResponse, ResourceResponse};
