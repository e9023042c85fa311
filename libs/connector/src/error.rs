use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failures raised by one Connector REST call; surfaced unchanged to the
/// caller.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("connector configuration error: {0}")]
    Config(String),
    #[error("connector transport error")]
    Transport(#[source] reqwest::Error),
    #[error("connector remote error (status {status}, retry_after = {retry_after:?}): {message}")]
    Remote {
        status: StatusCode,
        retry_after: Option<Duration>,
        message: String,
    },
    #[error("connector response decode error: {0}")]
    Decode(String),
}

/// Failures of one outbound batch. The first error aborts the batch;
/// partial results are discarded.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("activity is missing a service url")]
    MissingServiceUrl,
    #[error("activity is missing a conversation id")]
    MissingConversationId,
    #[error("failed to build channel client")]
    Client(#[source] ConnectorError),
    #[error("remote call failed")]
    Remote(#[source] ConnectorError),
}
