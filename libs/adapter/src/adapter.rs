use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};

use botgate_connector::OutboundDispatcher;
use botgate_core::Activity;
use botgate_security::TokenValidator;

use crate::turn::{ActivityHandler, TurnContext};

/// Composition root for the inbound side: validator, dispatcher, and the
/// single registered receive-handler. One instance owns one credential set;
/// requests are processed independently.
pub struct BotAdapter {
    validator: TokenValidator,
    dispatcher: Arc<OutboundDispatcher>,
    handler: Arc<dyn ActivityHandler>,
}

impl BotAdapter {
    pub fn new(
        validator: TokenValidator,
        dispatcher: OutboundDispatcher,
        handler: Arc<dyn ActivityHandler>,
    ) -> Self {
        Self {
            validator,
            dispatcher: Arc::new(dispatcher),
            handler,
        }
    }

    /// Processes one inbound request: parse, authenticate, hand off.
    ///
    /// Responds 400 on a malformed body, 401 on authentication failure
    /// (the handler is never invoked), 500 with the error message when the
    /// handler fails, and 202 with an empty body when it completes —
    /// regardless of whether it produced outbound replies.
    pub async fn process(&self, auth_header: Option<&str>, body: &[u8]) -> Response {
        let activity: Activity = match serde_json::from_slice(body) {
            Ok(activity) => activity,
            Err(err) => {
                tracing::warn!(error = %err, "invalid activity payload");
                return (StatusCode::BAD_REQUEST, "invalid activity payload").into_response();
            }
        };

        if let Err(err) = self.validator.validate(auth_header).await {
            tracing::warn!(error = %err, "inbound authentication failed");
            return StatusCode::UNAUTHORIZED.into_response();
        }

        tracing::info!(
            kind = activity.kind.as_str(),
            conversation = activity.conversation_id().unwrap_or("unknown"),
            "activity accepted"
        );

        let turn = TurnContext::new(activity, self.dispatcher.clone());
        match self.handler.on_turn(&turn).await {
            Ok(()) => StatusCode::ACCEPTED.into_response(),
            Err(err) => {
                tracing::error!(error = %err, "receive-handler failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}

/// Builds the router exposing `POST /api/messages`. Calling this repeatedly
/// reuses the adapter's registered handler.
pub fn router(adapter: Arc<BotAdapter>) -> Router {
    Router::new()
        .route("/api/messages", post(messages_handler))
        .with_state(adapter)
}

async fn messages_handler(
    State(adapter): State<Arc<BotAdapter>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    adapter.process(auth_header, &body).await
}
