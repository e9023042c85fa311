//! End-to-end tests for the inbound adapter: one axum router, a mock
//! channel client, and real signed tokens.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;
use tower::ServiceExt;

use botgate_adapter::{ActivityHandler, BotAdapter, TurnContext, router};
use botgate_connector::{FixedClientFactory, MockChannelApi, OutboundDispatcher};
use botgate_core::{ActivityKind, HeroCard};
use botgate_security::{SimpleCredentialProvider, StaticKeyIssuer, TokenValidator};

const ISSUER: &str = "https://issuer.example";
const SECRET: &[u8] = b"adapter-test-secret";
const APP_ID: &str = "app-1";

#[derive(Serialize)]
struct TestClaims {
    iss: String,
    aud: String,
    exp: i64,
    iat: i64,
}

fn bearer(audience: &str) -> String {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = TestClaims {
        iss: ISSUER.into(),
        aud: audience.into(),
        exp: now + 600,
        iat: now,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .expect("token");
    format!("Bearer {token}")
}

struct CountingBot {
    turns: AtomicUsize,
    fail_with: Option<&'static str>,
}

impl CountingBot {
    fn new() -> Self {
        Self {
            turns: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    fn failing(message: &'static str) -> Self {
        Self {
            turns: AtomicUsize::new(0),
            fail_with: Some(message),
        }
    }
}

#[async_trait]
impl ActivityHandler for CountingBot {
    async fn on_turn(&self, turn: &TurnContext) -> anyhow::Result<()> {
        self.turns.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_with {
            return Err(anyhow!(message));
        }
        if turn.activity().kind == ActivityKind::Message {
            let text = turn.activity().text.clone().unwrap_or_default();
            turn.send_activity(turn.make_reply(format!("You said: {text}")))
                .await?;
        }
        Ok(())
    }
}

struct HeroCardBot;

#[async_trait]
impl ActivityHandler for HeroCardBot {
    async fn on_turn(&self, turn: &TurnContext) -> anyhow::Result<()> {
        let card = HeroCard {
            title: Some("BotGate Hero Card".into()),
            ..Default::default()
        };
        let reply = turn.make_reply("").with_attachment(card.into_attachment());
        turn.send_activity(reply).await?;
        Ok(())
    }
}

fn adapter_with(
    handler: Arc<dyn ActivityHandler>,
    client: Arc<MockChannelApi>,
) -> Arc<BotAdapter> {
    let validator = TokenValidator::new(
        Arc::new(SimpleCredentialProvider::new(APP_ID)),
        Arc::new(StaticKeyIssuer::hs256(ISSUER, SECRET)),
    );
    let dispatcher = OutboundDispatcher::new(Arc::new(FixedClientFactory::new(client)));
    Arc::new(BotAdapter::new(validator, dispatcher, handler))
}

fn inbound_message(text: &str) -> serde_json::Value {
    json!({
        "type": "message",
        "id": "act-1",
        "text": text,
        "from": { "id": "user-1" },
        "recipient": { "id": "bot-1" },
        "conversation": { "id": "conv-1" },
        "serviceUrl": "https://smba.example/emea/",
        "channelId": "msteams"
    })
}

fn post_messages(body: Body, auth: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/messages")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(body).expect("request")
}

#[tokio::test]
async fn valid_request_is_accepted_and_handled_once() {
    let bot = Arc::new(CountingBot::new());
    let client = Arc::new(MockChannelApi::new());
    let app = router(adapter_with(bot.clone(), client.clone()));

    let request = post_messages(
        Body::from(inbound_message("hello").to_string()),
        Some(bearer(APP_ID)),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
    assert_eq!(bot.turns.load(Ordering::SeqCst), 1);

    // The echo reply was dispatched to the inbound conversation.
    let calls = client.calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].conversation_id, "conv-1");
    assert_eq!(
        calls[0].activity.as_ref().unwrap().text.as_deref(),
        Some("You said: hello")
    );
}

#[tokio::test]
async fn missing_token_yields_401_and_handler_never_runs() {
    let bot = Arc::new(CountingBot::new());
    let client = Arc::new(MockChannelApi::new());
    let app = router(adapter_with(bot.clone(), client));

    let request = post_messages(Body::from(inbound_message("hello").to_string()), None);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(bot.turns.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wrong_audience_yields_401() {
    let bot = Arc::new(CountingBot::new());
    let client = Arc::new(MockChannelApi::new());
    let app = router(adapter_with(bot.clone(), client));

    let request = post_messages(
        Body::from(inbound_message("hello").to_string()),
        Some(bearer("someone-else")),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(bot.turns.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_body_yields_400_without_dispatch() {
    let bot = Arc::new(CountingBot::new());
    let client = Arc::new(MockChannelApi::new());
    let app = router(adapter_with(bot.clone(), client.clone()));

    let request = post_messages(Body::from("{not json"), Some(bearer(APP_ID)));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(bot.turns.load(Ordering::SeqCst), 0);
    assert_eq!(client.call_count().await, 0);
}

#[tokio::test]
async fn empty_body_never_dispatches() {
    let bot = Arc::new(CountingBot::new());
    let client = Arc::new(MockChannelApi::new());
    let app = router(adapter_with(bot.clone(), client.clone()));

    let request = post_messages(Body::empty(), Some(bearer(APP_ID)));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(bot.turns.load(Ordering::SeqCst), 0);
    assert_eq!(client.call_count().await, 0);
}

#[tokio::test]
async fn handler_failure_yields_500_with_message_body() {
    let bot = Arc::new(CountingBot::failing("boom: table flipped"));
    let client = Arc::new(MockChannelApi::new());
    let app = router(adapter_with(bot.clone(), client));

    let request = post_messages(
        Body::from(inbound_message("hello").to_string()),
        Some(bearer(APP_ID)),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(std::str::from_utf8(&body).unwrap(), "boom: table flipped");
}

#[tokio::test]
async fn hero_card_round_trip() {
    let client = Arc::new(MockChannelApi::new());
    let app = router(adapter_with(Arc::new(HeroCardBot), client.clone()));

    let request = post_messages(
        Body::from(inbound_message("Show me a hero card").to_string()),
        Some(bearer(APP_ID)),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let calls = client.calls.lock().await;
    assert_eq!(calls.len(), 1);
    let sent = calls[0].activity.as_ref().unwrap();
    assert_eq!(
        sent.attachments[0].content_type,
        "application/vnd.microsoft.card.hero"
    );
    assert_eq!(sent.attachments[0].content["title"], "BotGate Hero Card");
}

#[tokio::test]
async fn router_can_be_rebuilt_over_the_same_adapter() {
    let bot = Arc::new(CountingBot::new());
    let client = Arc::new(MockChannelApi::new());
    let adapter = adapter_with(bot.clone(), client);

    for _ in 0..2 {
        let app = router(adapter.clone());
        let request = post_messages(
            Body::from(inbound_message("again").to_string()),
            Some(bearer(APP_ID)),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
    assert_eq!(bot.turns.load(Ordering::SeqCst), 2);
}
