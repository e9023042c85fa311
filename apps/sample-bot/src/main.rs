//! Sample bot: pattern-matches on lowercased message text and replies with
//! a hero card, an image attachment, or an echo.

mod bot;

use std::sync::Arc;

use anyhow::Result;
use botgate_adapter::{BotAdapter, router};
use botgate_connector::{ConnectorClientFactory, OutboundDispatcher};
use botgate_security::{
    AppCredentials, JwksKeyIssuer, SimpleCredentialProvider, TokenValidator,
    keys::BOT_FRAMEWORK_OPENID_METADATA_URL,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Empty app id means authentication is disabled (emulator mode).
    let app_id = std::env::var("MICROSOFT_APP_ID").unwrap_or_default();
    let app_password = std::env::var("MICROSOFT_APP_PASSWORD").unwrap_or_default();
    let metadata_url = std::env::var("OPENID_METADATA_URL")
        .unwrap_or_else(|_| BOT_FRAMEWORK_OPENID_METADATA_URL.into());
    let login_base = std::env::var("LOGIN_BASE_URL").ok();

    let http = reqwest::Client::new();
    let credentials = AppCredentials::new(app_id.clone(), app_password);
    let validator = TokenValidator::new(
        Arc::new(SimpleCredentialProvider::new(app_id)),
        Arc::new(JwksKeyIssuer::new(http.clone(), metadata_url)),
    );
    let dispatcher = OutboundDispatcher::new(Arc::new(ConnectorClientFactory::new(
        http,
        credentials,
        login_base,
    )));
    let adapter = Arc::new(BotAdapter::new(
        validator,
        dispatcher,
        Arc::new(bot::EchoBot),
    ));

    let addr: std::net::SocketAddr = std::env::var("BIND")
        .unwrap_or_else(|_| "0.0.0.0:3978".into())
        .parse()?;
    tracing::info!("sample-bot listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(adapter)).await?;
    Ok(())
}
