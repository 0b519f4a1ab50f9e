//! Local 402 resource for running the agent against

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use x402_agent::stub::{self, StubChallenge, PAID_RESOURCE_PATH};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let bind = std::env::var("STUB_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let mut challenge = StubChallenge::default();
    if let Ok(price) = std::env::var("STUB_PRICE") {
        challenge = challenge.with_price(price);
    }
    if let Ok(recipient) = std::env::var("STUB_RECIPIENT") {
        challenge = challenge.with_recipient(recipient);
    }

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(
        price = %challenge.price,
        token = %challenge.token,
        recipient = %challenge.recipient,
        "Stub resource running on http://{}{}",
        bind,
        PAID_RESOURCE_PATH
    );

    axum::serve(listener, stub::router(challenge)).await?;

    Ok(())
}
