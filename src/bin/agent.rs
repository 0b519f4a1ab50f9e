//! Runs the paying agent until Ctrl-C

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use x402_agent::config::env;
use x402_agent::crypto::address;
use x402_agent::{Agent, AgentConfig, SigningIdentity};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let config = AgentConfig::from_env().map_err(|e| {
        error!(error = %e, "failed to load configuration");
        e
    })?;
    let identity = SigningIdentity::from_env(env::AGENT_PRIVATE_KEY).map_err(|e| {
        error!(error = %e, "failed to load agent key");
        e
    })?;

    let agent = Agent::new(config, identity)?;
    let owner = agent.identity().address();
    let token = agent.executor().token_contract();
    info!(address = %address::to_checksum(&owner), "Agent address");
    info!(
        resource = %agent.config().resource_url,
        rpc = %agent.executor().ledger().rpc_url(),
        "Endpoints"
    );

    match agent.executor().ledger().token_balance(token, owner).await {
        Ok(balance) => info!(token = %address::to_checksum(&token), balance = %balance, "Token balance"),
        Err(e) => warn!(error = %e, "could not read token balance"),
    }

    let handle = agent.spawn();

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, stopping after the current cycle");
    handle.shutdown().await?;

    Ok(())
}
