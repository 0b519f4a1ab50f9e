//! Signs a delegation grant for the configured contract and prints it

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use x402_agent::config::env;
use x402_agent::crypto::address;
use x402_agent::{DelegationConfig, DelegationSigner};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer())
        .init();

    let signer = DelegationSigner::new(DelegationConfig::from_env()?);
    let authorization = match signer.sign_from_env(env::DELEGATOR_PRIVATE_KEY) {
        Ok(authorization) => authorization,
        Err(e) => {
            eprintln!(
                "❌ Cannot sign delegation for {}: {}",
                address::to_checksum(&signer.delegate_contract()),
                e
            );
            std::process::exit(1);
        }
    };

    println!("✅ Delegation signed");
    println!("Contract:  {}", address::to_checksum(&authorization.delegate_contract));
    println!("Signer:    {}", address::to_checksum(&authorization.signer));
    println!("Signature: {}", authorization.signature_hex());

    Ok(())
}
