//! Process configuration
//!
//! Everything here is read once at startup. A missing or invalid required
//! value is a startup error; nothing is re-read while the agent runs.

use crate::crypto::address;
use crate::ledger::ConfirmationPolicy;
use crate::{AgentError, Result};
use ethereum_types::{Address, U256};
use std::time::Duration;

/// Environment variable names
pub mod env {
    pub const RESOURCE_URL: &str = "RESOURCE_URL";
    pub const RPC_URL: &str = "RPC_URL";
    pub const AGENT_PRIVATE_KEY: &str = "AGENT_PRIVATE_KEY";
    pub const TOKEN_ADDRESS: &str = "USDC_ADDRESS";
    pub const ACCEPTED_TOKENS: &str = "ACCEPTED_TOKENS";
    pub const TOKEN_DECIMALS: &str = "TOKEN_DECIMALS";
    pub const POLL_INTERVAL_SECS: &str = "POLL_INTERVAL_SECS";
    pub const CONFIRMATION_TIMEOUT_SECS: &str = "CONFIRMATION_TIMEOUT_SECS";
    pub const CONFIRMATION_POLL_MS: &str = "CONFIRMATION_POLL_MS";
    pub const REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
    pub const CHAIN_ID: &str = "CHAIN_ID";
    pub const MAX_PAYMENT_AMOUNT: &str = "MAX_PAYMENT_AMOUNT";
    pub const DELEGATOR_PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const DELEGATE_CONTRACT: &str = "AEGIS_DELEGATION";
}

/// Resource polled when none is configured
pub const DEFAULT_RESOURCE_URL: &str = "http://localhost:3000/paid-resource";

/// Fixed delay between poll cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Paid resource polled each cycle
    pub resource_url: String,
    /// Ledger JSON-RPC endpoint
    pub rpc_url: String,
    /// Token contract transfers are sent to
    pub token_contract: Address,
    /// Symbols the agent will pay in
    pub accepted_tokens: Vec<String>,
    /// Decimals used when logging amounts
    pub token_decimals: u32,
    /// Delay between cycles
    pub poll_interval: Duration,
    pub confirmation: ConfirmationPolicy,
    /// Timeout for each HTTP request to the resource or the node
    pub request_timeout: Duration,
    /// Chain id for signing; fetched from the node when absent
    pub chain_id: Option<u64>,
    /// Refuse challenges above this amount. Off unless set.
    pub max_payment_amount: Option<U256>,
}

impl AgentConfig {
    /// Create a config with default timings and `USDC` as the only accepted token
    pub fn new(
        resource_url: impl Into<String>,
        rpc_url: impl Into<String>,
        token_contract: Address,
    ) -> Self {
        Self {
            resource_url: resource_url.into(),
            rpc_url: rpc_url.into(),
            token_contract,
            accepted_tokens: vec!["USDC".to_string()],
            token_decimals: 6,
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation: ConfirmationPolicy::default(),
            request_timeout: Duration::from_secs(30),
            chain_id: None,
            max_payment_amount: None,
        }
    }

    /// Set the accepted token symbols
    pub fn with_accepted_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Set the delay between cycles
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the confirmation policy
    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    /// Set the HTTP request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Pin the chain id instead of asking the node
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Enable the price ceiling
    pub fn with_max_payment_amount(mut self, amount: U256) -> Self {
        self.max_payment_amount = Some(amount);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_url("resource URL", &self.resource_url)?;
        validate_url("RPC URL", &self.rpc_url)?;

        if self.accepted_tokens.is_empty() || self.accepted_tokens.iter().any(|t| t.is_empty()) {
            return Err(AgentError::config("Accepted token list cannot be empty"));
        }
        if self.poll_interval.is_zero() {
            return Err(AgentError::config("Poll interval must be greater than zero"));
        }
        if self.confirmation.poll_interval.is_zero()
            || self.confirmation.timeout < self.confirmation.poll_interval
        {
            return Err(AgentError::config(
                "Confirmation timeout must be at least one confirmation poll interval",
            ));
        }

        Ok(())
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rpc_url = required(&lookup, env::RPC_URL)?;
        let token_contract = parse_address(env::TOKEN_ADDRESS, &required(&lookup, env::TOKEN_ADDRESS)?)?;
        let resource_url = lookup(env::RESOURCE_URL).unwrap_or_else(|| DEFAULT_RESOURCE_URL.to_string());

        let mut config = Self::new(resource_url, rpc_url, token_contract);

        if let Some(tokens) = lookup(env::ACCEPTED_TOKENS) {
            config.accepted_tokens = tokens
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(decimals) = parse_optional(&lookup, env::TOKEN_DECIMALS)? {
            config.token_decimals = decimals;
        }
        if let Some(secs) = parse_optional::<u64, _>(&lookup, env::POLL_INTERVAL_SECS)? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_optional::<u64, _>(&lookup, env::CONFIRMATION_TIMEOUT_SECS)? {
            config.confirmation.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_optional::<u64, _>(&lookup, env::CONFIRMATION_POLL_MS)? {
            config.confirmation.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_optional::<u64, _>(&lookup, env::REQUEST_TIMEOUT_SECS)? {
            config.request_timeout = Duration::from_secs(secs);
        }
        config.chain_id = parse_optional(&lookup, env::CHAIN_ID)?;
        config.max_payment_amount = match lookup(env::MAX_PAYMENT_AMOUNT) {
            Some(value) => Some(U256::from_dec_str(value.trim()).map_err(|_| {
                AgentError::config(format!("{} must be a decimal integer", env::MAX_PAYMENT_AMOUNT))
            })?),
            None => None,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Delegation signer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegationConfig {
    /// Contract being granted the right to act for the signer
    pub delegate_contract: Address,
}

impl DelegationConfig {
    /// Create a delegation config
    pub fn new(delegate_contract: Address) -> Self {
        Self { delegate_contract }
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = required(&lookup, env::DELEGATE_CONTRACT)?;
        Ok(Self::new(parse_address(env::DELEGATE_CONTRACT, &value)?))
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AgentError::config(format!("Environment variable {} not found", key)))
}

fn parse_optional<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AgentError::config(format!("Invalid value for {}: {:?}", key, value))),
        None => Ok(None),
    }
}

fn parse_address(key: &str, value: &str) -> Result<Address> {
    address::parse(value.trim())
        .map_err(|e| AgentError::config(format!("Invalid address in {}: {}", key, e)))
}

fn validate_url(what: &str, value: &str) -> Result<()> {
    let url = url::Url::parse(value)
        .map_err(|e| AgentError::config(format!("Invalid {} {:?}: {}", what, value, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AgentError::config(format!(
            "{} must start with http:// or https://",
            what
        )));
    }
    Ok(())
}
