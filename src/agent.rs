//! Agent loop: poll the resource, pay challenges, wait, repeat.
//!
//! One cycle is one resource request, plus at most one payment when the
//! resource answers with a valid 402 challenge. Cycles never overlap and
//! every failure is contained within its cycle: it is logged and the loop
//! moves on to the fixed delay. The loop stops when its cancellation token
//! fires, which is checked between cycles and while waiting.

use crate::challenge::ChallengeParser;
use crate::config::AgentConfig;
use crate::executor::PaymentExecutor;
use crate::identity::SigningIdentity;
use crate::ledger::LedgerClient;
use crate::types::{AgentState, Challenge, PaymentInstruction, TransferResult};
use crate::{AgentError, Result};
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a single cycle ended with
#[derive(Debug)]
pub enum CycleOutcome {
    /// The resource answered with something other than 402
    ResourceServed { status: u16 },
    /// A challenge was paid and the transfer confirmed
    Paid(TransferResult),
    /// A challenge was accepted but the transfer did not confirm
    PaymentFailed(TransferResult),
    /// Nothing was paid: the request failed or the challenge was refused
    Skipped(AgentError),
}

/// Handle for a spawned agent loop
pub struct AgentHandle {
    pub cancel_token: CancellationToken,
    pub join_handle: JoinHandle<()>,
}

impl AgentHandle {
    /// Signal the loop to stop and wait for the current cycle to finish
    pub async fn shutdown(self) -> std::result::Result<(), tokio::task::JoinError> {
        self.cancel_token.cancel();
        self.join_handle.await
    }
}

/// Autonomous paying client
pub struct Agent {
    config: AgentConfig,
    http: Client,
    parser: ChallengeParser,
    executor: PaymentExecutor,
    identity: SigningIdentity,
    state: AgentState,
}

impl Agent {
    /// Build an agent from its configuration and the identity it pays from
    pub fn new(config: AgentConfig, identity: SigningIdentity) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AgentError::config(format!("Failed to create HTTP client: {}", e)))?;
        let ledger = LedgerClient::new(config.rpc_url.clone(), config.request_timeout)?;
        let executor = PaymentExecutor::new(
            ledger,
            config.token_contract,
            config.chain_id,
            config.confirmation,
        );

        Ok(Self {
            parser: ChallengeParser::new(config.accepted_tokens.clone()),
            config,
            http,
            executor,
            identity,
            state: AgentState::Polling,
        })
    }

    /// Current loop state
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Configuration the agent was built with
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Executor used for payments
    pub fn executor(&self) -> &PaymentExecutor {
        &self.executor
    }

    /// Identity payments are signed with
    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    /// Run one cycle and log its outcome. Never fails.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self.cycle().await;
        self.report(&outcome);
        outcome
    }

    async fn cycle(&mut self) -> CycleOutcome {
        let instruction = match self.poll().await {
            Ok(Challenge::NoPaymentNeeded(status)) => return CycleOutcome::ResourceServed { status },
            Ok(Challenge::PaymentRequired(instruction)) => instruction,
            Err(e) => return CycleOutcome::Skipped(e),
        };

        info!(
            amount = %self.describe_amount(&instruction),
            recipient = %instruction.recipient_checksummed(),
            reason = %instruction.reason,
            "402 received"
        );

        if let Err(e) = self.check_ceiling(&instruction) {
            return CycleOutcome::Skipped(e);
        }
        info!("Preparing payment.");

        self.state = AgentState::Paying;
        let result = self.executor.execute(&instruction, &self.identity).await;
        self.state = AgentState::Polling;

        if result.confirmed {
            CycleOutcome::Paid(result)
        } else {
            CycleOutcome::PaymentFailed(result)
        }
    }

    async fn poll(&self) -> Result<Challenge> {
        let response = self
            .http
            .get(&self.config.resource_url)
            .send()
            .await
            .map_err(AgentError::from_transport)?;
        self.parser.from_response(response).await
    }

    fn check_ceiling(&self, instruction: &PaymentInstruction) -> Result<()> {
        match self.config.max_payment_amount {
            Some(ceiling) if instruction.amount > ceiling => Err(AgentError::PriceCeilingExceeded {
                asked: instruction.amount.to_string(),
                ceiling: ceiling.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn describe_amount(&self, instruction: &PaymentInstruction) -> String {
        match instruction.display_amount(self.config.token_decimals) {
            Some(amount) => format!("{} {}", amount, instruction.token_symbol),
            None => format!("{} units of {}", instruction.amount, instruction.token_symbol),
        }
    }

    fn report(&self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::ResourceServed { status } => {
                debug!(status, "resource answered without a payment challenge");
            }
            CycleOutcome::Paid(result) => {
                info!(hash = %result.hash_hex(), "Payment succeeded");
            }
            CycleOutcome::PaymentFailed(result) => {
                let reason = result
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                error!(hash = %result.hash_hex(), reason = %reason, "Transaction failed");
            }
            CycleOutcome::Skipped(e) => {
                warn!(kind = ?e.kind(), reason = %e, "Cycle skipped");
            }
        }
    }

    /// Poll until `cancel_token` fires.
    ///
    /// A payment in flight when the token fires is allowed to finish its
    /// confirmation wait; the loop exits at the next cycle boundary.
    pub async fn run(mut self, cancel_token: CancellationToken) {
        info!(
            agent = %crate::crypto::address::to_checksum(&self.identity.address()),
            resource = %self.config.resource_url,
            tokens = %self.parser.accepted_tokens().join(","),
            interval_secs = self.config.poll_interval.as_secs_f64(),
            "Agent running"
        );

        while !cancel_token.is_cancelled() {
            self.run_cycle().await;

            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Agent stopped");
    }

    /// Spawn [`Agent::run`] as a background task
    pub fn spawn(self) -> AgentHandle {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let join_handle = tokio::spawn(self.run(token));

        AgentHandle {
            cancel_token,
            join_handle,
        }
    }
}
