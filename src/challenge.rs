//! Payment challenge parsing
//!
//! Turns a resource response into either [`Challenge::NoPaymentNeeded`] or a
//! validated [`PaymentInstruction`]. Only status 402 is inspected; every other
//! status passes through untouched.

use crate::crypto::address;
use crate::types::{Challenge, ChallengeBody, PaymentInstruction, Price, PAYMENT_REQUIRED};
use crate::{AgentError, Result};
use ethereum_types::U256;
use tracing::debug;

/// Validates 402 bodies against the tokens the agent is willing to pay with
#[derive(Debug, Clone)]
pub struct ChallengeParser {
    accepted_tokens: Vec<String>,
}

impl ChallengeParser {
    /// Create a parser accepting the given token symbols
    pub fn new<I, S>(accepted_tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted_tokens: accepted_tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Accepted token symbols, as configured
    pub fn accepted_tokens(&self) -> &[String] {
        &self.accepted_tokens
    }

    /// Parse a status code and raw body
    pub fn parse(&self, status: u16, body: &[u8]) -> Result<Challenge> {
        if status != PAYMENT_REQUIRED {
            return Ok(Challenge::NoPaymentNeeded(status));
        }

        let body: ChallengeBody = serde_json::from_slice(body)
            .map_err(|e| AgentError::malformed_challenge(format!("body is not a challenge object: {}", e)))?;

        self.validate(body).map(Challenge::PaymentRequired)
    }

    /// Read a response and parse it
    pub async fn from_response(&self, response: reqwest::Response) -> Result<Challenge> {
        let status = response.status();
        if status != http::StatusCode::PAYMENT_REQUIRED {
            return Ok(Challenge::NoPaymentNeeded(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AgentError::transport_unreachable(format!("failed to read challenge body: {}", e)))?;
        debug!(bytes = body.len(), "received 402 body");

        self.parse(status.as_u16(), &body)
    }

    fn validate(&self, body: ChallengeBody) -> Result<PaymentInstruction> {
        let amount = parse_amount(body.price.as_ref())?;

        let recipient = body
            .recipient
            .as_deref()
            .ok_or_else(|| AgentError::malformed_challenge("missing recipient"))?;
        let recipient = address::parse(recipient).map_err(|e| {
            AgentError::malformed_challenge(format!("invalid recipient {:?}: {}", recipient, e))
        })?;

        let token = body
            .token
            .as_deref()
            .ok_or_else(|| AgentError::malformed_challenge("missing token"))?;
        let token_symbol = self
            .accepted_tokens
            .iter()
            .find(|accepted| accepted.eq_ignore_ascii_case(token))
            .cloned()
            .ok_or_else(|| AgentError::unsupported_token(token))?;

        Ok(PaymentInstruction {
            amount,
            token_symbol,
            recipient,
            reason: body.reason.unwrap_or_default(),
        })
    }
}

fn parse_amount(price: Option<&Price>) -> Result<U256> {
    let amount = match price {
        None => return Err(AgentError::malformed_challenge("missing price")),
        Some(Price::Text(text)) => {
            if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
                return Err(AgentError::malformed_challenge(format!(
                    "price {:?} is not a decimal integer",
                    text
                )));
            }
            U256::from_dec_str(text).map_err(|_| {
                AgentError::malformed_challenge(format!("price {:?} does not fit 256 bits", text))
            })?
        }
        Some(Price::Number(number)) => number.as_u64().map(U256::from).ok_or_else(|| {
            AgentError::malformed_challenge(format!("price {} is not a positive integer", number))
        })?,
    };

    if amount.is_zero() {
        return Err(AgentError::malformed_challenge("price must be greater than zero"));
    }
    Ok(amount)
}
