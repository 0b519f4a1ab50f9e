//! Error types for the payment agent

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Main error type for agent operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// The 402 body could not be turned into a payment instruction
    #[error("Malformed challenge: {reason}")]
    MalformedChallenge { reason: String },

    /// The challenge asks for a token the agent does not pay with
    #[error("Unsupported token: {token}")]
    UnsupportedToken { token: String },

    /// The ledger refused the transfer or it reverted
    #[error("Transfer submission failed: {reason}")]
    TransferSubmissionFailed { reason: String },

    /// The transfer was submitted but no receipt arrived in time
    #[error("Transfer confirmation timeout: {hash} not included after {waited_secs}s")]
    TransferConfirmationTimeout { hash: String, waited_secs: u64 },

    /// A collaborator could not be reached
    #[error("Transport unreachable: {message}")]
    TransportUnreachable { message: String },

    /// The signing key could not be loaded or used
    #[error("Signing unavailable: {reason}")]
    SigningUnavailable { reason: String },

    /// Signature bytes could not be decoded or recovered
    #[error("Invalid signature: {message}")]
    InvalidSignature { message: String },

    /// The challenge price is above the configured ceiling
    #[error("Price ceiling exceeded: asked {asked}, ceiling {ceiling}")]
    PriceCeilingExceeded { asked: String, ceiling: String },

    /// JSON-RPC error object returned by the node
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Discriminant of [`AgentError`], cheap to copy into results and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedChallenge,
    UnsupportedToken,
    TransferSubmissionFailed,
    TransferConfirmationTimeout,
    TransportUnreachable,
    SigningUnavailable,
    InvalidSignature,
    PriceCeilingExceeded,
    Rpc,
    Json,
    Http,
    Config,
}

impl AgentError {
    /// Create a malformed challenge error
    pub fn malformed_challenge(reason: impl Into<String>) -> Self {
        Self::MalformedChallenge {
            reason: reason.into(),
        }
    }

    /// Create an unsupported token error
    pub fn unsupported_token(token: impl Into<String>) -> Self {
        Self::UnsupportedToken {
            token: token.into(),
        }
    }

    /// Create a transfer submission failed error
    pub fn transfer_submission_failed(reason: impl Into<String>) -> Self {
        Self::TransferSubmissionFailed {
            reason: reason.into(),
        }
    }

    /// Create a transport unreachable error
    pub fn transport_unreachable(message: impl Into<String>) -> Self {
        Self::TransportUnreachable {
            message: message.into(),
        }
    }

    /// Create a signing unavailable error
    pub fn signing_unavailable(reason: impl Into<String>) -> Self {
        Self::SigningUnavailable {
            reason: reason.into(),
        }
    }

    /// Create an invalid signature error
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::InvalidSignature {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedChallenge { .. } => ErrorKind::MalformedChallenge,
            Self::UnsupportedToken { .. } => ErrorKind::UnsupportedToken,
            Self::TransferSubmissionFailed { .. } => ErrorKind::TransferSubmissionFailed,
            Self::TransferConfirmationTimeout { .. } => ErrorKind::TransferConfirmationTimeout,
            Self::TransportUnreachable { .. } => ErrorKind::TransportUnreachable,
            Self::SigningUnavailable { .. } => ErrorKind::SigningUnavailable,
            Self::InvalidSignature { .. } => ErrorKind::InvalidSignature,
            Self::PriceCeilingExceeded { .. } => ErrorKind::PriceCeilingExceeded,
            Self::Rpc { .. } => ErrorKind::Rpc,
            Self::Json(_) => ErrorKind::Json,
            Self::Http(_) => ErrorKind::Http,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Reclassify a reqwest failure that happened before any response arrived
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::transport_unreachable(err.to_string())
        } else {
            Self::Http(err)
        }
    }
}
