use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{FailureKind, Phase};

/// Every failure the swap pipeline can surface to the orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SwapError {
    #[error("Invalid swap request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("No route found for {token_in} -> {token_out}")]
    NoRoute { token_in: String, token_out: String },

    #[error("Aggregator error: {0}")]
    Aggregator(String),

    #[error("Slippage exceeded: quoted {quoted} is below minimum {minimum}")]
    SlippageExceeded { quoted: U256, minimum: U256 },

    #[error("Quote expired at {expired_at}")]
    QuoteExpired { expired_at: DateTime<Utc> },

    #[error("Insufficient balance on chain {chain_id}: required {required}, available {available}")]
    InsufficientBalance {
        chain_id: u64,
        required: U256,
        available: U256,
    },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Submission rejected on chain {chain_id}: {reason}")]
    Submission { chain_id: u64, reason: String },

    #[error("Source transaction {tx_hash} was not confirmed in time")]
    SourceTimeout { tx_hash: String },

    #[error("Bridge did not relay source transaction {source_tx_hash} in time")]
    BridgeTimeout { source_tx_hash: String },

    #[error("Destination transaction {tx_hash} was not confirmed in time")]
    DestinationTimeout { tx_hash: String },

    #[error("Unknown bridge state: {0}")]
    UnknownBridgeState(String),

    #[error("Bridge reported failure: {0}")]
    BridgeFailed(String),

    #[error("Transaction {tx_hash} reverted on chain {chain_id}")]
    Reverted { chain_id: u64, tx_hash: String },

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),

    #[error("Invalid phase transition {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Swap cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SwapError {
    /// Transient transport failures. Everything else needs a human or a new quote.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwapError::Network(_))
    }

    /// Failures that a different trade size might avoid.
    pub fn is_amount_sensitive(&self) -> bool {
        matches!(
            self,
            SwapError::NoRoute { .. }
                | SwapError::SlippageExceeded { .. }
                | SwapError::InsufficientBalance { .. }
        )
    }

    /// Stable short name for grouping failures in reports.
    pub fn code(&self) -> &'static str {
        match self {
            SwapError::InvalidRequest(_) => "invalid_request",
            SwapError::Network(_) => "network",
            SwapError::NoRoute { .. } => "no_route",
            SwapError::Aggregator(_) => "aggregator",
            SwapError::SlippageExceeded { .. } => "slippage_exceeded",
            SwapError::QuoteExpired { .. } => "quote_expired",
            SwapError::InsufficientBalance { .. } => "insufficient_balance",
            SwapError::Signing(_) => "signing",
            SwapError::Submission { .. } => "submission",
            SwapError::SourceTimeout { .. } => "source_timeout",
            SwapError::BridgeTimeout { .. } => "bridge_timeout",
            SwapError::DestinationTimeout { .. } => "destination_timeout",
            SwapError::UnknownBridgeState(_) => "unknown_bridge_state",
            SwapError::BridgeFailed(_) => "bridge_failed",
            SwapError::Reverted { .. } => "reverted",
            SwapError::UnsupportedChain(_) => "unsupported_chain",
            SwapError::InvalidTransition { .. } => "invalid_transition",
            SwapError::Cancelled => "cancelled",
            SwapError::Config(_) => "config",
        }
    }

    /// Terminal phase an intent takes when this error ends tracking.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            SwapError::SourceTimeout { .. } => FailureKind::SourceTimeout,
            SwapError::BridgeTimeout { .. } => FailureKind::BridgeTimeout,
            SwapError::DestinationTimeout { .. } => FailureKind::DestinationTimeout,
            SwapError::UnknownBridgeState(_) => FailureKind::UnknownBridgeState,
            SwapError::BridgeFailed(_) => FailureKind::BridgeFailed,
            SwapError::Reverted { .. } => FailureKind::Reverted,
            _ => FailureKind::Rejected,
        }
    }
}

pub type SwapResult<T> = Result<T, SwapError>;
