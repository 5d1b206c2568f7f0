use alloy::primitives::TxHash;
use async_trait::async_trait;
use std::fmt;

pub mod euclid_relay;

pub use euclid_relay::EuclidRelay;

/// Relay progress for a source transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayState {
    Pending,
    InFlight,
    Delivered,
    Failed(String),
    /// Anything the relay reported that we cannot interpret.
    Unknown(String),
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::Pending => write!(f, "Pending"),
            RelayState::InFlight => write!(f, "In flight"),
            RelayState::Delivered => write!(f, "Delivered"),
            RelayState::Failed(reason) => write!(f, "Failed: {}", reason),
            RelayState::Unknown(raw) => write!(f, "Unknown ({})", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayStatus {
    pub state: RelayState,
    pub destination_tx_hash: Option<TxHash>,
}

impl RelayStatus {
    pub fn pending() -> Self {
        Self {
            state: RelayState::Pending,
            destination_tx_hash: None,
        }
    }
}

#[async_trait]
pub trait BridgeStatusProvider: Send + Sync {
    /// Get bridge name
    fn name(&self) -> &str;

    /// Poll relay progress by source transaction hash
    async fn relay_status(
        &self,
        source_chain_id: u64,
        source_tx_hash: TxHash,
    ) -> crate::error::SwapResult<RelayStatus>;
}
