use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{BridgeStatusProvider, RelayState, RelayStatus};
use crate::config::SwapConfig;
use crate::error::{SwapError, SwapResult};

/// Euclid swap tracking endpoint.
#[derive(Debug, Clone)]
pub struct EuclidRelay {
    client: Client,
    api_url: String,
    wallet_address: Address,
    chain_uids: HashMap<u64, String>,
}

#[derive(Debug, Serialize)]
struct TrackRequest {
    chain: String,
    tx_hash: String,
    wallet_address: String,
    #[serde(rename = "type")]
    kind: String,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "destinationTxHash", alias = "dest_tx_hash")]
    destination_tx_hash: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl EuclidRelay {
    pub fn from_config(config: &SwapConfig, wallet_address: Address) -> SwapResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.relay.timeout_seconds))
            .build()
            .map_err(|e| SwapError::Config(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.relay.api_url.trim_end_matches('/').to_string(),
            wallet_address,
            chain_uids: config
                .chains
                .values()
                .map(|chain| (chain.chain_id, chain.chain_uid.clone()))
                .collect(),
        })
    }
}

/// Map the relay's status vocabulary. Unrecognised values fail closed.
fn parse_state(raw: &str, error: Option<&str>) -> RelayState {
    match raw.trim().to_lowercase().as_str() {
        "pending" | "queued" | "submitted" | "not_found" => RelayState::Pending,
        "processing" | "in_progress" | "inprogress" | "relaying" | "in_flight" => RelayState::InFlight,
        "success" | "confirmed" | "completed" | "delivered" => RelayState::Delivered,
        "failed" | "failure" | "error" | "reverted" | "refunded" => {
            RelayState::Failed(error.unwrap_or(raw).to_string())
        }
        other => RelayState::Unknown(other.to_string()),
    }
}

/// Non-2xx answers. Throttling and server faults are transient; a 404 means
/// the relay has not indexed the source transaction yet.
fn status_from_http_error(status: StatusCode, error_text: &str) -> SwapResult<RelayStatus> {
    if status == StatusCode::NOT_FOUND {
        debug!("Relay has not indexed the transaction yet: {}", error_text);
        return Ok(RelayStatus::pending());
    }
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        warn!("Euclid relay temporarily unavailable ({}): {}", status, error_text);
        return Err(SwapError::Network(format!("HTTP {}: {}", status, error_text)));
    }
    error!("Euclid relay error {}: {}", status, error_text);
    Err(SwapError::UnknownBridgeState(format!("HTTP {}: {}", status, error_text)))
}

fn status_from_response(response: TrackResponse) -> SwapResult<RelayStatus> {
    let state = match response.status.as_deref() {
        Some(raw) => parse_state(raw, response.error.as_deref()),
        None => RelayState::Unknown("missing status".to_string()),
    };

    let destination_tx_hash = match response.destination_tx_hash.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(
            TxHash::from_str(raw)
                .map_err(|e| SwapError::UnknownBridgeState(format!("invalid destination hash {}: {}", raw, e)))?,
        ),
        _ => None,
    };

    Ok(RelayStatus {
        state,
        destination_tx_hash,
    })
}

#[async_trait]
impl BridgeStatusProvider for EuclidRelay {
    fn name(&self) -> &str {
        "Euclid relay"
    }

    async fn relay_status(&self, source_chain_id: u64, source_tx_hash: TxHash) -> SwapResult<RelayStatus> {
        let chain = self
            .chain_uids
            .get(&source_chain_id)
            .cloned()
            .ok_or(SwapError::UnsupportedChain(source_chain_id))?;
        let url = format!("{}/api/v1/txn/track/swap", self.api_url);
        let body = TrackRequest {
            chain,
            tx_hash: format!("{:?}", source_tx_hash),
            wallet_address: format!("{:?}", self.wallet_address).to_lowercase(),
            kind: "swap".to_string(),
            timestamp: Utc::now().timestamp(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SwapError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return status_from_http_error(status, &error_text);
        }

        let tracked: TrackResponse = response
            .json()
            .await
            .map_err(|e| SwapError::UnknownBridgeState(format!("JSON parsing error: {}", e)))?;
        let relay_status = status_from_response(tracked)?;
        debug!("Relay status for {}: {}", source_tx_hash, relay_status.state);
        Ok(relay_status)
    }
}
