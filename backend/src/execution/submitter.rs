use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SwapConfig;
use crate::error::{SwapError, SwapResult};
use crate::retry::{retry_with_backoff, RetryPolicy};

/// What the chain currently says about a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Included { block_number: u64, confirmations: u64 },
    Reverted { block_number: u64 },
}

#[async_trait]
pub trait ChainSubmitter: Send + Sync {
    async fn transaction_count(&self, chain_id: u64, address: Address) -> SwapResult<u64>;

    async fn gas_price(&self, chain_id: u64) -> SwapResult<u128>;

    async fn native_balance(&self, chain_id: u64, address: Address) -> SwapResult<U256>;

    /// Broadcast once. Implementations must not retry.
    async fn submit_raw_transaction(&self, chain_id: u64, raw: &Bytes) -> SwapResult<TxHash>;

    async fn confirmation_status(&self, chain_id: u64, tx_hash: TxHash) -> SwapResult<ConfirmationStatus>;
}

/// JSON-RPC submitter with one HTTP provider per configured chain.
#[derive(Clone)]
pub struct RpcChainSubmitter {
    providers: HashMap<u64, RootProvider<Http<Client>>>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl RpcChainSubmitter {
    pub fn from_config(config: &SwapConfig) -> SwapResult<Self> {
        let mut providers = HashMap::new();
        for chain in config.chains.values().filter(|chain| chain.enabled) {
            let parsed_url = chain
                .rpc_url
                .parse()
                .map_err(|e| SwapError::Config(format!("Invalid RPC URL {}: {}", chain.rpc_url, e)))?;
            providers.insert(chain.chain_id, ProviderBuilder::new().on_http(parsed_url));
            info!("RPC provider ready for {} ({})", chain.name, chain.chain_id);
        }

        Ok(Self {
            providers,
            retry: RetryPolicy::new(
                config.aggregator.max_retries,
                Duration::from_millis(config.aggregator.retry_initial_delay_ms),
            ),
            call_timeout: config.tracking.rpc_timeout(),
        })
    }

    fn provider(&self, chain_id: u64) -> SwapResult<&RootProvider<Http<Client>>> {
        self.providers
            .get(&chain_id)
            .ok_or(SwapError::UnsupportedChain(chain_id))
    }

    /// Read-only call with timeout and backoff on transport errors.
    async fn read<T, F, Fut>(&self, label: &str, op: F) -> SwapResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SwapResult<T>>,
    {
        let timeout = self.call_timeout;
        retry_with_backoff(self.retry, label, |_| {
            let call = op();
            async move {
                match tokio::time::timeout(timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(SwapError::Network(format!("RPC call timed out after {:?}", timeout))),
                }
            }
        })
        .await
    }
}

#[async_trait]
impl ChainSubmitter for RpcChainSubmitter {
    async fn transaction_count(&self, chain_id: u64, address: Address) -> SwapResult<u64> {
        let provider = self.provider(chain_id)?;
        self.read("eth_getTransactionCount", || async move {
            provider
                .get_transaction_count(address)
                .await
                .map_err(|e| SwapError::Network(format!("Failed to get nonce: {}", e)))
        })
        .await
    }

    async fn gas_price(&self, chain_id: u64) -> SwapResult<u128> {
        let provider = self.provider(chain_id)?;
        self.read("eth_gasPrice", || async move {
            provider
                .get_gas_price()
                .await
                .map_err(|e| SwapError::Network(format!("Failed to get gas price: {}", e)))
        })
        .await
    }

    async fn native_balance(&self, chain_id: u64, address: Address) -> SwapResult<U256> {
        let provider = self.provider(chain_id)?;
        self.read("eth_getBalance", || async move {
            provider
                .get_balance(address)
                .await
                .map_err(|e| SwapError::Network(format!("Failed to get balance: {}", e)))
        })
        .await
    }

    async fn submit_raw_transaction(&self, chain_id: u64, raw: &Bytes) -> SwapResult<TxHash> {
        let provider = self.provider(chain_id)?;
        let submission = tokio::time::timeout(self.call_timeout, provider.send_raw_transaction(raw.as_ref()))
            .await
            .map_err(|_| SwapError::Submission {
                chain_id,
                reason: format!("broadcast timed out after {:?}", self.call_timeout),
            })?;

        match submission {
            Ok(pending) => {
                let tx_hash = *pending.tx_hash();
                info!("Broadcast transaction {} on chain {}", tx_hash, chain_id);
                Ok(tx_hash)
            }
            Err(e) => {
                warn!("Chain {} rejected transaction: {}", chain_id, e);
                Err(SwapError::Submission {
                    chain_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn confirmation_status(&self, chain_id: u64, tx_hash: TxHash) -> SwapResult<ConfirmationStatus> {
        let provider = self.provider(chain_id)?;
        let receipt = self
            .read("eth_getTransactionReceipt", || async move {
                provider
                    .get_transaction_receipt(tx_hash)
                    .await
                    .map_err(|e| SwapError::Network(format!("Failed to get receipt: {}", e)))
            })
            .await?;

        let Some(receipt) = receipt else {
            return Ok(ConfirmationStatus::Pending);
        };
        let Some(block_number) = receipt.block_number else {
            return Ok(ConfirmationStatus::Pending);
        };
        if !receipt.status() {
            return Ok(ConfirmationStatus::Reverted { block_number });
        }

        let latest = self
            .read("eth_blockNumber", || async move {
                provider
                    .get_block_number()
                    .await
                    .map_err(|e| SwapError::Network(format!("Failed to get block number: {}", e)))
            })
            .await?;
        let confirmations = latest.saturating_sub(block_number) + 1;
        debug!("{} on chain {}: block {}, {} confirmation(s)", tx_hash, chain_id, block_number, confirmations);

        Ok(ConfirmationStatus::Included {
            block_number,
            confirmations,
        })
    }
}
