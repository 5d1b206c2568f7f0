use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::signer::{TransactionSigner, UnsignedTransaction};
use super::submitter::ChainSubmitter;
use crate::config::SwapConfig;
use crate::error::{SwapError, SwapResult};
use crate::progress::ProgressReporter;
use crate::routing::QuoteProvider;
use crate::slippage::{SlippageGuard, ValidatedRoute};
use crate::types::{Phase, Route, SwapIntent, SwapRequest, SwapTransaction};

/// A signing key plus the next nonce we expect to use on each chain.
/// Holding the lock is the only way to sign and submit with this key.
pub struct SigningAccount {
    signer: Arc<dyn TransactionSigner>,
    nonces: Mutex<HashMap<u64, u64>>,
}

impl SigningAccount {
    pub fn new(signer: Arc<dyn TransactionSigner>) -> Self {
        Self {
            signer,
            nonces: Mutex::new(HashMap::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &Arc<dyn TransactionSigner> {
        &self.signer
    }

    pub async fn lock(&self) -> MutexGuard<'_, HashMap<u64, u64>> {
        self.nonces.lock().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainExecutionSettings {
    pub gas_limit: u64,
    pub gas_price_multiplier: f64,
}

impl ChainExecutionSettings {
    pub fn adjusted_gas_price(&self, gas_price: u128) -> u128 {
        let per_mille = (self.gas_price_multiplier * 1000.0).round().max(1000.0) as u128;
        gas_price.saturating_mul(per_mille) / 1000
    }
}

/// Builds, signs and submits the source leg of a validated route.
pub struct SwapExecutor {
    quotes: Arc<dyn QuoteProvider>,
    submitter: Arc<dyn ChainSubmitter>,
    account: Arc<SigningAccount>,
    guard: SlippageGuard,
    chains: HashMap<u64, ChainExecutionSettings>,
}

impl SwapExecutor {
    pub fn new(
        quotes: Arc<dyn QuoteProvider>,
        submitter: Arc<dyn ChainSubmitter>,
        account: Arc<SigningAccount>,
        chains: HashMap<u64, ChainExecutionSettings>,
    ) -> Self {
        Self {
            quotes,
            submitter,
            account,
            guard: SlippageGuard::new(),
            chains,
        }
    }

    pub fn from_config(
        config: &SwapConfig,
        quotes: Arc<dyn QuoteProvider>,
        submitter: Arc<dyn ChainSubmitter>,
        account: Arc<SigningAccount>,
    ) -> Self {
        let chains = config
            .chains
            .values()
            .filter(|chain| chain.enabled)
            .map(|chain| {
                (
                    chain.chain_id,
                    ChainExecutionSettings {
                        gas_limit: chain.gas_limit,
                        gas_price_multiplier: chain.gas_price_multiplier,
                    },
                )
            })
            .collect();
        Self::new(quotes, submitter, account, chains)
    }

    pub fn account(&self) -> &Arc<SigningAccount> {
        &self.account
    }

    pub async fn execute(&self, route: &Route, request: &SwapRequest) -> SwapResult<SwapIntent> {
        self.execute_with_progress(route, request, &ProgressReporter::disabled())
            .await
    }

    pub async fn execute_with_progress(
        &self,
        route: &Route,
        request: &SwapRequest,
        progress: &ProgressReporter,
    ) -> SwapResult<SwapIntent> {
        self.execute_intent(route, request, progress, &CancellationToken::new())
            .await
            .map_err(|failure| failure.error)
    }

    /// Submit the source leg exactly once. Cross-chain intents come back in
    /// `Submitted` and are left for the tracker.
    ///
    /// Errors after the intent exists mark it failed and hand it back.
    /// Cancellation is honoured until signing and leaves the intent `Quoted`.
    pub async fn execute_intent(
        &self,
        route: &Route,
        request: &SwapRequest,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<SwapIntent, ExecutionFailure> {
        let chain_id = request.source_chain_id;
        let settings = *self
            .chains
            .get(&chain_id)
            .ok_or(SwapError::UnsupportedChain(chain_id))?;

        let validated = self.guard.validate(route, request)?;
        let mut intent = SwapIntent::new(request.clone(), validated.route().clone());
        progress.report(&intent);

        match self.submit(&validated, request, settings, &mut intent, cancel).await {
            Ok(()) => {
                progress.report(&intent);
                Ok(intent)
            }
            Err(SwapError::Cancelled) => {
                warn!("Swap {} cancelled before signing", intent.id);
                Err(ExecutionFailure {
                    error: SwapError::Cancelled,
                    intent: Some(intent),
                })
            }
            Err(error) => {
                if intent.fail(error.failure_kind()).is_ok() {
                    progress.report(&intent);
                }
                Err(ExecutionFailure {
                    error,
                    intent: Some(intent),
                })
            }
        }
    }

    async fn submit(
        &self,
        validated: &ValidatedRoute,
        request: &SwapRequest,
        settings: ChainExecutionSettings,
        intent: &mut SwapIntent,
        cancel: &CancellationToken,
    ) -> SwapResult<()> {
        let chain_id = request.source_chain_id;
        let sender = self.account.address();

        let calldata = tokio::select! {
            _ = cancel.cancelled() => return Err(SwapError::Cancelled),
            calldata = self.quotes.build_swap(validated, request, sender) => calldata?,
        };

        let mut nonces = tokio::select! {
            _ = cancel.cancelled() => return Err(SwapError::Cancelled),
            nonces = self.account.lock() => nonces,
        };

        // The build call can take long enough for the quote to go stale.
        self.guard.validate(validated.route(), request)?;

        let gas_price = settings.adjusted_gas_price(self.submitter.gas_price(chain_id).await?);
        let gas_limit = calldata.gas_limit.unwrap_or(settings.gas_limit);

        let required = U256::from(gas_price)
            .saturating_mul(U256::from(gas_limit))
            .saturating_add(calldata.value);
        let available = self.submitter.native_balance(chain_id, sender).await?;
        if available < required {
            warn!("Balance {} on chain {} cannot cover {}", available, chain_id, required);
            return Err(SwapError::InsufficientBalance {
                chain_id,
                required,
                available,
            });
        }

        let nonce = match nonces.get(&chain_id) {
            Some(next) => *next,
            None => self.submitter.transaction_count(chain_id, sender).await?,
        };

        let tx = UnsignedTransaction {
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            to: calldata.to,
            value: calldata.value,
            data: calldata.data,
        };
        if cancel.is_cancelled() {
            return Err(SwapError::Cancelled);
        }
        let signed = self.account.signer().sign_transaction(&tx).await?;

        info!(
            "Submitting swap {} on chain {} with nonce {} (gas {} @ {})",
            intent.id, chain_id, nonce, gas_limit, gas_price
        );
        let tx_hash = match self.submitter.submit_raw_transaction(chain_id, &signed.raw).await {
            Ok(tx_hash) => {
                nonces.insert(chain_id, nonce + 1);
                tx_hash
            }
            Err(e) => {
                // Chain state is unknown now; the next submission re-reads the nonce.
                nonces.remove(&chain_id);
                error!("Submission of swap {} failed: {}", intent.id, e);
                return Err(match e {
                    SwapError::Submission { .. } => e,
                    other => SwapError::Submission {
                        chain_id,
                        reason: other.to_string(),
                    },
                });
            }
        };
        drop(nonces);

        if tx_hash != signed.hash {
            warn!("Node returned hash {} for locally computed {}", tx_hash, signed.hash);
        }

        intent.push_leg(SwapTransaction::source(chain_id, tx_hash, nonce))?;
        intent.advance(Phase::Submitted)?;
        Ok(())
    }
}

/// An execution error, with the intent it happened to if one was created.
#[derive(Debug)]
pub struct ExecutionFailure {
    pub error: SwapError,
    pub intent: Option<SwapIntent>,
}

impl From<SwapError> for ExecutionFailure {
    fn from(error: SwapError) -> Self {
        Self { error, intent: None }
    }
}
