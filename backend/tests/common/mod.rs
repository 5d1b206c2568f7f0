#![allow(dead_code)]

use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use euclid_swap_backend::bridges::{BridgeStatusProvider, RelayState, RelayStatus};
use euclid_swap_backend::crosschain::{CrossChainTracker, TrackerSettings};
use euclid_swap_backend::error::{SwapError, SwapResult};
use euclid_swap_backend::execution::{
    ChainExecutionSettings, ChainSubmitter, ConfirmationStatus, SignedTransaction, SigningAccount, SwapExecutor,
    TransactionSigner, UnsignedTransaction,
};
use euclid_swap_backend::retry::RetryPolicy;
use euclid_swap_backend::routing::{QuoteClient, QuoteProvider, SwapCalldata};
use euclid_swap_backend::slippage::ValidatedRoute;
use euclid_swap_backend::types::{Route, RouteHop, SwapRequest};
use euclid_swap_backend::SwapOrchestrator;

pub const PLUME_CHAIN: u64 = 98867;
pub const SOMNIA_CHAIN: u64 = 50312;
pub const PHAROS_CHAIN: u64 = 688688;
pub const ARBITRUM_SEPOLIA: u64 = 421614;

pub fn units(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
}

/// `tenths` / 10 tokens in 18-decimal base units.
pub fn tenths(tenths: u64) -> U256 {
    U256::from(tenths) * U256::from(10u64).pow(U256::from(17u64))
}

pub fn plume_to_stt(amount: U256, slippage_bps: u32) -> SwapRequest {
    SwapRequest::new("plume", "stt", PLUME_CHAIN, PLUME_CHAIN, amount, slippage_bps)
}

pub fn phrs_to_eth(amount: U256) -> SwapRequest {
    SwapRequest::new("phrs", "eth", PHAROS_CHAIN, ARBITRUM_SEPOLIA, amount, 50)
}

pub fn route(amount_out: U256, ttl_seconds: i64) -> Route {
    let now = Utc::now();
    Route {
        provider: "mock".to_string(),
        amount_out,
        path: vec![RouteHop {
            dex: "euclid".to_string(),
            chain_uid: "vsl".to_string(),
            tokens: vec!["in".to_string(), "out".to_string()],
            amount_in: U256::ZERO,
            amount_out,
            amount_out_for_hops: Vec::new(),
        }],
        quoted_at: now,
        expiry: now + ChronoDuration::seconds(ttl_seconds),
    }
}

/// Aggregator double: hands out scripted results, then a fixed route.
pub struct MockQuoteProvider {
    amount_out: U256,
    ttl_seconds: i64,
    scripted: Mutex<VecDeque<SwapResult<Route>>>,
    delay: Duration,
    build_delay: Duration,
    pub fetches: AtomicU32,
    pub builds: AtomicU32,
}

impl MockQuoteProvider {
    pub fn new(amount_out: U256) -> Self {
        Self {
            amount_out,
            ttl_seconds: 60,
            scripted: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            build_delay: Duration::ZERO,
            fetches: AtomicU32::new(0),
            builds: AtomicU32::new(0),
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    pub fn then(self, result: SwapResult<Route>) -> Self {
        self.scripted.lock().unwrap().push_back(result);
        self
    }
}

#[async_trait]
impl QuoteProvider for MockQuoteProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_route(&self, _request: &SwapRequest) -> SwapResult<Route> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(result) = self.scripted.lock().unwrap().pop_front() {
            return result;
        }
        Ok(route(self.amount_out, self.ttl_seconds))
    }

    async fn build_swap(
        &self,
        route: &ValidatedRoute,
        request: &SwapRequest,
        _sender: Address,
    ) -> SwapResult<SwapCalldata> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if !self.build_delay.is_zero() {
            tokio::time::sleep(self.build_delay).await;
        }
        let mut data = route.min_amount_out().to_be_bytes_vec();
        data.extend_from_slice(request.source_token.as_bytes());
        Ok(SwapCalldata {
            to: Address::repeat_byte(0xee),
            value: request.amount_in,
            data: Bytes::from(data),
            gas_limit: Some(300_000),
        })
    }
}

/// Signer double: raw bytes carry chain id and nonce so hashes are unique.
pub struct MockSigner {
    address: Address,
    pub signed: Mutex<Vec<UnsignedTransaction>>,
}

impl MockSigner {
    pub fn new() -> Self {
        Self {
            address: Address::repeat_byte(0x11),
            signed: Mutex::new(Vec::new()),
        }
    }

    pub fn nonces(&self) -> Vec<u64> {
        self.signed.lock().unwrap().iter().map(|tx| tx.nonce).collect()
    }
}

pub fn raw_for(chain_id: u64, nonce: u64) -> Bytes {
    let mut raw = chain_id.to_be_bytes().to_vec();
    raw.extend_from_slice(&nonce.to_be_bytes());
    Bytes::from(raw)
}

#[async_trait]
impl TransactionSigner for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(&self, tx: &UnsignedTransaction) -> SwapResult<SignedTransaction> {
        self.signed.lock().unwrap().push(tx.clone());
        let raw = raw_for(tx.chain_id, tx.nonce);
        Ok(SignedTransaction {
            hash: keccak256(&raw),
            raw,
        })
    }
}

/// Chain double. Transactions confirm after `confirm_after_polls` receipt
/// lookups unless listed as stuck or reverted.
pub struct MockChainSubmitter {
    pub balance: U256,
    pub gas_price: u128,
    pub start_nonce: u64,
    pub confirm_after_polls: u32,
    pub reject_submissions: bool,
    pub submit_delay: Duration,
    pub submissions: AtomicU32,
    pub submitted: Mutex<Vec<(u64, TxHash)>>,
    pub stuck: Mutex<HashSet<TxHash>>,
    pub reverted: Mutex<HashSet<TxHash>>,
    polls: Mutex<HashMap<TxHash, u32>>,
}

impl MockChainSubmitter {
    pub fn new() -> Self {
        Self {
            balance: units(1_000_000),
            gas_price: 1_000_000_000,
            start_nonce: 7,
            confirm_after_polls: 1,
            reject_submissions: false,
            submit_delay: Duration::ZERO,
            submissions: AtomicU32::new(0),
            submitted: Mutex::new(Vec::new()),
            stuck: Mutex::new(HashSet::new()),
            reverted: Mutex::new(HashSet::new()),
            polls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    pub fn rejecting(mut self) -> Self {
        self.reject_submissions = true;
        self
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn with_confirm_after(mut self, polls: u32) -> Self {
        self.confirm_after_polls = polls;
        self
    }

    pub fn never_confirm(&self, hash: TxHash) {
        self.stuck.lock().unwrap().insert(hash);
    }

    pub fn revert(&self, hash: TxHash) {
        self.reverted.lock().unwrap().insert(hash);
    }

    pub fn submission_count(&self) -> u32 {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainSubmitter for MockChainSubmitter {
    async fn transaction_count(&self, _chain_id: u64, _address: Address) -> SwapResult<u64> {
        Ok(self.start_nonce)
    }

    async fn gas_price(&self, _chain_id: u64) -> SwapResult<u128> {
        Ok(self.gas_price)
    }

    async fn native_balance(&self, _chain_id: u64, _address: Address) -> SwapResult<U256> {
        Ok(self.balance)
    }

    async fn submit_raw_transaction(&self, chain_id: u64, raw: &Bytes) -> SwapResult<TxHash> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        if self.reject_submissions {
            return Err(SwapError::Submission {
                chain_id,
                reason: "nonce too low".to_string(),
            });
        }
        let hash = keccak256(raw);
        self.submitted.lock().unwrap().push((chain_id, hash));
        Ok(hash)
    }

    async fn confirmation_status(&self, _chain_id: u64, tx_hash: TxHash) -> SwapResult<ConfirmationStatus> {
        if self.stuck.lock().unwrap().contains(&tx_hash) {
            return Ok(ConfirmationStatus::Pending);
        }
        if self.reverted.lock().unwrap().contains(&tx_hash) {
            return Ok(ConfirmationStatus::Reverted { block_number: 100 });
        }
        let mut polls = self.polls.lock().unwrap();
        let seen = polls.entry(tx_hash).or_insert(0);
        *seen += 1;
        if *seen >= self.confirm_after_polls {
            Ok(ConfirmationStatus::Included {
                block_number: 100,
                confirmations: 3,
            })
        } else {
            Ok(ConfirmationStatus::Pending)
        }
    }
}

/// Relay double that replays a status script and then repeats the last entry.
pub struct MockBridge {
    script: Mutex<VecDeque<SwapResult<RelayStatus>>>,
    last: Mutex<SwapResult<RelayStatus>>,
    pub polls: AtomicU32,
}

impl MockBridge {
    pub fn new(script: Vec<SwapResult<RelayStatus>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(Ok(RelayStatus::pending())),
            polls: AtomicU32::new(0),
        }
    }

    pub fn always_pending() -> Self {
        Self::new(Vec::new())
    }

    pub fn delivering(destination: TxHash, after_polls: usize) -> Self {
        let mut script: Vec<SwapResult<RelayStatus>> = (0..after_polls)
            .map(|_| {
                Ok(RelayStatus {
                    state: RelayState::InFlight,
                    destination_tx_hash: None,
                })
            })
            .collect();
        script.push(Ok(RelayStatus {
            state: RelayState::Delivered,
            destination_tx_hash: Some(destination),
        }));
        Self::new(script)
    }
}

#[async_trait]
impl BridgeStatusProvider for MockBridge {
    fn name(&self) -> &str {
        "mock relay"
    }

    async fn relay_status(&self, _source_chain_id: u64, _source_tx_hash: TxHash) -> SwapResult<RelayStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => {
                *self.last.lock().unwrap() = result.clone();
                result
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

pub fn fast_settings() -> TrackerSettings {
    TrackerSettings {
        poll_interval: Duration::from_millis(5),
        source_timeout: Duration::from_millis(300),
        bridge_timeout: Duration::from_millis(300),
        destination_timeout: Duration::from_millis(300),
        confirmations: HashMap::new(),
    }
}

pub fn chain_settings() -> HashMap<u64, ChainExecutionSettings> {
    [PLUME_CHAIN, SOMNIA_CHAIN, PHAROS_CHAIN, ARBITRUM_SEPOLIA]
        .into_iter()
        .map(|chain_id| {
            (
                chain_id,
                ChainExecutionSettings {
                    gas_limit: 800_000,
                    gas_price_multiplier: 1.1,
                },
            )
        })
        .collect()
}

/// Everything wired together over test doubles.
pub struct Harness {
    pub quotes: Arc<MockQuoteProvider>,
    pub submitter: Arc<MockChainSubmitter>,
    pub bridge: Arc<MockBridge>,
    pub signer: Arc<MockSigner>,
    pub executor: Arc<SwapExecutor>,
    pub tracker: Arc<CrossChainTracker>,
    pub orchestrator: Arc<SwapOrchestrator>,
}

impl Harness {
    pub fn new(quotes: MockQuoteProvider, submitter: MockChainSubmitter, bridge: MockBridge) -> Self {
        Self::with_settings(quotes, submitter, bridge, fast_settings())
    }

    pub fn with_settings(
        quotes: MockQuoteProvider,
        submitter: MockChainSubmitter,
        bridge: MockBridge,
        settings: TrackerSettings,
    ) -> Self {
        let quotes = Arc::new(quotes);
        let submitter = Arc::new(submitter);
        let bridge = Arc::new(bridge);
        let signer = Arc::new(MockSigner::new());
        let account = Arc::new(SigningAccount::new(signer.clone()));

        let executor = Arc::new(SwapExecutor::new(
            quotes.clone(),
            submitter.clone(),
            account,
            chain_settings(),
        ));
        let tracker = Arc::new(CrossChainTracker::new(submitter.clone(), bridge.clone(), settings));
        let client = QuoteClient::new(quotes.clone(), RetryPolicy::new(3, Duration::from_millis(1)), Duration::from_secs(1));
        let orchestrator = Arc::new(SwapOrchestrator::new(client, executor.clone(), tracker.clone()));

        Self {
            quotes,
            submitter,
            bridge,
            signer,
            executor,
            tracker,
            orchestrator,
        }
    }
}
