use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{SwapError, SwapResult};
use crate::types::{to_base_units, SwapRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    pub aggregator: AggregatorConfig,
    pub relay: RelayConfig,
    pub chains: HashMap<u64, ChainConfig>,
    pub tracking: TrackingConfig,
    pub pairs: HashMap<String, PairConfig>,
    pub adaptive: AdaptiveConfig,
    pub signer: SignerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub api_url: String,
    pub timeout_seconds: u64,
    pub route_limit: u32,
    pub route_ttl_seconds: u64,
    pub partner_fee_bps: u32,
    pub partner_fee_recipient: String,
    pub max_retries: u32,
    pub retry_initial_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub api_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub chain_uid: String, // Euclid's identifier for the chain
    pub rpc_url: String,
    pub explorer_url: String,
    pub native_token: String,
    pub gas_limit: u64,
    pub gas_price_multiplier: f64,
    pub confirmation_blocks: u64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub poll_interval_ms: u64,
    pub source_timeout_seconds: u64,
    pub bridge_timeout_seconds: u64,
    pub destination_timeout_seconds: u64,
    pub rpc_timeout_seconds: u64,
}

/// A named swap direction, e.g. `plume-stt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    pub source_token: String,
    pub destination_token: String,
    pub source_chain_id: u64,
    pub destination_chain_id: u64,
    pub decimals: u32,
    pub default_amount: Decimal,
    pub slippage_bps: u32,
    /// Destination tokens expected per source token. Quotes are held to this
    /// rate; without it they are only held to their own estimate.
    #[serde(default)]
    pub expected_rate: Option<Decimal>,
    pub reverse: Option<String>,
}

impl PairConfig {
    /// Request for `amount` whole tokens of this pair.
    pub fn request(&self, amount: Decimal) -> SwapResult<SwapRequest> {
        let request = SwapRequest::new(
            self.source_token.clone(),
            self.destination_token.clone(),
            self.source_chain_id,
            self.destination_chain_id,
            to_base_units(amount, self.decimals)?,
            self.slippage_bps,
        );

        match self.expected_rate {
            Some(rate) => {
                let expected = amount
                    .checked_mul(rate)
                    .ok_or_else(|| SwapError::InvalidRequest(format!("amount {} is too large", amount)))?;
                Ok(request.with_expected_amount_out(to_base_units(expected, self.decimals)?))
            }
            None => Ok(request),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    pub enabled: bool,
    pub increment_step: Decimal,
    pub decrement_step: Decimal,
    pub stability_threshold: u32,
    pub max_increment_attempts: u32,
    pub max_ceiling: Decimal,
    pub direction_switch_failures: u32,
    pub direction_switch_cooldown_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Name of the environment variable holding the key, never the key itself.
    pub private_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for SwapConfig {
    fn default() -> Self {
        let mut chains = HashMap::new();

        // Plume testnet
        chains.insert(98867, ChainConfig {
            chain_id: 98867,
            name: "Plume Testnet".to_string(),
            chain_uid: "plume".to_string(),
            rpc_url: "https://testnet-rpc.plume.org".to_string(),
            explorer_url: "https://testnet-explorer.plume.org".to_string(),
            native_token: "PLUME".to_string(),
            gas_limit: 800_000,
            gas_price_multiplier: 1.05,
            confirmation_blocks: 1,
            enabled: true,
        });

        // Somnia testnet
        chains.insert(50312, ChainConfig {
            chain_id: 50312,
            name: "Somnia Testnet".to_string(),
            chain_uid: "somnia".to_string(),
            rpc_url: "https://dream-rpc.somnia.network/".to_string(),
            explorer_url: "https://shannon-explorer.somnia.network".to_string(),
            native_token: "STT".to_string(),
            gas_limit: 800_000,
            gas_price_multiplier: 1.05,
            confirmation_blocks: 1,
            enabled: true,
        });

        // Pharos devnet
        chains.insert(688688, ChainConfig {
            chain_id: 688688,
            name: "Pharos Testnet".to_string(),
            chain_uid: "pharos".to_string(),
            rpc_url: "https://testnet.dplabs-internal.com".to_string(),
            explorer_url: "https://testnet.pharosscan.xyz".to_string(),
            native_token: "PHRS".to_string(),
            gas_limit: 800_000,
            gas_price_multiplier: 1.1,
            confirmation_blocks: 1,
            enabled: true,
        });

        // Arbitrum Sepolia
        chains.insert(421614, ChainConfig {
            chain_id: 421614,
            name: "Arbitrum Sepolia".to_string(),
            chain_uid: "arbitrum".to_string(),
            rpc_url: "https://sepolia-rollup.arbitrum.io/rpc".to_string(),
            explorer_url: "https://sepolia.arbiscan.io".to_string(),
            native_token: "ETH".to_string(),
            gas_limit: 800_000,
            gas_price_multiplier: 1.1,
            confirmation_blocks: 1,
            enabled: true,
        });

        let mut pairs = HashMap::new();
        pairs.insert("plume-stt".to_string(), PairConfig {
            source_token: "plume".to_string(),
            destination_token: "stt".to_string(),
            source_chain_id: 98867,
            destination_chain_id: 98867,
            decimals: 18,
            default_amount: dec!(0.1),
            slippage_bps: 500,
            expected_rate: Some(dec!(0.2)),
            reverse: Some("stt-plume".to_string()),
        });
        pairs.insert("stt-plume".to_string(), PairConfig {
            source_token: "stt".to_string(),
            destination_token: "plume".to_string(),
            source_chain_id: 50312,
            destination_chain_id: 50312,
            decimals: 18,
            default_amount: dec!(0.029),
            slippage_bps: 500,
            expected_rate: Some(dec!(5)),
            reverse: Some("plume-stt".to_string()),
        });
        pairs.insert("phrs-eth".to_string(), PairConfig {
            source_token: "phrs".to_string(),
            destination_token: "eth".to_string(),
            source_chain_id: 688688,
            destination_chain_id: 421614,
            decimals: 18,
            default_amount: dec!(0.1),
            slippage_bps: 500,
            expected_rate: None,
            reverse: Some("eth-phrs".to_string()),
        });
        pairs.insert("eth-phrs".to_string(), PairConfig {
            source_token: "eth".to_string(),
            destination_token: "phrs".to_string(),
            source_chain_id: 421614,
            destination_chain_id: 688688,
            decimals: 18,
            default_amount: dec!(0.0001),
            slippage_bps: 500,
            expected_rate: None,
            reverse: Some("phrs-eth".to_string()),
        });

        Self {
            aggregator: AggregatorConfig {
                api_url: "https://testnet.api.euclidprotocol.com".to_string(),
                timeout_seconds: 30,
                route_limit: 10,
                route_ttl_seconds: 60,
                partner_fee_bps: 10,
                partner_fee_recipient: String::new(),
                max_retries: 3,
                retry_initial_delay_ms: 500,
            },
            relay: RelayConfig {
                api_url: "https://testnet.api.euclidprotocol.com".to_string(),
                timeout_seconds: 15,
            },
            chains,
            tracking: TrackingConfig {
                poll_interval_ms: 5_000,
                source_timeout_seconds: 300,
                bridge_timeout_seconds: 900,
                destination_timeout_seconds: 300,
                rpc_timeout_seconds: 15,
            },
            pairs,
            adaptive: AdaptiveConfig {
                enabled: true,
                increment_step: dec!(0.1),
                decrement_step: dec!(0.1),
                stability_threshold: 5,
                max_increment_attempts: 5,
                max_ceiling: dec!(1.0),
                direction_switch_failures: 3,
                direction_switch_cooldown_seconds: 5,
            },
            signer: SignerConfig {
                private_key_env: "PRIVATE_KEY".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

impl TrackingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_seconds)
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge_timeout_seconds)
    }

    pub fn destination_timeout(&self) -> Duration {
        Duration::from_secs(self.destination_timeout_seconds)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }
}

impl SwapConfig {
    pub fn load_from_file(path: &str) -> SwapResult<Self> {
        info!("Loading swap configuration from: {}", path);

        if !Path::new(path).exists() {
            warn!("Configuration file not found at {}, creating default config", path);
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SwapError::Config(format!("cannot read {}: {}", path, e)))?;
        let config: SwapConfig = serde_json::from_str(&content)
            .map_err(|e| SwapError::Config(format!("cannot parse {}: {}", path, e)))?;

        info!("Swap configuration loaded successfully");
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> SwapResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SwapError::Config(e.to_string()))?;
        fs::write(path, content)
            .map_err(|e| SwapError::Config(format!("cannot write {}: {}", path, e)))?;
        info!("Swap configuration saved to: {}", path);
        Ok(())
    }

    /// Apply `EUCLID_*` and `CHAIN_<id>_RPC_URL` overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(api_url) = env::var("EUCLID_API_URL") {
            self.relay.api_url = api_url.clone();
            self.aggregator.api_url = api_url;
        }

        if let Ok(level) = env::var("EUCLID_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json) = env::var("EUCLID_LOG_JSON") {
            self.logging.json = json.parse().unwrap_or(self.logging.json);
        }

        if let Ok(ttl) = env::var("EUCLID_ROUTE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.aggregator.route_ttl_seconds = ttl;
            }
        }

        if let Ok(timeout) = env::var("EUCLID_BRIDGE_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.tracking.bridge_timeout_seconds = timeout;
            }
        }

        if let Ok(key_env) = env::var("EUCLID_PRIVATE_KEY_ENV") {
            self.signer.private_key_env = key_env;
        }

        for (chain_id, chain_config) in self.chains.iter_mut() {
            let env_key = format!("CHAIN_{}_RPC_URL", chain_id);
            if let Ok(rpc_url) = env::var(&env_key) {
                chain_config.rpc_url = rpc_url;
                info!("Loaded custom RPC URL for chain {}: {}", chain_id, chain_config.rpc_url);
            }
        }

        self
    }

    pub fn load_from_env() -> Self {
        let config = Self::default().with_env_overrides();
        info!("Swap configuration loaded from environment variables");
        config
    }

    pub fn get_chain_config(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.get(&chain_id)
    }

    pub fn chain(&self, chain_id: u64) -> SwapResult<&ChainConfig> {
        self.chains
            .get(&chain_id)
            .filter(|chain| chain.enabled)
            .ok_or(SwapError::UnsupportedChain(chain_id))
    }

    pub fn is_chain_enabled(&self, chain_id: u64) -> bool {
        self.chains.get(&chain_id)
            .map(|config| config.enabled)
            .unwrap_or(false)
    }

    pub fn pair(&self, name: &str) -> SwapResult<&PairConfig> {
        self.pairs
            .get(name)
            .ok_or_else(|| SwapError::Config(format!("unknown pair preset {}", name)))
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.aggregator.api_url.is_empty() {
            errors.push("Aggregator has empty API URL".to_string());
        }
        if self.aggregator.timeout_seconds == 0 {
            errors.push("Aggregator has zero timeout".to_string());
        }
        if self.aggregator.route_ttl_seconds == 0 {
            errors.push("Aggregator route TTL must be positive".to_string());
        }
        if self.aggregator.max_retries == 0 {
            errors.push("Aggregator must allow at least one attempt".to_string());
        }
        if self.relay.api_url.is_empty() {
            errors.push("Relay has empty API URL".to_string());
        }

        for (chain_id, config) in &self.chains {
            if config.enabled {
                if config.rpc_url.is_empty() {
                    errors.push(format!("Chain {} has empty RPC URL", chain_id));
                }

                if config.chain_uid.is_empty() {
                    errors.push(format!("Chain {} has empty chain uid", chain_id));
                }

                if config.confirmation_blocks == 0 {
                    errors.push(format!("Chain {} has zero confirmation blocks", chain_id));
                }

                if config.gas_limit == 0 {
                    errors.push(format!("Chain {} has zero gas limit", chain_id));
                }

                if config.gas_price_multiplier < 1.0 {
                    errors.push(format!("Chain {} gas price multiplier is below 1.0", chain_id));
                }
            }
        }

        if self.tracking.poll_interval_ms == 0 {
            errors.push("Tracking poll interval must be positive".to_string());
        }
        if self.tracking.source_timeout_seconds == 0
            || self.tracking.bridge_timeout_seconds == 0
            || self.tracking.destination_timeout_seconds == 0
            || self.tracking.rpc_timeout_seconds == 0
        {
            errors.push("Tracking timeouts must be positive".to_string());
        }

        for (name, pair) in &self.pairs {
            if !self.is_chain_enabled(pair.source_chain_id) {
                errors.push(format!("Pair {} uses unknown source chain {}", name, pair.source_chain_id));
            }
            if !self.is_chain_enabled(pair.destination_chain_id) {
                errors.push(format!("Pair {} uses unknown destination chain {}", name, pair.destination_chain_id));
            }
            if pair.slippage_bps > 10_000 {
                errors.push(format!("Pair {} slippage exceeds 10000 bps", name));
            }
            if pair.default_amount <= Decimal::ZERO {
                errors.push(format!("Pair {} has non-positive default amount", name));
            }
            if matches!(pair.expected_rate, Some(rate) if rate <= Decimal::ZERO) {
                errors.push(format!("Pair {} has non-positive expected rate", name));
            }
            if let Some(reverse) = &pair.reverse {
                if !self.pairs.contains_key(reverse) {
                    errors.push(format!("Pair {} reverses to unknown pair {}", name, reverse));
                }
            }
        }

        if self.signer.private_key_env.is_empty() {
            errors.push("Signer key environment variable name is empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
