use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{QuoteProvider, SwapCalldata};
use crate::config::SwapConfig;
use crate::error::{SwapError, SwapResult};
use crate::slippage::ValidatedRoute;
use crate::types::{Route, RouteHop, SwapRequest};

/// Cross-chain paths settle through Euclid's virtual settlement layer.
const SETTLEMENT_CHAIN_UID: &str = "vsl";

#[derive(Debug, Clone)]
pub struct EuclidAggregator {
    client: Client,
    api_url: String,
    route_limit: u32,
    route_ttl: ChronoDuration,
    partner_fee_bps: u32,
    partner_fee_recipient: String,
    chain_uids: HashMap<u64, String>,
    native_tokens: HashSet<String>,
}

#[derive(Debug, Serialize)]
struct RoutesRequest {
    amount_in: String,
    chain_uids: Vec<String>,
    external: bool,
    token_in: String,
    token_out: String,
}

#[derive(Debug, Deserialize)]
struct RoutesResponse {
    #[serde(default)]
    paths: Vec<RoutePath>,
}

#[derive(Debug, Deserialize)]
struct RoutePath {
    #[serde(default)]
    path: Vec<RouteStep>,
}

#[derive(Debug, Deserialize)]
struct RouteStep {
    #[serde(default, alias = "tokens")]
    route: Vec<String>,
    #[serde(default)]
    dex: String,
    #[serde(default)]
    amount_in: Option<String>,
    amount_out: String,
    #[serde(default)]
    chain_uid: String,
    #[serde(default)]
    amount_out_for_hops: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SwapBuildRequest {
    amount_in: String,
    asset_in: AssetIn,
    cross_chain_addresses: Vec<CrossChainAddress>,
    sender: ChainAddress,
    slippage: String,
    swap_path: SwapPath,
    #[serde(rename = "partnerFee")]
    partner_fee: PartnerFee,
}

#[derive(Debug, Serialize)]
struct AssetIn {
    token: String,
    token_type: Value,
}

#[derive(Debug, Serialize)]
struct ChainAddress {
    address: String,
    chain_uid: String,
}

#[derive(Debug, Serialize)]
struct CrossChainAddress {
    user: ChainAddress,
    limit: OutputLimit,
}

#[derive(Debug, Serialize)]
struct OutputLimit {
    less_than_or_equal: String,
}

#[derive(Debug, Serialize)]
struct SwapPath {
    path: Vec<SwapPathStep>,
    total_price_impact: String,
}

#[derive(Debug, Serialize)]
struct SwapPathStep {
    route: Vec<String>,
    dex: String,
    amount_in: String,
    amount_out: String,
    chain_uid: String,
    amount_out_for_hops: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PartnerFee {
    partner_fee_bps: u32,
    recipient: String,
}

#[derive(Debug, Deserialize)]
struct SwapBuildResponse {
    #[serde(default)]
    msgs: Vec<SwapMsg>,
}

#[derive(Debug, Deserialize)]
struct SwapMsg {
    to: String,
    #[serde(default)]
    data: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    gas_limit: Option<u64>,
}

impl EuclidAggregator {
    pub fn from_config(config: &SwapConfig) -> SwapResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.aggregator.timeout_seconds))
            .build()
            .map_err(|e| SwapError::Config(format!("HTTP client error: {}", e)))?;

        let chain_uids = config
            .chains
            .values()
            .map(|chain| (chain.chain_id, chain.chain_uid.clone()))
            .collect();
        let native_tokens = config
            .chains
            .values()
            .map(|chain| chain.native_token.to_lowercase())
            .collect();

        Ok(Self {
            client,
            api_url: config.aggregator.api_url.trim_end_matches('/').to_string(),
            route_limit: config.aggregator.route_limit,
            route_ttl: ChronoDuration::seconds(config.aggregator.route_ttl_seconds as i64),
            partner_fee_bps: config.aggregator.partner_fee_bps,
            partner_fee_recipient: config.aggregator.partner_fee_recipient.clone(),
            chain_uids,
            native_tokens,
        })
    }

    fn chain_uid(&self, chain_id: u64) -> SwapResult<&str> {
        self.chain_uids
            .get(&chain_id)
            .map(String::as_str)
            .ok_or(SwapError::UnsupportedChain(chain_id))
    }

    fn asset_in(&self, token: &str) -> AssetIn {
        let token = token.to_lowercase();
        let token_type = if self.native_tokens.contains(&token) {
            json!({
                "__typename": "NativeTokenType",
                "native": { "__typename": "NativeToken", "denom": token }
            })
        } else {
            json!({
                "__typename": "SmartTokenType",
                "smart": { "__typename": "SmartToken", "contract_address": token }
            })
        };
        AssetIn { token, token_type }
    }

    fn build_request(
        &self,
        route: &ValidatedRoute,
        request: &SwapRequest,
        sender: Address,
    ) -> SwapResult<SwapBuildRequest> {
        let sender = format!("{:?}", sender).to_lowercase();
        let source_uid = self.chain_uid(request.source_chain_id)?.to_string();
        let destination_uid = self.chain_uid(request.destination_chain_id)?.to_string();
        let quoted = route.route();

        let path = quoted
            .path
            .iter()
            .map(|hop| SwapPathStep {
                route: hop.tokens.clone(),
                dex: hop.dex.clone(),
                amount_in: hop.amount_in.to_string(),
                amount_out: hop.amount_out.to_string(),
                chain_uid: SETTLEMENT_CHAIN_UID.to_string(),
                amount_out_for_hops: hop.amount_out_for_hops.clone(),
            })
            .collect();

        Ok(SwapBuildRequest {
            amount_in: request.amount_in.to_string(),
            asset_in: self.asset_in(&request.source_token),
            cross_chain_addresses: vec![CrossChainAddress {
                user: ChainAddress {
                    address: sender.clone(),
                    chain_uid: destination_uid,
                },
                limit: OutputLimit {
                    less_than_or_equal: quoted.amount_out.to_string(),
                },
            }],
            sender: ChainAddress {
                address: sender,
                chain_uid: source_uid,
            },
            // the builder applies this to the quote; it encodes the guard's minimum
            slippage: route.tolerance_bps().to_string(),
            swap_path: SwapPath {
                path,
                total_price_impact: "0.00".to_string(),
            },
            partner_fee: PartnerFee {
                partner_fee_bps: self.partner_fee_bps,
                recipient: self.partner_fee_recipient.clone(),
            },
        })
    }

    fn route_from_response(&self, response: RoutesResponse, request: &SwapRequest) -> SwapResult<Route> {
        let no_route = || SwapError::NoRoute {
            token_in: request.source_token.clone(),
            token_out: request.destination_token.clone(),
        };

        // Paths come back best first.
        let best = response.paths.into_iter().next().ok_or_else(no_route)?;
        if best.path.is_empty() {
            return Err(no_route());
        }

        let mut hops = Vec::with_capacity(best.path.len());
        for step in best.path {
            let amount_in = match step.amount_in.as_deref() {
                Some(raw) => parse_amount(raw)?,
                None => request.amount_in,
            };
            hops.push(RouteHop {
                dex: step.dex,
                chain_uid: step.chain_uid,
                tokens: step.route,
                amount_in,
                amount_out: parse_amount(&step.amount_out)?,
                amount_out_for_hops: step.amount_out_for_hops,
            });
        }

        let amount_out = hops.last().map(|hop| hop.amount_out).unwrap_or_default();
        if amount_out.is_zero() {
            return Err(no_route());
        }

        let quoted_at = Utc::now();
        Ok(Route {
            provider: "euclid".to_string(),
            amount_out,
            path: hops,
            quoted_at,
            expiry: quoted_at + self.route_ttl,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> SwapResult<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("Accept", "application/json, text/plain, */*")
            .json(body)
            .send()
            .await
            .map_err(|e| SwapError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        error!("Euclid API error {} from {}: {}", status, url, error_text);
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(SwapError::Network(format!("HTTP {}: {}", status, error_text)))
        } else {
            Err(SwapError::Aggregator(format!("HTTP {}: {}", status, error_text)))
        }
    }
}

#[async_trait]
impl QuoteProvider for EuclidAggregator {
    fn name(&self) -> &str {
        "Euclid"
    }

    async fn fetch_route(&self, request: &SwapRequest) -> SwapResult<Route> {
        let url = format!("{}/api/v1/routes?limit={}", self.api_url, self.route_limit);
        let body = RoutesRequest {
            amount_in: request.amount_in.to_string(),
            chain_uids: vec![],
            external: true,
            token_in: request.source_token.to_lowercase(),
            token_out: request.destination_token.to_lowercase(),
        };

        debug!("Fetching Euclid routes from: {}", url);
        let response = self.post(&url, &body).await?;
        let routes: RoutesResponse = response
            .json()
            .await
            .map_err(|e| SwapError::Aggregator(format!("JSON parsing error: {}", e)))?;

        self.route_from_response(routes, request)
    }

    async fn build_swap(
        &self,
        route: &ValidatedRoute,
        request: &SwapRequest,
        sender: Address,
    ) -> SwapResult<SwapCalldata> {
        let url = format!("{}/api/v1/execute/astro/swap", self.api_url);
        let body = self.build_request(route, request, sender)?;

        info!("Building Euclid swap for {} via {}", sender, url);
        let response = self.post(&url, &body).await?;
        let built: SwapBuildResponse = response
            .json()
            .await
            .map_err(|e| SwapError::Aggregator(format!("JSON parsing error: {}", e)))?;

        calldata_from_response(built)
    }
}

fn calldata_from_response(response: SwapBuildResponse) -> SwapResult<SwapCalldata> {
    let msg = response
        .msgs
        .into_iter()
        .next()
        .ok_or_else(|| SwapError::Aggregator("swap response has no msgs".to_string()))?;

    let to = Address::from_str(msg.to.trim())
        .map_err(|e| SwapError::Aggregator(format!("invalid target {}: {}", msg.to, e)))?;
    let data = if msg.data.trim().is_empty() {
        Bytes::new()
    } else {
        Bytes::from_str(msg.data.trim())
            .map_err(|e| SwapError::Aggregator(format!("invalid calldata: {}", e)))?
    };
    let value = match msg.value.as_deref() {
        Some(raw) => parse_amount(raw)?,
        None => U256::ZERO,
    };

    Ok(SwapCalldata {
        to,
        value,
        data,
        gas_limit: msg.gas_limit,
    })
}

/// Amounts arrive either as decimal strings or 0x-prefixed hex.
fn parse_amount(raw: &str) -> SwapResult<U256> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x") {
        Some("") => Ok(U256::ZERO),
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(raw, 10),
    };
    parsed.map_err(|e| SwapError::Aggregator(format!("invalid amount {}: {}", raw, e)))
}
