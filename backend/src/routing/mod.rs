use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AggregatorConfig;
use crate::error::{SwapError, SwapResult};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::slippage::{ValidatedRoute, BPS_DENOMINATOR};
use crate::types::{Route, SwapRequest};

pub mod euclid_api;

pub use euclid_api::EuclidAggregator;

/// Contract call the aggregator wants the sender to make.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapCalldata {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: Option<u64>,
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Get provider name
    fn name(&self) -> &str;

    /// Best route for the request at call time
    async fn fetch_route(&self, request: &SwapRequest) -> SwapResult<Route>;

    /// Swap call for a route that already passed the slippage gate
    async fn build_swap(
        &self,
        route: &ValidatedRoute,
        request: &SwapRequest,
        sender: Address,
    ) -> SwapResult<SwapCalldata>;
}

/// Route lookup with input validation, per-attempt timeout and backoff.
#[derive(Clone)]
pub struct QuoteClient {
    provider: Arc<dyn QuoteProvider>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl QuoteClient {
    pub fn new(provider: Arc<dyn QuoteProvider>, retry: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self {
            provider,
            retry,
            attempt_timeout,
        }
    }

    pub fn from_config(provider: Arc<dyn QuoteProvider>, config: &AggregatorConfig) -> Self {
        Self::new(
            provider,
            RetryPolicy::new(config.max_retries, Duration::from_millis(config.retry_initial_delay_ms)),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn provider(&self) -> Arc<dyn QuoteProvider> {
        Arc::clone(&self.provider)
    }

    pub fn validate_request(request: &SwapRequest) -> SwapResult<()> {
        if request.amount_in.is_zero() {
            return Err(SwapError::InvalidRequest("amount_in must be greater than zero".to_string()));
        }
        if request.source_token.trim().is_empty() || request.destination_token.trim().is_empty() {
            return Err(SwapError::InvalidRequest("token identifiers must not be empty".to_string()));
        }
        if request.source_token.eq_ignore_ascii_case(&request.destination_token) {
            return Err(SwapError::InvalidRequest(format!(
                "source and destination token are both {}",
                request.source_token
            )));
        }
        if request.slippage_bps > BPS_DENOMINATOR {
            return Err(SwapError::InvalidRequest(format!(
                "slippage {} bps exceeds {}",
                request.slippage_bps, BPS_DENOMINATOR
            )));
        }
        Ok(())
    }

    pub async fn get_route(&self, request: &SwapRequest) -> SwapResult<Route> {
        Self::validate_request(request)?;

        info!(
            "Requesting route from {}: {} {} -> {} (chains {} -> {})",
            self.provider.name(),
            request.amount_in,
            request.source_token,
            request.destination_token,
            request.source_chain_id,
            request.destination_chain_id
        );

        let route = retry_with_backoff(self.retry, "route quote", |attempt| {
            let provider = Arc::clone(&self.provider);
            let timeout = self.attempt_timeout;
            async move {
                debug!("Route attempt {} via {}", attempt, provider.name());
                match tokio::time::timeout(timeout, provider.fetch_route(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(SwapError::Network(format!(
                        "{} did not answer within {:?}",
                        provider.name(),
                        timeout
                    ))),
                }
            }
        })
        .await?;

        if route.amount_out.is_zero() || route.path.is_empty() {
            return Err(SwapError::NoRoute {
                token_in: request.source_token.clone(),
                token_out: request.destination_token.clone(),
            });
        }

        info!(
            "Route found via {}: estimated output {}, {} hop(s), valid until {}",
            route.provider,
            route.amount_out,
            route.path.len(),
            route.expiry
        );
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: u64, from: &str, to: &str) -> SwapRequest {
        SwapRequest::new(from, to, 98867, 98867, U256::from(amount), 50)
    }

    #[test]
    fn test_request_validation() {
        assert!(QuoteClient::validate_request(&request(1, "plume", "stt")).is_ok());
        assert!(matches!(
            QuoteClient::validate_request(&request(0, "plume", "stt")),
            Err(SwapError::InvalidRequest(_))
        ));
        assert!(matches!(
            QuoteClient::validate_request(&request(1, "plume", "PLUME")),
            Err(SwapError::InvalidRequest(_))
        ));

        let mut too_loose = request(1, "plume", "stt");
        too_loose.slippage_bps = 10_001;
        assert!(QuoteClient::validate_request(&too_loose).is_err());
    }
}
