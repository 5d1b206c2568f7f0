use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{SwapError, SwapResult};
use crate::types::{Route, SwapRequest};

pub const BPS_DENOMINATOR: u32 = 10_000;

/// A route that passed the slippage and expiry gate. Only the guard builds these.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRoute {
    route: Route,
    min_amount_out: U256,
    tolerance_bps: u32,
}

impl ValidatedRoute {
    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn min_amount_out(&self) -> U256 {
        self.min_amount_out
    }

    /// Tolerance below the quoted amount, in bps, that still lands on or above
    /// `min_amount_out`. This is what the swap builder enforces on-chain.
    pub fn tolerance_bps(&self) -> u32 {
        self.tolerance_bps
    }

    pub fn into_route(self) -> Route {
        self.route
    }
}

/// Rejects quotes that are stale or fall below the caller's tolerance.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlippageGuard;

impl SlippageGuard {
    pub fn new() -> Self {
        Self
    }

    /// `reference * (10000 - bps) / 10000`, floored.
    pub fn minimum_amount_out(reference: U256, slippage_bps: u32) -> SwapResult<U256> {
        if slippage_bps > BPS_DENOMINATOR {
            return Err(SwapError::InvalidRequest(format!(
                "slippage {} bps exceeds {}",
                slippage_bps, BPS_DENOMINATOR
            )));
        }
        let keep = U256::from(BPS_DENOMINATOR - slippage_bps);
        let scaled = reference
            .checked_mul(keep)
            .ok_or_else(|| SwapError::InvalidRequest("reference amount overflows".to_string()))?;
        Ok(scaled / U256::from(BPS_DENOMINATOR))
    }

    pub fn validate(&self, route: &Route, request: &SwapRequest) -> SwapResult<ValidatedRoute> {
        self.validate_at(route, request, Utc::now())
    }

    pub fn validate_at(
        &self,
        route: &Route,
        request: &SwapRequest,
        now: DateTime<Utc>,
    ) -> SwapResult<ValidatedRoute> {
        if route.is_expired_at(now) {
            warn!("Quote from {} expired at {}", route.provider, route.expiry);
            return Err(SwapError::QuoteExpired { expired_at: route.expiry });
        }

        let reference = request.expected_amount_out.unwrap_or(route.amount_out);
        let minimum = Self::minimum_amount_out(reference, request.slippage_bps)?;

        if route.amount_out < minimum {
            warn!(
                "Quoted output {} below minimum {} ({} bps of {})",
                route.amount_out, minimum, request.slippage_bps, reference
            );
            return Err(SwapError::SlippageExceeded {
                quoted: route.amount_out,
                minimum,
            });
        }

        let tolerance_bps = if reference == route.amount_out {
            request.slippage_bps
        } else {
            Self::tolerance_against(route.amount_out, minimum)
        };

        debug!(
            "Route accepted: quoted {} >= minimum {} ({} bps below quote)",
            route.amount_out, minimum, tolerance_bps
        );
        Ok(ValidatedRoute {
            route: route.clone(),
            min_amount_out: minimum,
            tolerance_bps,
        })
    }

    /// Largest bps below `quoted` whose floor is still at least `minimum`.
    fn tolerance_against(quoted: U256, minimum: U256) -> u32 {
        if quoted.is_zero() {
            return 0;
        }
        let gap = quoted.saturating_sub(minimum);
        let bps = gap.saturating_mul(U256::from(BPS_DENOMINATOR)) / quoted;
        u32::try_from(bps).unwrap_or(BPS_DENOMINATOR).min(BPS_DENOMINATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ETH: u128 = 1_000_000_000_000_000_000;

    fn route(amount_out: U256, expiry: DateTime<Utc>) -> Route {
        Route {
            provider: "test".to_string(),
            amount_out,
            path: vec![],
            quoted_at: expiry - Duration::seconds(60),
            expiry,
        }
    }

    fn request() -> SwapRequest {
        SwapRequest::new("plume", "stt", 98867, 98867, U256::from(100 * ETH), 50)
            .with_expected_amount_out(U256::from(100 * ETH))
    }

    #[test]
    fn test_threshold_passes_one_unit_below_fails() {
        let guard = SlippageGuard::new();
        let now = Utc::now();
        let threshold = U256::from(99_500_000_000_000_000_000u128);

        let ok = guard
            .validate_at(&route(threshold, now + Duration::seconds(30)), &request(), now)
            .unwrap();
        assert_eq!(ok.min_amount_out(), threshold);

        let below = guard.validate_at(
            &route(threshold - U256::from(1u64), now + Duration::seconds(30)),
            &request(),
            now,
        );
        assert_eq!(
            below,
            Err(SwapError::SlippageExceeded {
                quoted: threshold - U256::from(1u64),
                minimum: threshold,
            })
        );
    }

    #[test]
    fn test_plume_stt_quotes() {
        let guard = SlippageGuard::new();
        let now = Utc::now();
        let expiry = now + Duration::seconds(30);

        let quote_996 = U256::from(99_600_000_000_000_000_000u128);
        let quote_990 = U256::from(99 * ETH);
        assert!(guard.validate_at(&route(quote_996, expiry), &request(), now).is_ok());
        assert!(guard.validate_at(&route(quote_990, expiry), &request(), now).is_err());
    }

    #[test]
    fn test_expired_quote_rejected() {
        let guard = SlippageGuard::new();
        let now = Utc::now();
        let expiry = now - Duration::milliseconds(1);

        let result = guard.validate_at(&route(U256::from(100 * ETH), expiry), &request(), now);
        assert_eq!(result, Err(SwapError::QuoteExpired { expired_at: expiry }));

        // exactly at expiry is still usable
        assert!(guard.validate_at(&route(U256::from(100 * ETH), now), &request(), now).is_ok());
    }

    #[test]
    fn test_validate_is_idempotent() {
        let guard = SlippageGuard::new();
        let now = Utc::now();
        let r = route(U256::from(99_700_000_000_000_000_000u128), now + Duration::seconds(10));

        let first = guard.validate_at(&r, &request(), now);
        let second = guard.validate_at(&r, &request(), now);
        assert_eq!(first, second);
    }

    #[test]
    fn test_route_estimate_is_reference_without_expectation() {
        let guard = SlippageGuard::new();
        let now = Utc::now();
        let req = SwapRequest::new("phrs", "eth", 688688, 421614, U256::from(ETH), 500);

        let validated = guard
            .validate_at(&route(U256::from(2_000u64), now + Duration::seconds(5)), &req, now)
            .unwrap();
        assert_eq!(validated.min_amount_out(), U256::from(1_900u64));
    }

    #[test]
    fn test_tolerance_keeps_builder_above_minimum() {
        let guard = SlippageGuard::new();
        let now = Utc::now();
        let req = SwapRequest::new("plume", "stt", 98867, 98867, U256::from(1_000u64), 500)
            .with_expected_amount_out(U256::from(1_000u64));

        let validated = guard
            .validate_at(&route(U256::from(990u64), now + Duration::seconds(5)), &req, now)
            .unwrap();
        assert_eq!(validated.min_amount_out(), U256::from(950u64));
        assert_eq!(validated.tolerance_bps(), 404);

        let builder_floor = SlippageGuard::minimum_amount_out(U256::from(990u64), validated.tolerance_bps()).unwrap();
        assert_eq!(builder_floor, validated.min_amount_out());

        // no expectation: the request's own tolerance
        let plain = SwapRequest::new("plume", "stt", 98867, 98867, U256::from(ETH), 500);
        let validated = guard
            .validate_at(&route(U256::from(100 * ETH), now + Duration::seconds(5)), &plain, now)
            .unwrap();
        assert_eq!(validated.tolerance_bps(), 500);
    }

    #[test]
    fn test_invalid_bps() {
        assert!(SlippageGuard::minimum_amount_out(U256::from(1u64), 10_001).is_err());
        assert_eq!(SlippageGuard::minimum_amount_out(U256::from(1u64), 10_000), Ok(U256::ZERO));
    }
}
