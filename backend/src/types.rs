use alloy::primitives::{TxHash, U256};
use chrono::{DateTime, Utc};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{SwapError, SwapResult};

/// A caller's request to swap `amount_in` base units of one token for another.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    pub source_token: String,
    pub destination_token: String,
    pub source_chain_id: u64,
    pub destination_chain_id: u64,
    pub amount_in: U256,
    pub slippage_bps: u32,
    /// Output the caller expects; slippage is measured against it when present.
    pub expected_amount_out: Option<U256>,
}

impl SwapRequest {
    pub fn new(
        source_token: impl Into<String>,
        destination_token: impl Into<String>,
        source_chain_id: u64,
        destination_chain_id: u64,
        amount_in: U256,
        slippage_bps: u32,
    ) -> Self {
        Self {
            source_token: source_token.into(),
            destination_token: destination_token.into(),
            source_chain_id,
            destination_chain_id,
            amount_in,
            slippage_bps,
            expected_amount_out: None,
        }
    }

    pub fn with_expected_amount_out(mut self, expected: U256) -> Self {
        self.expected_amount_out = Some(expected);
        self
    }

    pub fn is_cross_chain(&self) -> bool {
        self.source_chain_id != self.destination_chain_id
    }
}

/// One hop of an aggregator path.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteHop {
    pub dex: String,
    pub chain_uid: String,
    pub tokens: Vec<String>,
    pub amount_in: U256,
    pub amount_out: U256,
    pub amount_out_for_hops: Vec<String>,
}

/// Aggregator quote. Only valid until `expiry`.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub provider: String,
    pub amount_out: U256,
    pub path: Vec<RouteHop>,
    pub quoted_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl Route {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegRole {
    Source,
    Destination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegStatus {
    Pending,
    Confirmed { block_number: u64, confirmations: u64 },
    Reverted,
}

/// One on-chain transaction belonging to a swap intent.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapTransaction {
    pub chain_id: u64,
    pub tx_hash: TxHash,
    /// Unknown for relay-submitted destination legs.
    pub nonce: Option<u64>,
    pub status: LegStatus,
    pub role: LegRole,
}

impl SwapTransaction {
    pub fn source(chain_id: u64, tx_hash: TxHash, nonce: u64) -> Self {
        Self {
            chain_id,
            tx_hash,
            nonce: Some(nonce),
            status: LegStatus::Pending,
            role: LegRole::Source,
        }
    }

    pub fn destination(chain_id: u64, tx_hash: TxHash) -> Self {
        Self {
            chain_id,
            tx_hash,
            nonce: None,
            status: LegStatus::Pending,
            role: LegRole::Destination,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapIntentId(pub Uuid);

impl SwapIntentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SwapIntentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwapIntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    SourceTimeout,
    BridgeTimeout,
    DestinationTimeout,
    UnknownBridgeState,
    BridgeFailed,
    Reverted,
    Rejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::SourceTimeout => "SourceTimeout",
            FailureKind::BridgeTimeout => "BridgeTimeout",
            FailureKind::DestinationTimeout => "DestinationTimeout",
            FailureKind::UnknownBridgeState => "UnknownBridgeState",
            FailureKind::BridgeFailed => "BridgeFailed",
            FailureKind::Reverted => "Reverted",
            FailureKind::Rejected => "Rejected",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a swap intent.
///
/// Cross-chain: Quoted, Submitted, SourceConfirmed, BridgePending,
/// DestinationSubmitted, DestinationConfirmed, Completed.
/// Same-chain: Quoted, Submitted, Confirmed, Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Quoted,
    Submitted,
    SourceConfirmed,
    BridgePending,
    DestinationSubmitted,
    DestinationConfirmed,
    Confirmed,
    Completed,
    Failed(FailureKind),
}

impl Phase {
    /// Position in the lifecycle ordering. Phases only ever move to a higher rank.
    pub fn rank(&self) -> u8 {
        match self {
            Phase::Quoted => 0,
            Phase::Submitted => 1,
            Phase::SourceConfirmed | Phase::Confirmed => 2,
            Phase::BridgePending => 3,
            Phase::DestinationSubmitted => 4,
            Phase::DestinationConfirmed => 5,
            Phase::Completed => 6,
            Phase::Failed(_) => 7,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed(_))
    }

    /// The single phase that may follow this one on the success path.
    pub fn successor(&self, cross_chain: bool) -> Option<Phase> {
        match (self, cross_chain) {
            (Phase::Quoted, _) => Some(Phase::Submitted),
            (Phase::Submitted, true) => Some(Phase::SourceConfirmed),
            (Phase::Submitted, false) => Some(Phase::Confirmed),
            (Phase::SourceConfirmed, true) => Some(Phase::BridgePending),
            (Phase::BridgePending, true) => Some(Phase::DestinationSubmitted),
            (Phase::DestinationSubmitted, true) => Some(Phase::DestinationConfirmed),
            (Phase::DestinationConfirmed, true) => Some(Phase::Completed),
            (Phase::Confirmed, false) => Some(Phase::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Quoted => f.write_str("Quoted"),
            Phase::Submitted => f.write_str("Submitted"),
            Phase::SourceConfirmed => f.write_str("SourceConfirmed"),
            Phase::BridgePending => f.write_str("BridgePending"),
            Phase::DestinationSubmitted => f.write_str("DestinationSubmitted"),
            Phase::DestinationConfirmed => f.write_str("DestinationConfirmed"),
            Phase::Confirmed => f.write_str("Confirmed"),
            Phase::Completed => f.write_str("Completed"),
            Phase::Failed(kind) => write!(f, "Failed({})", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub at: DateTime<Utc>,
}

/// The unit of work tracked from quote to settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapIntent {
    pub id: SwapIntentId,
    pub request: SwapRequest,
    pub route: Route,
    legs: Vec<SwapTransaction>,
    phase: Phase,
    history: Vec<PhaseRecord>,
}

impl SwapIntent {
    pub fn new(request: SwapRequest, route: Route) -> Self {
        Self {
            id: SwapIntentId::new(),
            request,
            route,
            legs: Vec::with_capacity(2),
            phase: Phase::Quoted,
            history: vec![PhaseRecord { phase: Phase::Quoted, at: Utc::now() }],
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn history(&self) -> &[PhaseRecord] {
        &self.history
    }

    pub fn legs(&self) -> &[SwapTransaction] {
        &self.legs
    }

    pub fn is_cross_chain(&self) -> bool {
        self.request.is_cross_chain()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn source_leg(&self) -> Option<&SwapTransaction> {
        self.leg(LegRole::Source)
    }

    pub fn destination_leg(&self) -> Option<&SwapTransaction> {
        self.leg(LegRole::Destination)
    }

    pub fn leg(&self, role: LegRole) -> Option<&SwapTransaction> {
        self.legs.iter().find(|leg| leg.role == role)
    }

    pub fn set_leg_status(&mut self, role: LegRole, status: LegStatus) -> SwapResult<()> {
        let leg = self
            .legs
            .iter_mut()
            .find(|leg| leg.role == role)
            .ok_or_else(|| SwapError::InvalidRequest(format!("intent {} has no {:?} leg", self.id, role)))?;
        leg.status = status;
        Ok(())
    }

    pub fn leg_hashes(&self) -> Vec<TxHash> {
        self.legs.iter().map(|leg| leg.tx_hash).collect()
    }

    /// Record a leg. The source leg comes first; a destination leg only exists for cross-chain intents.
    pub fn push_leg(&mut self, leg: SwapTransaction) -> SwapResult<()> {
        if self.leg(leg.role).is_some() {
            return Err(SwapError::InvalidRequest(format!(
                "intent {} already has a {:?} leg",
                self.id, leg.role
            )));
        }
        match leg.role {
            LegRole::Source => {}
            LegRole::Destination => {
                if !self.is_cross_chain() {
                    return Err(SwapError::InvalidRequest(
                        "same-chain intents have no destination leg".to_string(),
                    ));
                }
                if self.source_leg().is_none() {
                    return Err(SwapError::InvalidRequest(
                        "destination leg recorded before source leg".to_string(),
                    ));
                }
            }
        }
        self.legs.push(leg);
        Ok(())
    }

    /// Move to the next phase on the success path. Anything else is rejected.
    pub fn advance(&mut self, next: Phase) -> SwapResult<()> {
        match self.phase.successor(self.is_cross_chain()) {
            Some(expected) if expected == next => {
                self.set_phase(next);
                Ok(())
            }
            _ => Err(SwapError::InvalidTransition { from: self.phase, to: next }),
        }
    }

    pub fn fail(&mut self, kind: FailureKind) -> SwapResult<()> {
        if self.phase.is_terminal() {
            return Err(SwapError::InvalidTransition {
                from: self.phase,
                to: Phase::Failed(kind),
            });
        }
        self.set_phase(Phase::Failed(kind));
        Ok(())
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.history.push(PhaseRecord { phase, at: Utc::now() });
    }
}

/// Progress notification sent each time an intent reaches a new phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseUpdate {
    pub intent_id: SwapIntentId,
    pub phase: Phase,
    pub leg_hashes: Vec<TxHash>,
    pub at: DateTime<Utc>,
}

impl PhaseUpdate {
    pub fn from_intent(intent: &SwapIntent) -> Self {
        Self {
            intent_id: intent.id,
            phase: intent.phase(),
            leg_hashes: intent.leg_hashes(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwapOutcome {
    Completed(SwapIntent),
    Failed {
        reason: SwapError,
        intent: Option<SwapIntent>,
    },
}

impl SwapOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SwapOutcome::Completed(_))
    }

    pub fn intent(&self) -> Option<&SwapIntent> {
        match self {
            SwapOutcome::Completed(intent) => Some(intent),
            SwapOutcome::Failed { intent, .. } => intent.as_ref(),
        }
    }

    pub fn failure_reason(&self) -> Option<&SwapError> {
        match self {
            SwapOutcome::Completed(_) => None,
            SwapOutcome::Failed { reason, .. } => Some(reason),
        }
    }
}

/// Convert a human amount such as `0.25` into base units.
pub fn to_base_units(amount: Decimal, decimals: u32) -> SwapResult<U256> {
    if amount <= Decimal::ZERO {
        return Err(SwapError::InvalidRequest(format!("amount must be positive, got {}", amount)));
    }
    let scale = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or_else(|| SwapError::InvalidRequest(format!("unsupported decimals {}", decimals)))?;
    let scaled = amount
        .checked_mul(scale)
        .ok_or_else(|| SwapError::InvalidRequest(format!("amount {} is too large", amount)))?;
    let units = scaled
        .trunc()
        .to_u128()
        .ok_or_else(|| SwapError::InvalidRequest(format!("amount {} is not representable", amount)))?;
    Ok(U256::from(units))
}

/// Render base units with `decimals` places, trimming trailing zeros.
pub fn format_units(value: U256, decimals: u32) -> String {
    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = value / divisor;
    let fraction = value % divisor;
    if fraction.is_zero() {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}
