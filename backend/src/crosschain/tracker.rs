use alloy::primitives::TxHash;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bridges::{BridgeStatusProvider, RelayState};
use crate::config::SwapConfig;
use crate::error::{SwapError, SwapResult};
use crate::execution::{ChainSubmitter, ConfirmationStatus};
use crate::progress::ProgressReporter;
use crate::types::{LegRole, LegStatus, Phase, SwapIntent, SwapTransaction};

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    pub source_timeout: Duration,
    pub bridge_timeout: Duration,
    pub destination_timeout: Duration,
    pub confirmations: HashMap<u64, u64>,
}

impl TrackerSettings {
    pub fn from_config(config: &SwapConfig) -> Self {
        Self {
            poll_interval: config.tracking.poll_interval(),
            source_timeout: config.tracking.source_timeout(),
            bridge_timeout: config.tracking.bridge_timeout(),
            destination_timeout: config.tracking.destination_timeout(),
            confirmations: config
                .chains
                .values()
                .map(|chain| (chain.chain_id, chain.confirmation_blocks))
                .collect(),
        }
    }

    pub fn required_confirmations(&self, chain_id: u64) -> u64 {
        self.confirmations.get(&chain_id).copied().unwrap_or(1).max(1)
    }
}

enum PollOutcome<T> {
    Ready(T),
    TimedOut,
    Cancelled,
}

/// Drives a submitted intent to `Completed` or `Failed`.
pub struct CrossChainTracker {
    submitter: Arc<dyn ChainSubmitter>,
    bridge: Arc<dyn BridgeStatusProvider>,
    settings: TrackerSettings,
}

impl CrossChainTracker {
    pub fn new(
        submitter: Arc<dyn ChainSubmitter>,
        bridge: Arc<dyn BridgeStatusProvider>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            submitter,
            bridge,
            settings,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Track until a terminal phase. Cancellation stops polling and leaves the
    /// intent at its last observed phase; any other error marks it failed.
    pub async fn track(
        &self,
        intent: &mut SwapIntent,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> SwapResult<()> {
        if intent.phase() != Phase::Submitted || intent.source_leg().is_none() {
            return Err(SwapError::InvalidRequest(format!(
                "swap {} is not awaiting confirmation (phase {})",
                intent.id,
                intent.phase()
            )));
        }

        let result = if intent.is_cross_chain() {
            self.track_cross_chain(intent, progress, cancel).await
        } else {
            self.track_same_chain(intent, progress, cancel).await
        };

        match result {
            Ok(()) => Ok(()),
            Err(SwapError::Cancelled) => {
                warn!("Tracking of swap {} cancelled at {}", intent.id, intent.phase());
                Err(SwapError::Cancelled)
            }
            Err(e) => {
                if !intent.is_terminal() {
                    intent.fail(e.failure_kind())?;
                    progress.report(intent);
                }
                error!("Swap {} failed: {}", intent.id, e);
                Err(e)
            }
        }
    }

    async fn track_same_chain(
        &self,
        intent: &mut SwapIntent,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> SwapResult<()> {
        match self.confirm_leg(intent, LegRole::Source, self.settings.source_timeout, cancel).await? {
            PollOutcome::Ready(()) => {}
            PollOutcome::TimedOut => return Err(source_timeout(intent)),
            PollOutcome::Cancelled => return Err(SwapError::Cancelled),
        }

        self.step(intent, Phase::Confirmed, progress)?;
        self.step(intent, Phase::Completed, progress)
    }

    async fn track_cross_chain(
        &self,
        intent: &mut SwapIntent,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> SwapResult<()> {
        match self.confirm_leg(intent, LegRole::Source, self.settings.source_timeout, cancel).await? {
            PollOutcome::Ready(()) => {}
            PollOutcome::TimedOut => return Err(source_timeout(intent)),
            PollOutcome::Cancelled => return Err(SwapError::Cancelled),
        }
        self.step(intent, Phase::SourceConfirmed, progress)?;
        self.step(intent, Phase::BridgePending, progress)?;

        let (source_chain_id, source_hash) = leg_key(intent, LegRole::Source)?;
        let bridge = Arc::clone(&self.bridge);
        let relayed = self
            .poll_until("bridge relay", self.settings.bridge_timeout, cancel, || {
                let bridge = Arc::clone(&bridge);
                async move {
                    let status = bridge.relay_status(source_chain_id, source_hash).await?;
                    match status.state {
                        RelayState::Failed(reason) => Err(SwapError::BridgeFailed(reason)),
                        RelayState::Unknown(raw) => Err(SwapError::UnknownBridgeState(raw)),
                        _ => Ok(status.destination_tx_hash),
                    }
                }
            })
            .await?;

        let destination_hash = match relayed {
            PollOutcome::Ready(hash) => hash,
            PollOutcome::TimedOut => {
                return Err(SwapError::BridgeTimeout {
                    source_tx_hash: source_hash.to_string(),
                })
            }
            PollOutcome::Cancelled => return Err(SwapError::Cancelled),
        };

        info!("Relay delivered swap {} as {}", intent.id, destination_hash);
        intent.push_leg(SwapTransaction::destination(
            intent.request.destination_chain_id,
            destination_hash,
        ))?;
        self.step(intent, Phase::DestinationSubmitted, progress)?;

        match self
            .confirm_leg(intent, LegRole::Destination, self.settings.destination_timeout, cancel)
            .await?
        {
            PollOutcome::Ready(()) => {}
            PollOutcome::TimedOut => {
                return Err(SwapError::DestinationTimeout {
                    tx_hash: destination_hash.to_string(),
                })
            }
            PollOutcome::Cancelled => return Err(SwapError::Cancelled),
        }

        self.step(intent, Phase::DestinationConfirmed, progress)?;
        self.step(intent, Phase::Completed, progress)
    }

    fn step(&self, intent: &mut SwapIntent, next: Phase, progress: &ProgressReporter) -> SwapResult<()> {
        intent.advance(next)?;
        progress.report(intent);
        Ok(())
    }

    /// Wait for the leg's required confirmations and record the result on it.
    async fn confirm_leg(
        &self,
        intent: &mut SwapIntent,
        role: LegRole,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> SwapResult<PollOutcome<()>> {
        let (chain_id, tx_hash) = leg_key(intent, role)?;
        let required = self.settings.required_confirmations(chain_id);
        let submitter = Arc::clone(&self.submitter);

        let outcome = self
            .poll_until("confirmation", budget, cancel, || {
                let submitter = Arc::clone(&submitter);
                async move {
                    match submitter.confirmation_status(chain_id, tx_hash).await? {
                        ConfirmationStatus::Included {
                            block_number,
                            confirmations,
                        } if confirmations >= required => Ok(Some((block_number, confirmations))),
                        ConfirmationStatus::Included { .. } | ConfirmationStatus::Pending => Ok(None),
                        ConfirmationStatus::Reverted { .. } => Err(SwapError::Reverted {
                            chain_id,
                            tx_hash: tx_hash.to_string(),
                        }),
                    }
                }
            })
            .await;

        match outcome {
            Ok(PollOutcome::Ready((block_number, confirmations))) => {
                intent.set_leg_status(
                    role,
                    LegStatus::Confirmed {
                        block_number,
                        confirmations,
                    },
                )?;
                info!(
                    "{:?} leg {} confirmed in block {} ({} confirmation(s))",
                    role, tx_hash, block_number, confirmations
                );
                Ok(PollOutcome::Ready(()))
            }
            Ok(PollOutcome::TimedOut) => Ok(PollOutcome::TimedOut),
            Ok(PollOutcome::Cancelled) => Ok(PollOutcome::Cancelled),
            Err(e @ SwapError::Reverted { .. }) => {
                intent.set_leg_status(role, LegStatus::Reverted)?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Poll `poll_once` every `poll_interval` until it yields a value, the budget
    /// runs out or `cancel` fires. Retryable errors only cost a poll.
    async fn poll_until<T, F, Fut>(
        &self,
        label: &str,
        budget: Duration,
        cancel: &CancellationToken,
        mut poll_once: F,
    ) -> SwapResult<PollOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SwapResult<Option<T>>>,
    {
        let deadline = Instant::now() + budget;
        let mut polls = 0u32;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("{} budget of {:?} exhausted after {} poll(s)", label, budget, polls);
                return Ok(PollOutcome::TimedOut);
            }

            polls += 1;
            let attempt = tokio::select! {
                _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                result = tokio::time::timeout(remaining, poll_once()) => result,
            };

            match attempt {
                Err(_) => {
                    warn!("{} budget of {:?} exhausted during poll {}", label, budget, polls);
                    return Ok(PollOutcome::TimedOut);
                }
                Ok(Ok(Some(value))) => return Ok(PollOutcome::Ready(value)),
                Ok(Ok(None)) => debug!("{} poll {}: not ready", label, polls),
                Ok(Err(e)) if e.is_retryable() => warn!("{} poll {} failed: {}", label, polls, e),
                Ok(Err(e)) => return Err(e),
            }

            let pause = self
                .settings
                .poll_interval
                .min(deadline.saturating_duration_since(Instant::now()));
            tokio::select! {
                _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                _ = sleep(pause) => {}
            }
        }
    }
}

fn leg_key(intent: &SwapIntent, role: LegRole) -> SwapResult<(u64, TxHash)> {
    intent
        .leg(role)
        .map(|leg| (leg.chain_id, leg.tx_hash))
        .ok_or_else(|| SwapError::InvalidRequest(format!("swap {} has no {:?} leg", intent.id, role)))
}

fn source_timeout(intent: &SwapIntent) -> SwapError {
    SwapError::SourceTimeout {
        tx_hash: intent
            .source_leg()
            .map(|leg| leg.tx_hash.to_string())
            .unwrap_or_default(),
    }
}
