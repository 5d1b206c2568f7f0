use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{AdaptiveAmountManager, DirectionSwitcher, SessionStats};
use crate::config::SwapConfig;
use crate::error::{SwapError, SwapResult};
use crate::orchestrator::SwapOrchestrator;
use crate::progress::ProgressReporter;
use crate::types::SwapOutcome;

#[derive(Debug, Clone)]
pub struct RunPlan {
    pub pair: String,
    /// `None` runs until cancelled.
    pub iterations: Option<u32>,
    pub delay: Duration,
    /// Overrides the pair's default amount for every direction.
    pub amount: Option<Decimal>,
}

/// Repeats swaps for a pair preset, adapting the amount and direction as
/// outcomes come in.
pub struct AutomationRunner {
    orchestrator: Arc<SwapOrchestrator>,
    config: SwapConfig,
}

impl AutomationRunner {
    pub fn new(orchestrator: Arc<SwapOrchestrator>, config: SwapConfig) -> Self {
        Self { orchestrator, config }
    }

    pub async fn run(
        &self,
        plan: &RunPlan,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> SwapResult<SessionStats> {
        let mut switcher = DirectionSwitcher::from_config(&self.config, &plan.pair)?;
        let mut amounts: HashMap<String, AdaptiveAmountManager> = HashMap::new();
        let mut stats = SessionStats::new();
        let mut iteration = 0u32;

        while plan.iterations.map_or(true, |limit| iteration < limit) {
            if cancel.is_cancelled() {
                break;
            }
            iteration += 1;

            let pair_name = switcher.current().to_string();
            let pair = self.config.pair(&pair_name)?;
            let manager = amounts.entry(pair_name.clone()).or_insert_with(|| {
                AdaptiveAmountManager::new(plan.amount.unwrap_or(pair.default_amount), &self.config.adaptive)
            });
            let amount = manager.current_amount();
            info!("[RUN] Iteration {}: {} {} ({:?})", iteration, amount, pair_name, manager.phase());

            let request = pair.request(amount)?;
            let outcome = self.orchestrator.run_with(request, progress, cancel).await;
            stats.record(&outcome);

            match &outcome {
                SwapOutcome::Completed(_) => {
                    manager.record_success();
                    switcher.record_success();
                }
                SwapOutcome::Failed {
                    reason: SwapError::Cancelled,
                    ..
                } => break,
                SwapOutcome::Failed { reason, .. } => {
                    manager.record_failure(reason);
                    if switcher.record_failure(reason, Utc::now()).is_some() {
                        stats.record_direction_switch();
                    }
                }
            }

            let more = plan.iterations.map_or(true, |limit| iteration < limit);
            if more && !plan.delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(plan.delay) => {}
                }
            }
        }

        if cancel.is_cancelled() {
            warn!("[RUN] Session cancelled after {} iteration(s)", iteration);
        }
        info!("[RUN] {}", stats.summary());
        Ok(stats)
    }
}
