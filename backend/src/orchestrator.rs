use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::crosschain::CrossChainTracker;
use crate::error::SwapError;
use crate::execution::SwapExecutor;
use crate::progress::ProgressReporter;
use crate::routing::QuoteClient;
use crate::slippage::SlippageGuard;
use crate::types::{SwapOutcome, SwapRequest};

/// Quote, guard, submit and track a single swap request.
pub struct SwapOrchestrator {
    quotes: QuoteClient,
    guard: SlippageGuard,
    executor: Arc<SwapExecutor>,
    tracker: Arc<CrossChainTracker>,
}

impl SwapOrchestrator {
    pub fn new(quotes: QuoteClient, executor: Arc<SwapExecutor>, tracker: Arc<CrossChainTracker>) -> Self {
        Self {
            quotes,
            guard: SlippageGuard::new(),
            executor,
            tracker,
        }
    }

    pub async fn run(&self, request: SwapRequest) -> SwapOutcome {
        self.run_with(request, &ProgressReporter::disabled(), &CancellationToken::new())
            .await
    }

    /// Every component error ends up in `SwapOutcome::Failed`, together with
    /// the intent once one exists so recorded legs are never lost.
    pub async fn run_with(
        &self,
        request: SwapRequest,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> SwapOutcome {
        info!(
            "Starting swap {} -> {} on chains {} -> {}",
            request.source_token, request.destination_token, request.source_chain_id, request.destination_chain_id
        );

        let route = tokio::select! {
            _ = cancel.cancelled() => return failed(SwapError::Cancelled),
            route = self.quotes.get_route(&request) => route,
        };
        let route = match route {
            Ok(route) => route,
            Err(e) => return failed(e),
        };

        if let Err(e) = self.guard.validate(&route, &request) {
            warn!("Route from {} rejected: {}", route.provider, e);
            return failed(e);
        }

        // Nothing is on chain yet, so an abort here costs nothing.
        if cancel.is_cancelled() {
            return failed(SwapError::Cancelled);
        }

        let mut intent = match self.executor.execute_intent(&route, &request, progress, cancel).await {
            Ok(intent) => intent,
            Err(failure) => {
                error!("Swap failed during execution: {}", failure.error);
                return SwapOutcome::Failed {
                    reason: failure.error,
                    intent: failure.intent,
                };
            }
        };

        match self.tracker.track(&mut intent, progress, cancel).await {
            Ok(()) => {
                info!("Swap {} completed with {} leg(s)", intent.id, intent.legs().len());
                SwapOutcome::Completed(intent)
            }
            Err(reason) => {
                error!("Swap {} ended at {}: {}", intent.id, intent.phase(), reason);
                SwapOutcome::Failed {
                    reason,
                    intent: Some(intent),
                }
            }
        }
    }
}

fn failed(reason: SwapError) -> SwapOutcome {
    error!("Swap failed before execution: {}", reason);
    SwapOutcome::Failed { reason, intent: None }
}
