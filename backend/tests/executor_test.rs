mod common;

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{
    phrs_to_eth, plume_to_stt, route, units, Harness, MockBridge, MockChainSubmitter, MockQuoteProvider,
    PHAROS_CHAIN, PLUME_CHAIN,
};
use alloy::primitives::U256;
use chrono::{Duration as ChronoDuration, Utc};
use euclid_swap_backend::error::SwapError;
use euclid_swap_backend::progress::ProgressReporter;
use euclid_swap_backend::types::{FailureKind, Phase, SwapOutcome};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_concurrent_executions_never_share_a_nonce() {
    let harness = Harness::new(
        MockQuoteProvider::new(units(1)),
        MockChainSubmitter::new().with_submit_delay(Duration::from_millis(10)),
        MockBridge::always_pending(),
    );
    let quoted = route(units(99), 60);
    let request = plume_to_stt(units(100), 50);

    let runs = (0..6).map(|_| harness.executor.execute(&quoted, &request));
    let intents: Vec<_> = join_all(runs)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    let nonces: HashSet<u64> = intents
        .iter()
        .map(|intent| intent.source_leg().unwrap().nonce.unwrap())
        .collect();
    assert_eq!(nonces.len(), 6);
    assert_eq!(nonces, (7..13).collect::<HashSet<u64>>());

    let hashes: HashSet<_> = intents.iter().map(|intent| intent.source_leg().unwrap().tx_hash).collect();
    assert_eq!(hashes.len(), 6);
    assert!(intents.iter().all(|intent| intent.phase() == Phase::Submitted));
}

#[tokio::test]
async fn test_nonces_are_tracked_per_chain() {
    let harness = Harness::new(
        MockQuoteProvider::new(units(1)),
        MockChainSubmitter::new(),
        MockBridge::always_pending(),
    );
    let quoted = route(units(1), 60);

    let first = harness.executor.execute(&quoted, &plume_to_stt(units(1), 50)).await.unwrap();
    let other_chain = harness.executor.execute(&quoted, &phrs_to_eth(units(1))).await.unwrap();
    let second = harness.executor.execute(&quoted, &plume_to_stt(units(1), 50)).await.unwrap();

    assert_eq!(first.source_leg().unwrap().nonce, Some(7));
    assert_eq!(other_chain.source_leg().unwrap().chain_id, PHAROS_CHAIN);
    assert_eq!(other_chain.source_leg().unwrap().nonce, Some(7));
    assert_eq!(second.source_leg().unwrap().chain_id, PLUME_CHAIN);
    assert_eq!(second.source_leg().unwrap().nonce, Some(8));
}

#[tokio::test]
async fn test_rejected_submission_is_surfaced_not_retried() {
    let harness = Harness::new(
        MockQuoteProvider::new(units(1)),
        MockChainSubmitter::new().rejecting(),
        MockBridge::always_pending(),
    );

    let outcome = harness.orchestrator.run(plume_to_stt(units(1), 50)).await;

    match outcome {
        SwapOutcome::Failed {
            reason: SwapError::Submission { chain_id: PLUME_CHAIN, .. },
            intent: Some(intent),
        } => {
            assert_eq!(intent.phase(), Phase::Failed(FailureKind::Rejected));
            assert!(intent.legs().is_empty());
        }
        other => panic!("expected rejected submission, got {:?}", other),
    }
    assert_eq!(harness.submitter.submission_count(), 1);

    // the failed nonce is re-read from the chain rather than skipped
    let _ = harness.orchestrator.run(plume_to_stt(units(1), 50)).await;
    assert_eq!(harness.signer.nonces(), vec![7, 7]);
}

#[tokio::test]
async fn test_insufficient_balance_stops_before_signing() {
    let harness = Harness::new(
        MockQuoteProvider::new(units(1)),
        MockChainSubmitter::new().with_balance(U256::from(1_000u64)),
        MockBridge::always_pending(),
    );

    let err = harness
        .executor
        .execute(&route(units(1), 60), &plume_to_stt(units(1), 50))
        .await
        .unwrap_err();

    match err {
        SwapError::InsufficientBalance {
            chain_id,
            required,
            available,
        } => {
            assert_eq!(chain_id, PLUME_CHAIN);
            assert_eq!(available, U256::from(1_000u64));
            assert!(required > units(1));
        }
        other => panic!("expected insufficient balance, got {:?}", other),
    }
    assert!(harness.signer.nonces().is_empty());
    assert_eq!(harness.submitter.submission_count(), 0);
}

#[tokio::test]
async fn test_expired_quote_is_rejected_before_building() {
    let harness = Harness::new(
        MockQuoteProvider::new(units(1)),
        MockChainSubmitter::new(),
        MockBridge::always_pending(),
    );

    let err = harness
        .executor
        .execute(&route(units(1), -1), &plume_to_stt(units(1), 50))
        .await
        .unwrap_err();

    assert!(matches!(err, SwapError::QuoteExpired { .. }));
    assert_eq!(harness.quotes.builds.load(Ordering::SeqCst), 0);
    assert_eq!(harness.submitter.submission_count(), 0);
}

#[tokio::test]
async fn test_unknown_source_chain_is_unsupported() {
    let harness = Harness::new(
        MockQuoteProvider::new(units(1)),
        MockChainSubmitter::new(),
        MockBridge::always_pending(),
    );
    let mut request = plume_to_stt(units(1), 50);
    request.source_chain_id = 1;
    request.destination_chain_id = 1;

    let err = harness.executor.execute(&route(units(1), 60), &request).await.unwrap_err();
    assert_eq!(err, SwapError::UnsupportedChain(1));
}

#[tokio::test]
async fn test_gas_price_multiplier_is_applied() {
    let harness = Harness::new(
        MockQuoteProvider::new(units(1)),
        MockChainSubmitter::new(),
        MockBridge::always_pending(),
    );

    harness
        .executor
        .execute(&route(units(1), 60), &plume_to_stt(units(1), 50))
        .await
        .unwrap();

    let signed = harness.signer.signed.lock().unwrap();
    assert_eq!(signed[0].gas_price, 1_100_000_000);
    assert_eq!(signed[0].gas_limit, 300_000);
    assert_eq!(signed[0].value, units(1));
}

#[tokio::test]
async fn test_rejected_intent_reports_a_terminal_phase() {
    let harness = Harness::new(
        MockQuoteProvider::new(units(1)),
        MockChainSubmitter::new().rejecting(),
        MockBridge::always_pending(),
    );
    let (progress, mut updates) = ProgressReporter::channel();

    let outcome = harness
        .orchestrator
        .run_with(plume_to_stt(units(1), 50), &progress, &CancellationToken::new())
        .await;

    let mut phases = Vec::new();
    while let Ok(update) = updates.try_recv() {
        phases.push(update.phase);
    }
    assert_eq!(phases, vec![Phase::Quoted, Phase::Failed(FailureKind::Rejected)]);

    let intent = outcome.intent().expect("failed intent is returned");
    assert_eq!(intent.phase(), Phase::Failed(FailureKind::Rejected));
}

#[tokio::test]
async fn test_quote_expiring_during_build_is_not_submitted() {
    let harness = Harness::new(
        MockQuoteProvider::new(units(1)).with_build_delay(Duration::from_millis(150)),
        MockChainSubmitter::new(),
        MockBridge::always_pending(),
    );
    let mut quoted = route(units(1), 60);
    quoted.expiry = Utc::now() + ChronoDuration::milliseconds(50);

    let err = harness
        .executor
        .execute(&quoted, &plume_to_stt(units(1), 50))
        .await
        .unwrap_err();

    assert!(matches!(err, SwapError::QuoteExpired { .. }), "unexpected {:?}", err);
    assert_eq!(harness.quotes.builds.load(Ordering::SeqCst), 1);
    assert!(harness.signer.nonces().is_empty());
    assert_eq!(harness.submitter.submission_count(), 0);
}
