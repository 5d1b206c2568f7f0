use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use euclid_swap_backend::automation::{AutomationRunner, RunPlan};
use euclid_swap_backend::bridges::EuclidRelay;
use euclid_swap_backend::config::SwapConfig;
use euclid_swap_backend::crosschain::{CrossChainTracker, TrackerSettings};
use euclid_swap_backend::execution::{LocalSigner, RpcChainSubmitter, SigningAccount, SwapExecutor};
use euclid_swap_backend::logging::setup_logging;
use euclid_swap_backend::progress::ProgressReporter;
use euclid_swap_backend::routing::{EuclidAggregator, QuoteClient};
use euclid_swap_backend::types::{format_units, to_base_units, SwapOutcome};
use euclid_swap_backend::SwapOrchestrator;

#[derive(Parser, Debug)]
#[command(author, version, about = "Euclid testnet swap runner")]
struct Cli {
    /// Path to the JSON config file; a default one is written if missing
    #[arg(long, default_value = "euclid_swap_config.json")]
    config: String,

    /// Log level or full filter directive (overrides config/env)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single swap for a pair preset
    Swap {
        #[arg(long)]
        pair: String,
        /// Whole tokens; defaults to the pair's configured amount
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        slippage_bps: Option<u32>,
        /// Whole destination tokens the quote is held to (overrides the pair's rate)
        #[arg(long)]
        expected_out: Option<Decimal>,
    },
    /// Keep swapping, adapting amount and direction between attempts
    Run {
        #[arg(long)]
        pair: String,
        /// Stop after this many swaps (default: until Ctrl-C)
        #[arg(long)]
        iterations: Option<u32>,
        #[arg(long, default_value_t = 30)]
        delay_seconds: u64,
        #[arg(long)]
        amount: Option<Decimal>,
    },
    /// List configured pair presets
    Pairs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = SwapConfig::load_from_file(&cli.config)?.with_env_overrides();
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    setup_logging(&config.logging.level, config.logging.json);

    if let Err(problems) = config.validate() {
        for problem in &problems {
            error!("Config: {}", problem);
        }
        anyhow::bail!("{} configuration problem(s) in {}", problems.len(), cli.config);
    }

    if let Command::Pairs = cli.command {
        let mut names: Vec<_> = config.pairs.keys().cloned().collect();
        names.sort();
        for name in names {
            let pair = config.pair(&name)?;
            println!(
                "{:<10} {} ({}) -> {} ({})  default {}  slippage {} bps  rate {}",
                name,
                pair.source_token,
                pair.source_chain_id,
                pair.destination_token,
                pair.destination_chain_id,
                pair.default_amount,
                pair.slippage_bps,
                pair.expected_rate.map(|rate| rate.to_string()).unwrap_or_else(|| "-".to_string())
            );
        }
        return Ok(());
    }

    let signer = Arc::new(LocalSigner::from_env(&config.signer.private_key_env)?);
    let account = Arc::new(SigningAccount::new(signer));
    info!("✅ Signer loaded for {}", account.address());

    let aggregator = Arc::new(EuclidAggregator::from_config(&config)?);
    let submitter = Arc::new(RpcChainSubmitter::from_config(&config)?);
    let relay = Arc::new(EuclidRelay::from_config(&config, account.address())?);

    let quotes = QuoteClient::from_config(aggregator.clone(), &config.aggregator);
    let executor = Arc::new(SwapExecutor::from_config(
        &config,
        aggregator,
        submitter.clone(),
        account,
    ));
    let tracker = Arc::new(CrossChainTracker::new(
        submitter,
        relay,
        TrackerSettings::from_config(&config),
    ));
    let orchestrator = Arc::new(SwapOrchestrator::new(quotes, executor, tracker));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current step");
            ctrl_c.cancel();
        }
    });

    let (progress, mut updates) = ProgressReporter::channel();
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            let hashes = update
                .leg_hashes
                .iter()
                .map(|hash| format!("{:#x}", hash))
                .collect::<Vec<_>>()
                .join(", ");
            println!("[{}] {} -> {} [{}]", update.at.format("%H:%M:%S"), update.intent_id, update.phase, hashes);
        }
    });

    match cli.command {
        Command::Swap {
            pair,
            amount,
            slippage_bps,
            expected_out,
        } => {
            let preset = config.pair(&pair)?;
            let mut request = preset.request(amount.unwrap_or(preset.default_amount))?;
            if let Some(bps) = slippage_bps {
                request.slippage_bps = bps;
            }
            if let Some(expected) = expected_out {
                request = request.with_expected_amount_out(to_base_units(expected, preset.decimals)?);
            }
            if request.expected_amount_out.is_none() {
                warn!("No expected output for {}; only the on-chain minimum bounds the swap", pair);
            }
            let decimals = preset.decimals;

            let outcome = orchestrator.run_with(request, &progress, &cancel).await;
            drop(progress);
            let _ = printer.await;
            report_outcome(&outcome, decimals);
            if !outcome.is_completed() {
                std::process::exit(1);
            }
        }
        Command::Run {
            pair,
            iterations,
            delay_seconds,
            amount,
        } => {
            let plan = RunPlan {
                pair,
                iterations,
                delay: Duration::from_secs(delay_seconds),
                amount,
            };
            let runner = AutomationRunner::new(orchestrator, config.clone());
            let stats = runner.run(&plan, &progress, &cancel).await?;
            drop(progress);
            let _ = printer.await;

            println!("Session: {}", stats.summary());
            for (reason, count) in &stats.failures_by_reason {
                println!("  {:<22} {}", reason, count);
            }
        }
        Command::Pairs => {}
    }

    Ok(())
}

fn report_outcome(outcome: &SwapOutcome, decimals: u32) {
    match outcome {
        SwapOutcome::Completed(intent) => {
            println!(
                "✅ Swap {} completed, estimated output {}",
                intent.id,
                format_units(intent.route.amount_out, decimals)
            );
            for leg in intent.legs() {
                println!("   {:?} leg on chain {}: {:#x}", leg.role, leg.chain_id, leg.tx_hash);
            }
        }
        SwapOutcome::Failed { reason, intent } => {
            println!("❌ Swap failed: {}", reason);
            if let Some(intent) = intent {
                println!("   Last phase: {}", intent.phase());
                for leg in intent.legs() {
                    println!("   {:?} leg on chain {}: {:#x} ({:?})", leg.role, leg.chain_id, leg.tx_hash, leg.status);
                }
            }
        }
    }
}
