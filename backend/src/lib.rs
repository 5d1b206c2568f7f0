pub mod automation;
pub mod bridges;
pub mod config;
pub mod crosschain;
pub mod error;
pub mod execution;
pub mod logging;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod routing;
pub mod slippage;
pub mod types;

pub use error::{SwapError, SwapResult};
pub use orchestrator::SwapOrchestrator;
pub use types::{Phase, SwapIntent, SwapOutcome, SwapRequest};
