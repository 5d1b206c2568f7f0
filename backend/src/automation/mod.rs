pub mod adaptive_amount;
pub mod direction;
pub mod runner;
pub mod session;

pub use adaptive_amount::{AdaptiveAmountManager, AdaptiveMode, AdaptivePhase};
pub use direction::{DirectionSwitch, DirectionSwitcher, SwitchReason};
pub use runner::{AutomationRunner, RunPlan};
pub use session::SessionStats;
