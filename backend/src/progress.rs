use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::types::{PhaseUpdate, SwapIntent};

/// Forwards phase changes to whoever is displaying progress.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<PhaseUpdate>>,
}

impl ProgressReporter {
    pub fn new(sender: mpsc::UnboundedSender<PhaseUpdate>) -> Self {
        Self { sender: Some(sender) }
    }

    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PhaseUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn report(&self, intent: &SwapIntent) {
        info!("Swap {} reached {}", intent.id, intent.phase());
        if let Some(sender) = &self.sender {
            if sender.send(PhaseUpdate::from_intent(intent)).is_err() {
                debug!("Progress receiver dropped for swap {}", intent.id);
            }
        }
    }
}
