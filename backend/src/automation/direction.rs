use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{info, warn};

use crate::config::{AdaptiveConfig, SwapConfig};
use crate::error::{SwapError, SwapResult};

const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchReason {
    /// The failure says this direction cannot work right now.
    Immediate,
    ConsecutiveFailures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionSwitch {
    pub from: String,
    pub to: String,
    pub reason: SwitchReason,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Flips a pair to its configured reverse when it keeps failing.
#[derive(Debug, Clone)]
pub struct DirectionSwitcher {
    current: String,
    reverse: Option<String>,
    failure_threshold: u32,
    cooldown: ChronoDuration,
    consecutive_failures: u32,
    last_switch: Option<DateTime<Utc>>,
    history: VecDeque<DirectionSwitch>,
}

impl DirectionSwitcher {
    pub fn new(pair: impl Into<String>, reverse: Option<String>, config: &AdaptiveConfig) -> Self {
        let cooldown = i64::try_from(config.direction_switch_cooldown_seconds).unwrap_or(i64::MAX);
        Self {
            current: pair.into(),
            reverse,
            failure_threshold: config.direction_switch_failures.max(1),
            cooldown: ChronoDuration::seconds(cooldown),
            consecutive_failures: 0,
            last_switch: None,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    pub fn from_config(config: &SwapConfig, pair: &str) -> SwapResult<Self> {
        let pair_config = config.pair(pair)?;
        if let Some(reverse) = &pair_config.reverse {
            config.pair(reverse)?;
        }
        Ok(Self::new(pair, pair_config.reverse.clone(), &config.adaptive))
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Most recent switches, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &DirectionSwitch> {
        self.history.iter()
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Returns the switch taken, if any.
    pub fn record_failure(&mut self, error: &SwapError, now: DateTime<Utc>) -> Option<DirectionSwitch> {
        self.consecutive_failures += 1;

        let reason = if is_direction_blocking(error) {
            SwitchReason::Immediate
        } else if self.consecutive_failures >= self.failure_threshold {
            SwitchReason::ConsecutiveFailures
        } else {
            return None;
        };

        let reverse = match &self.reverse {
            Some(reverse) => reverse.clone(),
            None => {
                warn!("[DIRECTION] {} has no reverse pair; staying put", self.current);
                return None;
            }
        };

        if let Some(last) = self.last_switch {
            if now - last < self.cooldown {
                info!("[DIRECTION] Switch from {} suppressed by cooldown", self.current);
                return None;
            }
        }

        let switch = DirectionSwitch {
            from: self.current.clone(),
            to: reverse.clone(),
            reason,
            error: error.to_string(),
            at: now,
        };
        info!(
            "[DIRECTION] Switching {} -> {} ({:?}: {})",
            switch.from, switch.to, reason, switch.error
        );

        self.reverse = Some(std::mem::replace(&mut self.current, reverse));
        self.consecutive_failures = 0;
        self.last_switch = Some(now);
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(switch.clone());

        Some(switch)
    }
}

fn is_direction_blocking(error: &SwapError) -> bool {
    matches!(
        error,
        SwapError::InsufficientBalance { .. } | SwapError::NoRoute { .. }
    )
}
