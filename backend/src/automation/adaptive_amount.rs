use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AdaptiveConfig;
use crate::error::SwapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptiveMode {
    /// Amount never changes.
    Fixed,
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptivePhase {
    Fixed,
    /// Raising the amount until a swap goes through.
    Ascending,
    /// Confirming the working amount keeps working.
    Stable,
    /// Lowering toward the floor while swaps keep succeeding.
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: AdaptivePhase,
    pub to: AdaptivePhase,
    pub amount: Decimal,
}

/// Searches for the smallest swap amount that reliably succeeds.
///
/// Inputs of 1.0 or more run in fixed mode. Smaller inputs become the floor;
/// amount-sensitive failures walk the amount up toward the ceiling, and a
/// stable run of successes walks it back down.
#[derive(Debug, Clone)]
pub struct AdaptiveAmountManager {
    mode: AdaptiveMode,
    phase: AdaptivePhase,
    current: Decimal,
    floor: Decimal,
    ceiling: Decimal,
    increment_step: Decimal,
    decrement_step: Decimal,
    stability_threshold: u32,
    max_increment_attempts: u32,
    increment_attempts: u32,
    consecutive_successes: u32,
    last_working: Option<Decimal>,
    optimal: Option<Decimal>,
    total_adjustments: u32,
    transitions: Vec<PhaseTransition>,
}

impl AdaptiveAmountManager {
    pub fn new(initial_amount: Decimal, config: &AdaptiveConfig) -> Self {
        let mode = if !config.enabled || initial_amount >= dec!(1.0) {
            AdaptiveMode::Fixed
        } else {
            AdaptiveMode::Adaptive
        };
        let phase = match mode {
            AdaptiveMode::Fixed => AdaptivePhase::Fixed,
            AdaptiveMode::Adaptive => AdaptivePhase::Ascending,
        };

        Self {
            mode,
            phase,
            current: initial_amount,
            floor: initial_amount,
            ceiling: config.max_ceiling.max(initial_amount),
            increment_step: config.increment_step,
            decrement_step: config.decrement_step,
            stability_threshold: config.stability_threshold.max(1),
            max_increment_attempts: config.max_increment_attempts.max(1),
            increment_attempts: 0,
            consecutive_successes: 0,
            last_working: None,
            optimal: None,
            total_adjustments: 0,
            transitions: Vec::new(),
        }
    }

    pub fn current_amount(&self) -> Decimal {
        self.current
    }

    pub fn mode(&self) -> AdaptiveMode {
        self.mode
    }

    pub fn phase(&self) -> AdaptivePhase {
        self.phase
    }

    pub fn optimal_amount(&self) -> Option<Decimal> {
        self.optimal
    }

    pub fn total_adjustments(&self) -> u32 {
        self.total_adjustments
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    /// Record a completed swap and return the amount to use next.
    pub fn record_success(&mut self) -> Decimal {
        let previous = self.current;
        match self.phase {
            AdaptivePhase::Fixed => {}
            AdaptivePhase::Ascending => {
                self.last_working = Some(self.current);
                self.consecutive_successes = 1;
                self.increment_attempts = 0;
                self.transition(AdaptivePhase::Stable);
            }
            AdaptivePhase::Stable => {
                self.consecutive_successes += 1;
                if self.consecutive_successes >= self.stability_threshold {
                    if self.current > self.floor {
                        self.consecutive_successes = 0;
                        self.current = (self.current - self.decrement_step).max(self.floor);
                        self.transition(AdaptivePhase::Descending);
                    } else {
                        self.optimal = Some(self.current);
                    }
                }
            }
            AdaptivePhase::Descending => {
                self.consecutive_successes += 1;
                self.last_working = Some(self.current);
                if self.consecutive_successes >= self.stability_threshold {
                    let lower = (self.current - self.decrement_step).max(self.floor);
                    if lower < self.current {
                        self.current = lower;
                        self.consecutive_successes = 0;
                    } else {
                        self.optimal = Some(self.current);
                    }
                }
            }
        }
        self.note_adjustment(previous, "success");
        self.current
    }

    /// Record a failed swap. Only failures a different amount might fix move it.
    pub fn record_failure(&mut self, error: &SwapError) -> Decimal {
        if self.mode == AdaptiveMode::Fixed {
            return self.current;
        }
        if !error.is_amount_sensitive() {
            info!("[ADAPTIVE] Keeping amount {} after infrastructure error: {}", self.current, error);
            return self.current;
        }

        let previous = self.current;
        match self.phase {
            AdaptivePhase::Fixed => {}
            AdaptivePhase::Ascending => {
                self.increment_attempts += 1;
                if self.increment_attempts >= self.max_increment_attempts {
                    self.increment_attempts = 0;
                    if self.current >= self.ceiling {
                        self.consecutive_successes = 0;
                        self.current = (self.ceiling - self.decrement_step).max(self.floor);
                        self.transition(AdaptivePhase::Descending);
                    } else {
                        self.current = self.ceiling;
                    }
                } else {
                    self.current = (self.current + self.increment_step).min(self.ceiling);
                }
            }
            AdaptivePhase::Stable => {
                self.consecutive_successes = 0;
                self.increment_attempts = 0;
                self.transition(AdaptivePhase::Ascending);
            }
            AdaptivePhase::Descending => {
                if let Some(working) = self.last_working {
                    self.current = working;
                    self.consecutive_successes = 0;
                    self.optimal = Some(working);
                    self.transition(AdaptivePhase::Stable);
                }
            }
        }
        self.note_adjustment(previous, "failure");
        self.current
    }

    fn transition(&mut self, to: AdaptivePhase) {
        info!("[ADAPTIVE] Phase {:?} -> {:?} at {}", self.phase, to, self.current);
        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            amount: self.current,
        });
        self.phase = to;
    }

    fn note_adjustment(&mut self, previous: Decimal, cause: &str) {
        if previous != self.current {
            self.total_adjustments += 1;
            info!("[ADAPTIVE] Amount {} -> {} after {}", previous, self.current, cause);
        }
    }
}
