use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::error::SwapError;
use crate::types::{SwapOutcome, SwapTransaction};

/// Running totals for one automation session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub started_at: DateTime<Utc>,
    pub attempts: u64,
    pub completed: u64,
    pub failed: u64,
    pub failures_by_reason: BTreeMap<&'static str, u64>,
    pub direction_switches: u64,
    pub last_legs: Vec<SwapTransaction>,
    /// Set when a swap was cancelled mid-flight; it is not counted as an attempt.
    pub interrupted: bool,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            attempts: 0,
            completed: 0,
            failed: 0,
            failures_by_reason: BTreeMap::new(),
            direction_switches: 0,
            last_legs: Vec::new(),
            interrupted: false,
        }
    }

    pub fn record(&mut self, outcome: &SwapOutcome) {
        if let SwapOutcome::Failed {
            reason: SwapError::Cancelled,
            intent,
        } = outcome
        {
            self.interrupted = true;
            if let Some(intent) = intent {
                if !intent.legs().is_empty() {
                    self.last_legs = intent.legs().to_vec();
                }
            }
            return;
        }

        self.attempts += 1;
        match outcome {
            SwapOutcome::Completed(intent) => {
                self.completed += 1;
                self.last_legs = intent.legs().to_vec();
            }
            SwapOutcome::Failed { reason, intent } => {
                self.failed += 1;
                *self.failures_by_reason.entry(reason.code()).or_insert(0) += 1;
                if let Some(intent) = intent {
                    if !intent.legs().is_empty() {
                        self.last_legs = intent.legs().to_vec();
                    }
                }
            }
        }
    }

    pub fn record_direction_switch(&mut self) {
        self.direction_switches += 1;
    }

    /// Percentage of attempts that completed.
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.completed as f64 / self.attempts as f64 * 100.0
    }

    pub fn summary(&self) -> String {
        let summary = format!(
            "{} attempt(s), {} completed, {} failed ({:.1}% success), {} direction switch(es)",
            self.attempts,
            self.completed,
            self.failed,
            self.success_rate(),
            self.direction_switches
        );
        if self.interrupted {
            format!("{}, interrupted", summary)
        } else {
            summary
        }
    }
}
