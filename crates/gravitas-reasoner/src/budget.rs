//! [`CycleBudget`] – reasoning-rate monitor.
//!
//! A cycle is too slow when the frequency it could sustain,
//! `1 / duration`, falls below half the configured reasoning frequency.
//! Slow cycles are only reported; the caller decides whether to warn or
//! publish an alert.

use std::time::{Duration, Instant};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Verdict for one measured cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleHealth {
    /// The cycle fits the budget.
    OnTime,
    /// The cycle ran below half the target frequency.
    TooSlow { achieved_hz: f32 },
}

// ────────────────────────────────────────────────────────────────────────────
// CycleBudget
// ────────────────────────────────────────────────────────────────────────────

/// Measures reasoning cycles against a target frequency.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gravitas_reasoner::budget::{CycleBudget, CycleHealth};
///
/// let budget = CycleBudget::new(20.0);
/// assert_eq!(budget.assess(Duration::from_millis(10)), CycleHealth::OnTime);
/// assert!(matches!(budget.assess(Duration::from_millis(200)), CycleHealth::TooSlow { .. }));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CycleBudget {
    target_hz: f32,
}

impl CycleBudget {
    pub fn new(target_hz: f32) -> Self {
        Self { target_hz }
    }

    pub fn target_hz(&self) -> f32 {
        self.target_hz
    }

    /// Start timing a cycle.
    pub fn start(&self) -> Instant {
        Instant::now()
    }

    /// Assess the cycle started at `started`.
    pub fn finish(&self, started: Instant) -> CycleHealth {
        self.assess(started.elapsed())
    }

    /// Assess a cycle that took `elapsed`.
    ///
    /// A zero-length cycle is always on time.
    pub fn assess(&self, elapsed: Duration) -> CycleHealth {
        let secs = elapsed.as_secs_f32();
        if secs <= 0.0 {
            return CycleHealth::OnTime;
        }
        let achieved_hz = 1.0 / secs;
        if achieved_hz < self.target_hz * 0.5 {
            CycleHealth::TooSlow { achieved_hz }
        } else {
            CycleHealth::OnTime
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_cycle_is_on_time() {
        let budget = CycleBudget::new(20.0);
        assert_eq!(budget.assess(Duration::from_millis(50)), CycleHealth::OnTime);
        assert_eq!(budget.assess(Duration::ZERO), CycleHealth::OnTime);
    }

    #[test]
    fn half_frequency_is_the_limit() {
        let budget = CycleBudget::new(20.0);
        // Just above 10 Hz.
        assert_eq!(budget.assess(Duration::from_millis(99)), CycleHealth::OnTime);
        match budget.assess(Duration::from_millis(125)) {
            CycleHealth::TooSlow { achieved_hz } => assert!((achieved_hz - 8.0).abs() < 1e-3),
            other => panic!("expected TooSlow, got {other:?}"),
        }
    }

    #[test]
    fn finish_measures_since_start() {
        let budget = CycleBudget::new(1.0);
        let started = budget.start();
        assert_eq!(budget.finish(started), CycleHealth::OnTime);
        assert_eq!(budget.target_hz(), 1.0);
    }
}
