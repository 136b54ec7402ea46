//! Drift-corrected countdown to the next period boundary
//!
//! The first tick lands on the sub-second remainder of the period length so
//! that later ticks fall on whole seconds before the boundary. Each tick
//! measures how late it fired and shortens the next delay by that amount.

/// Result of one countdown tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// Time is left; tick again after `next_delay_ms`
    Running { remaining_ms: i64, next_delay_ms: u64 },
    Expired,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Countdown {
    remaining_ms: i64,
    /// Time at which the pending tick should fire
    expected_at: f64,
    /// Time the pending tick accounts for
    interval_ms: u64,
    tick_ms: u64,
}

impl Countdown {
    /// Start counting down `period_length_ms` from `now`
    ///
    /// Returns the countdown and the delay of its first tick.
    pub fn start(now: f64, period_length_ms: u64, tick_ms: u64) -> (Self, u64) {
        let tick_ms = tick_ms.max(1);
        let first = period_length_ms % tick_ms;
        let countdown = Self {
            remaining_ms: period_length_ms as i64,
            expected_at: now + first as f64,
            interval_ms: first,
            tick_ms,
        };
        (countdown, first)
    }

    pub fn tick(&mut self, now: f64) -> TickOutcome {
        let late_by = now - self.expected_at;
        self.remaining_ms -= self.interval_ms as i64;
        self.expected_at += self.tick_ms as f64;
        self.interval_ms = self.tick_ms;

        if self.remaining_ms > 0 {
            let next_delay_ms = (self.tick_ms as f64 - late_by).round().max(0.0) as u64;
            TickOutcome::Running { remaining_ms: self.remaining_ms, next_delay_ms }
        } else {
            TickOutcome::Expired
        }
    }
}
