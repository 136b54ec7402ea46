//! Controller configuration
//!
//! Timing constants, the transport retry policy and every text the page
//! shows. All fields have defaults, so hosts only override what they need.

use serde::{Deserialize, Serialize};
use crate::error::ControllerError;

/// Backoff for re-sending when the transport is not available
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 250,
            max_delay_ms: 4_000,
            max_retries: 8,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling up to the cap
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let shift = attempt.saturating_sub(1).min(32);
        self.initial_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms)
    }
}

/// Everything the page writes as text
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Texts {
    /// `{n}` is replaced by the period number, counting from 1
    pub period_counter: String,
    /// Used instead of `period_counter` when the number of periods is known;
    /// `{total}` is replaced by it
    pub period_counter_of_total: String,
    /// `{seconds}` is replaced by the whole seconds left
    pub countdown: String,
    pub waiting_for_server: String,
    pub game_over: String,
    pub reconnecting: String,
    pub connection_lost: String,
}

impl Default for Texts {
    fn default() -> Self {
        Self {
            period_counter: "Periode: {n}".to_string(),
            period_counter_of_total: "Periode: {n} von {total}".to_string(),
            countdown: "Nächste Periode in {seconds} Sekunden".to_string(),
            waiting_for_server: "Warte auf den Server".to_string(),
            game_over: "Ende des Spiels".to_string(),
            reconnecting: "Verbindung wird wiederhergestellt …".to_string(),
            connection_lost: "Keine Verbindung zum Server".to_string(),
        }
    }
}

impl Texts {
    pub fn period_counter(&self, period: u32, total: Option<u32>) -> String {
        match total {
            Some(total) => self
                .period_counter_of_total
                .replace("{n}", &period.saturating_add(1).to_string())
                .replace("{total}", &total.to_string()),
            None => self.period_counter.replace("{n}", &period.saturating_add(1).to_string()),
        }
    }

    pub fn countdown(&self, remaining_ms: i64) -> String {
        let seconds = (remaining_ms as f64 / 1000.0).round() as i64;
        self.countdown.replace("{seconds}", &seconds.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Interval of the countdown display
    pub tick_ms: u64,
    /// Delay between the end-of-game notice and the form submission
    pub end_of_game_delay_ms: u64,
    /// Grid size of the counterfactual curves
    pub curve_points: usize,
    pub retry: RetryPolicy,
    pub texts: Texts,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            end_of_game_delay_ms: 2_000,
            curve_points: crate::chart::CURVE_POINTS,
            retry: RetryPolicy::default(),
            texts: Texts::default(),
        }
    }
}

impl ControllerConfig {
    /// Defaults overridden by whatever the JSON object sets
    pub fn from_json(json: &str) -> Result<Self, ControllerError> {
        let config: ControllerConfig = serde_json::from_str(json)
            .map_err(|e| ControllerError::MalformedSession(format!("config: {}", e)))?;
        if config.tick_ms == 0 {
            return Err(ControllerError::MalformedSession(
                "config: tick_ms must be positive".to_string(),
            ));
        }
        Ok(config)
    }
}
