//! Decision Screen
//!
//! Client logic for the high-frequency duopoly experiment.
//! This crate is compiled to:
//! - Native (for tests and headless drivers)
//! - WASM (for the live decision page)

mod chart;
mod config;
mod controller;
mod countdown;
mod curve;
mod error;
mod format;
mod host;
mod message;
mod session;

#[cfg(test)]
mod testing;

#[cfg(feature = "wasm")]
mod wasm;

pub use chart::{snap_choice, ChartModel, Dataset, DatasetId, Style, XAxis, CURVE_POINTS};
pub use config::{ControllerConfig, RetryPolicy, Texts};
pub use controller::{PeriodController, Phase};
pub use countdown::{Countdown, TickOutcome};
pub use curve::{best_response, joint_payoff_curve, payoff_curve, relative_payoff_curve, Point};
pub use error::{ControllerError, TransportError};
pub use format::format_earnings;
pub use host::{Page, Scheduler, Timer, TimerHandle, Transport};
pub use message::{ClientMessage, MessageKind, PeriodUpdate};
pub use session::{PlayerId, RoundState, SessionParams};

/// Payoff of a firm choosing `own_action` against `partner_action`.
///
/// The market price `confidence - own_action - gamma * partner_action` is
/// floored at zero before it is multiplied by the quantity, and the result is
/// scaled by 100 to get display-friendly numbers.
pub fn payoff(confidence: f64, own_action: f64, partner_action: f64, gamma: f64) -> f64 {
    let price = (confidence - own_action - gamma * partner_action).max(0.0);
    own_action * price * 100.0
}
