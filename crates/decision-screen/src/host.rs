//! Seams between the controller and the page hosting it
//!
//! The controller never touches the DOM, the clock or the network directly.
//! A browser host implements these traits with `web-sys`; tests use a
//! virtual clock.

use crate::chart::ChartModel;
use crate::error::TransportError;
use crate::message::ClientMessage;

/// The rendered surface of the decision page
pub trait Page {
    fn render_chart(&mut self, chart: &ChartModel);
    fn set_earnings(&mut self, previous_period: &str, cumulative: &str);
    fn set_period_counter(&mut self, text: &str);
    fn set_countdown(&mut self, text: &str);
    fn set_status(&mut self, text: &str);
    /// Leave the page; called once at the end of the supergame
    fn submit_form(&mut self);
}

/// The page's push channel to the server
pub trait Transport {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError>;
}

/// Opaque id of a scheduled timer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Deferred work the controller asks the host to hand back later
///
/// `epoch` identifies the server message that armed the timer. Timers from an
/// older epoch are ignored when they fire.
#[derive(Clone, Debug, PartialEq)]
pub enum Timer {
    CountdownTick { epoch: u64 },
    /// Countdown ran out and no new period has arrived yet
    WaitingNotice { epoch: u64 },
    /// End of period: send the pending choice
    Submit { epoch: u64, expected: f64 },
    Resend { epoch: u64, message: ClientMessage, attempt: u32 },
    SubmitForm,
}

/// One-shot timers on the host's event loop
pub trait Scheduler {
    /// Wall clock in milliseconds
    fn now_ms(&self) -> f64;
    fn schedule(&mut self, delay_ms: u64, timer: Timer) -> TimerHandle;
    /// Cancelling a timer that already fired is a no-op
    fn cancel(&mut self, handle: TimerHandle);
}
