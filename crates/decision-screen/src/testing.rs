//! Virtual-clock host for controller tests

use std::cell::Cell;
use std::rc::Rc;
use serde_json::json;
use crate::chart::ChartModel;
use crate::config::ControllerConfig;
use crate::controller::PeriodController;
use crate::error::TransportError;
use crate::host::{Page, Scheduler, Timer, TimerHandle, Transport};
use crate::message::ClientMessage;
use crate::session::SessionParams;

pub type Clock = Rc<Cell<f64>>;

#[derive(Default)]
pub struct FakePage {
    pub clock: Clock,
    pub charts: Vec<ChartModel>,
    pub earnings: (String, String),
    pub period_counter: String,
    pub countdown: String,
    pub status: String,
    pub form_submitted_at: Option<f64>,
}

impl Page for FakePage {
    fn render_chart(&mut self, chart: &ChartModel) {
        self.charts.push(chart.clone());
    }

    fn set_earnings(&mut self, previous_period: &str, cumulative: &str) {
        self.earnings = (previous_period.to_string(), cumulative.to_string());
    }

    fn set_period_counter(&mut self, text: &str) {
        self.period_counter = text.to_string();
    }

    fn set_countdown(&mut self, text: &str) {
        self.countdown = text.to_string();
    }

    fn set_status(&mut self, text: &str) {
        self.status = text.to_string();
    }

    fn submit_form(&mut self) {
        assert!(self.form_submitted_at.is_none(), "form submitted twice");
        self.form_submitted_at = Some(self.clock.get());
    }
}

/// Records successful sends; fails the next `fail_next` attempts
#[derive(Default)]
pub struct FakeTransport {
    pub sent: Vec<ClientMessage>,
    pub attempts: u32,
    pub fail_next: u32,
}

impl Transport for FakeTransport {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
        self.attempts += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(TransportError::NotReady);
        }
        self.sent.push(message.clone());
        Ok(())
    }
}

struct Pending {
    due: f64,
    handle: TimerHandle,
    timer: Timer,
}

#[derive(Default)]
pub struct VirtualScheduler {
    pub clock: Clock,
    /// Every timer fires this much after its due time
    pub lateness_ms: f64,
    /// (delay, timer) for every `schedule` call
    pub log: Vec<(u64, Timer)>,
    pub cancelled: Vec<TimerHandle>,
    pending: Vec<Pending>,
    next_handle: u64,
}

impl VirtualScheduler {
    /// Remove the earliest timer firing at or before `until`, moving the clock to it
    fn pop_due(&mut self, until: f64) -> Option<Timer> {
        let lateness = self.lateness_ms;
        let (index, fires_at) = self
            .pending
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.due + lateness))
            .filter(|(_, at)| *at <= until)
            // handles grow monotonically, so they break ties in scheduling order
            .min_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then(self.pending[a.0].handle.0.cmp(&self.pending[b.0].handle.0))
            })?;
        let pending = self.pending.remove(index);
        self.clock.set(fires_at);
        Some(pending.timer)
    }
}

impl Scheduler for VirtualScheduler {
    fn now_ms(&self) -> f64 {
        self.clock.get()
    }

    fn schedule(&mut self, delay_ms: u64, timer: Timer) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        self.log.push((delay_ms, timer.clone()));
        self.pending.push(Pending {
            due: self.clock.get() + delay_ms as f64,
            handle,
            timer,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        if self.pending.len() < before {
            self.cancelled.push(handle);
        }
    }
}

pub type TestController = PeriodController<FakePage, FakeTransport, VirtualScheduler>;

pub fn session_json(id: u8) -> String {
    json!({
        "id": id,
        "confidence": 1.1,
        "partner_confidence": 1.0,
        "gamma": 0.0,
        "number_of_choices": 100,
        "joint_payoff_info": true,
        "relative_payoff_info": true,
        "num_periods": null,
        "simulation": false,
        "p1_action": 0.35,
        "p2_action": 0.25,
        "p1_period_payoff": 26.25,
        "p2_period_payoff": 18.75
    })
    .to_string()
}

pub fn controller(session: String) -> TestController {
    let session = SessionParams::from_json(&session).unwrap();
    let clock = Clock::default();
    let page = FakePage { clock: clock.clone(), ..FakePage::default() };
    let scheduler = VirtualScheduler { clock, ..VirtualScheduler::default() };
    PeriodController::new(session, ControllerConfig::default(), page, FakeTransport::default(), scheduler)
}

pub fn started(session: String) -> TestController {
    let mut ctrl = controller(session);
    ctrl.start().unwrap();
    ctrl
}

fn period_message(kind: &str, period: u32, next_period_length: u64, expected: f64) -> String {
    json!({
        "type": kind,
        "period": period,
        "next_period_length": next_period_length,
        "expected": expected,
        "p1_action": 0.35,
        "p2_action": 0.25,
        "p1_period_payoff": 26.25,
        "p2_period_payoff": 18.75,
        "p1_round_payoff": 60.0,
        "p2_round_payoff": 40.0
    })
    .to_string()
}

pub fn start_period(period: u32, next_period_length: u64, expected: f64) -> String {
    period_message("start-period", period, next_period_length, expected)
}

pub fn end_supergame(period: u32) -> String {
    period_message("end-supergame", period, 0, 0.0)
}

/// Fire every timer due up to `to`, in time order, then leave the clock at `to`
pub fn advance_to(ctrl: &mut TestController, to: f64) {
    while let Some(timer) = ctrl.scheduler_mut().pop_due(to) {
        ctrl.on_timer(timer);
    }
    ctrl.scheduler().clock.set(to);
}
