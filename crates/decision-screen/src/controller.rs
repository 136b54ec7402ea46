//! Period controller
//!
//! Reconciles server-driven period transitions with the local countdown,
//! keeps the chart in sync with round state, and submits the pending choice
//! once per period.
//!
//! Every accepted server message starts a new epoch: all timers armed for the
//! previous epoch are cancelled, and any that still fire are ignored, so each
//! period submits at most once.

use tracing::{debug, info, warn};
use crate::chart::{snap_choice, ChartModel};
use crate::config::ControllerConfig;
use crate::countdown::{Countdown, TickOutcome};
use crate::curve::best_response;
use crate::error::ControllerError;
use crate::format::format_earnings;
use crate::host::{Page, Scheduler, Timer, TimerHandle, Transport};
use crate::message::{ClientMessage, MessageKind, PeriodUpdate};
use crate::session::{RoundState, SessionParams};

/// Where the page is in the supergame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Loading,
    AwaitingServer,
    PeriodActive { period: u32 },
    GameEnded,
}

/// State of the push channel as far as sends can tell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Link {
    Up,
    Reconnecting,
    Lost,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Loading => "loading",
            Phase::AwaitingServer => "awaiting server",
            Phase::PeriodActive { .. } => "period active",
            Phase::GameEnded => "game ended",
        }
    }
}

pub struct PeriodController<P, T, S> {
    session: SessionParams,
    config: ControllerConfig,
    page: P,
    transport: T,
    scheduler: S,
    phase: Phase,
    round: RoundState,
    pending_choice: f64,
    chart: ChartModel,
    epoch: u64,
    countdown: Option<Countdown>,
    /// Timers armed during the current epoch
    timers: Vec<TimerHandle>,
    link: Link,
    /// Countdown ran out and the server has not answered yet
    waiting: bool,
}

impl<P: Page, T: Transport, S: Scheduler> PeriodController<P, T, S> {
    pub fn new(session: SessionParams, config: ControllerConfig, page: P, transport: T, scheduler: S) -> Self {
        let round = session.initial_round();
        let pending_choice = round.own_action;
        let chart = ChartModel::build(&session, &round, config.curve_points, pending_choice);
        Self {
            session,
            config,
            page,
            transport,
            scheduler,
            phase: Phase::Loading,
            round,
            pending_choice,
            chart,
            epoch: 0,
            countdown: None,
            timers: Vec::new(),
            link: Link::Up,
            waiting: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn pending_choice(&self) -> f64 {
        self.pending_choice
    }

    pub fn chart(&self) -> &ChartModel {
        &self.chart
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Page finished loading: draw the initial chart and tell the server we are ready
    pub fn start(&mut self) -> Result<(), ControllerError> {
        if self.phase != Phase::Loading {
            return Err(self.invalid("start"));
        }
        self.pending_choice = self.round.own_action;
        self.chart.set_choice(self.pending_choice);
        self.page.render_chart(&self.chart);
        self.phase = Phase::AwaitingServer;
        info!(player = u8::from(self.session.id), "page ready");
        self.send(ClientMessage::Ready, 0);
        Ok(())
    }

    /// Raw inbound message from the push channel
    ///
    /// Malformed messages are logged and dropped without touching any state.
    pub fn handle_message(&mut self, json: &str) -> Result<(), ControllerError> {
        let update = PeriodUpdate::from_json(json).map_err(|e| {
            warn!(error = %e, "ignoring server message");
            e
        })?;
        self.handle_update(update)
    }

    pub fn handle_update(&mut self, update: PeriodUpdate) -> Result<(), ControllerError> {
        match self.phase {
            Phase::Loading | Phase::GameEnded => {
                let err = self.invalid("server message");
                warn!(error = %err, period = update.period, "ignoring server message");
                return Err(err);
            }
            Phase::AwaitingServer | Phase::PeriodActive { .. } => {}
        }
        debug!(kind = ?update.kind, period = update.period, length = update.next_period_length, "server message");

        self.begin_epoch();
        self.round = RoundState::from_update(self.session.id, &update);
        self.pending_choice = if self.session.simulation {
            best_response(
                self.session.confidence,
                self.round.partner_action,
                self.session.gamma,
                self.session.number_of_choices,
            )
        } else {
            self.round.own_action
        };
        self.redraw();
        self.show_earnings();

        match update.kind {
            MessageKind::StartPeriod => self.start_period(&update),
            MessageKind::EndSupergame => self.end_supergame(),
        }
        self.show_status();
        Ok(())
    }

    /// Chart click at data coordinate `raw_x`; returns the new pending choice
    ///
    /// Clicks outside an active period are ignored.
    pub fn on_chart_click(&mut self, raw_x: f64) -> Option<f64> {
        if !matches!(self.phase, Phase::PeriodActive { .. }) {
            debug!(phase = self.phase.name(), "ignoring chart click");
            return None;
        }
        let choice = snap_choice(raw_x, self.session.number_of_choices);
        self.pending_choice = choice;
        self.chart.set_choice(choice);
        self.page.render_chart(&self.chart);
        Some(choice)
    }

    /// A timer armed earlier has fired
    pub fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::SubmitForm => {
                info!("submitting page form");
                self.page.submit_form();
            }
            Timer::CountdownTick { epoch } if epoch == self.epoch => self.tick(),
            Timer::WaitingNotice { epoch } if epoch == self.epoch => {
                self.waiting = true;
                self.page.set_countdown("");
                self.show_status();
            }
            Timer::Submit { epoch, expected } if epoch == self.epoch => self.submit(expected),
            Timer::Resend { epoch, message, attempt } if epoch == self.epoch => self.send(message, attempt),
            stale => debug!(?stale, current = self.epoch, "dropping stale timer"),
        }
    }

    fn start_period(&mut self, update: &PeriodUpdate) {
        self.phase = Phase::PeriodActive { period: update.period };
        let texts = &self.config.texts;
        self.page
            .set_period_counter(&texts.period_counter(update.period, self.session.num_periods));
        self.page
            .set_countdown(&texts.countdown(update.next_period_length as i64));

        let now = self.scheduler.now_ms();
        let (countdown, first_delay) = Countdown::start(now, update.next_period_length, self.config.tick_ms);
        self.countdown = Some(countdown);
        self.arm(first_delay, Timer::CountdownTick { epoch: self.epoch });
        self.arm(
            update.next_period_length,
            Timer::Submit { epoch: self.epoch, expected: update.expected },
        );
    }

    fn end_supergame(&mut self) {
        self.phase = Phase::GameEnded;
        self.countdown = None;
        self.page.set_countdown("");
        info!(round_payoff = self.round.round_payoff, "supergame over");
        // not tracked: nothing may cancel the form submission
        self.scheduler
            .schedule(self.config.end_of_game_delay_ms, Timer::SubmitForm);
    }

    fn tick(&mut self) {
        let now = self.scheduler.now_ms();
        let Some(countdown) = self.countdown.as_mut() else {
            return;
        };
        match countdown.tick(now) {
            TickOutcome::Running { remaining_ms, next_delay_ms } => {
                self.round.remaining_ms = remaining_ms as u64;
                self.page.set_countdown(&self.config.texts.countdown(remaining_ms));
                self.arm(next_delay_ms, Timer::CountdownTick { epoch: self.epoch });
            }
            TickOutcome::Expired => {
                self.round.remaining_ms = 0;
                self.arm(self.config.tick_ms, Timer::WaitingNotice { epoch: self.epoch });
            }
        }
    }

    fn submit(&mut self, expected: f64) {
        debug!(action = self.pending_choice, expected, "submitting choice");
        self.phase = Phase::AwaitingServer;
        self.send(
            ClientMessage::Update { action: self.pending_choice, expected },
            0,
        );
    }

    /// Send now; on failure retry with backoff until the policy gives up
    fn send(&mut self, message: ClientMessage, attempt: u32) {
        match self.transport.send(&message) {
            Ok(()) => {
                if self.link != Link::Up {
                    info!(attempts = attempt + 1, "send succeeded after retry");
                    self.link = Link::Up;
                    self.show_status();
                }
            }
            Err(e) => {
                let err = ControllerError::from(e);
                let policy = &self.config.retry;
                if attempt < policy.max_retries {
                    let delay = policy.delay_ms(attempt + 1);
                    warn!(error = %err, attempt = attempt + 1, delay_ms = delay, "send failed, retrying");
                    self.link = Link::Reconnecting;
                    self.show_status();
                    self.arm(
                        delay,
                        Timer::Resend { epoch: self.epoch, message, attempt: attempt + 1 },
                    );
                } else {
                    warn!(error = %err, attempts = attempt + 1, "send failed, giving up");
                    self.link = Link::Lost;
                    self.show_status();
                }
            }
        }
    }

    fn begin_epoch(&mut self) {
        for handle in self.timers.drain(..) {
            self.scheduler.cancel(handle);
        }
        self.countdown = None;
        self.link = Link::Up;
        self.waiting = false;
        self.epoch += 1;
    }

    fn arm(&mut self, delay_ms: u64, timer: Timer) {
        let handle = self.scheduler.schedule(delay_ms, timer);
        self.timers.push(handle);
    }

    fn redraw(&mut self) {
        self.chart = ChartModel::build(
            &self.session,
            &self.round,
            self.config.curve_points,
            self.pending_choice,
        );
        self.page.render_chart(&self.chart);
    }

    /// Connection problems outrank the waiting notice
    fn show_status(&mut self) {
        let texts = &self.config.texts;
        let text = match self.link {
            Link::Lost => texts.connection_lost.as_str(),
            Link::Reconnecting => texts.reconnecting.as_str(),
            Link::Up if self.phase == Phase::GameEnded => texts.game_over.as_str(),
            Link::Up if self.waiting => texts.waiting_for_server.as_str(),
            Link::Up => "",
        };
        self.page.set_status(text);
    }

    fn show_earnings(&mut self) {
        if self.round.period == 0 {
            self.page.set_earnings("0", "0");
        } else {
            let previous = format_earnings(self.round.own_period_payoff);
            let cumulative = format_earnings(self.round.round_payoff);
            self.page.set_earnings(&previous, &cumulative);
        }
    }

    fn invalid(&self, operation: &'static str) -> ControllerError {
        ControllerError::InvalidTransition { operation, phase: self.phase.name() }
    }
}
