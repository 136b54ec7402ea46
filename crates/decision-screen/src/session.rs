//! Session parameters and per-round state

use serde::{Deserialize, Serialize};
use crate::error::ControllerError;
use crate::message::PeriodUpdate;

/// Position of this player within the two-player group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlayerId {
    One,
    Two,
}

impl TryFrom<u8> for PlayerId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PlayerId::One),
            2 => Ok(PlayerId::Two),
            other => Err(format!("player id must be 1 or 2, got {}", other)),
        }
    }
}

impl From<PlayerId> for u8 {
    fn from(id: PlayerId) -> u8 {
        match id {
            PlayerId::One => 1,
            PlayerId::Two => 2,
        }
    }
}

impl PlayerId {
    /// Pick (own, partner) out of a pair ordered as (player 1, player 2)
    pub fn own_and_partner<T>(self, p1: T, p2: T) -> (T, T) {
        match self {
            PlayerId::One => (p1, p2),
            PlayerId::Two => (p2, p1),
        }
    }
}

/// Parameters embedded by the host page, fixed for the whole page load
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    pub id: PlayerId,
    pub confidence: f64,
    pub partner_confidence: f64,
    pub gamma: f64,
    pub number_of_choices: u32,
    #[serde(default)]
    pub joint_payoff_info: bool,
    #[serde(default)]
    pub relative_payoff_info: bool,
    /// Periods per supergame, shown next to the period counter when known
    #[serde(default)]
    pub num_periods: Option<u32>,
    /// Play the best response automatically instead of waiting for clicks
    #[serde(default)]
    pub simulation: bool,
    pub p1_action: f64,
    pub p2_action: f64,
    pub p1_period_payoff: f64,
    pub p2_period_payoff: f64,
}

impl SessionParams {
    /// Parse the page's `js_vars` JSON
    pub fn from_json(json: &str) -> Result<Self, ControllerError> {
        let params: SessionParams = serde_json::from_str(json)
            .map_err(|e| ControllerError::MalformedSession(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        let numbers = [
            ("confidence", self.confidence),
            ("partner_confidence", self.partner_confidence),
            ("gamma", self.gamma),
            ("p1_period_payoff", self.p1_period_payoff),
            ("p2_period_payoff", self.p2_period_payoff),
        ];
        for (name, value) in numbers {
            if !value.is_finite() {
                return Err(ControllerError::MalformedSession(format!("{} is not finite", name)));
            }
        }
        for (name, value) in [("p1_action", self.p1_action), ("p2_action", self.p2_action)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ControllerError::MalformedSession(format!(
                    "{} = {} outside [0, 1]",
                    name, value
                )));
            }
        }
        if self.number_of_choices == 0 {
            return Err(ControllerError::MalformedSession(
                "number_of_choices must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Round state before the first server message
    pub fn initial_round(&self) -> RoundState {
        let (own_action, partner_action) = self.id.own_and_partner(self.p1_action, self.p2_action);
        let (own_period_payoff, partner_period_payoff) =
            self.id.own_and_partner(self.p1_period_payoff, self.p2_period_payoff);
        RoundState {
            own_action,
            partner_action,
            own_period_payoff,
            partner_period_payoff,
            round_payoff: 0.0,
            period: 0,
            remaining_ms: 0,
        }
    }
}

/// Values shown for the current period, as seen from this player
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundState {
    pub own_action: f64,
    pub partner_action: f64,
    pub own_period_payoff: f64,
    pub partner_period_payoff: f64,
    pub round_payoff: f64,
    pub period: u32,
    pub remaining_ms: u64,
}

impl RoundState {
    /// Round state carried by a server message
    pub fn from_update(id: PlayerId, update: &PeriodUpdate) -> Self {
        let (own_action, partner_action) = id.own_and_partner(update.p1_action, update.p2_action);
        let (own_period_payoff, partner_period_payoff) =
            id.own_and_partner(update.p1_period_payoff, update.p2_period_payoff);
        let (round_payoff, _) = id.own_and_partner(update.p1_round_payoff, update.p2_round_payoff);
        Self {
            own_action,
            partner_action,
            own_period_payoff,
            partner_period_payoff,
            round_payoff,
            period: update.period,
            remaining_ms: update.next_period_length,
        }
    }

    /// Both period payoffs added up
    pub fn market_payoff(&self) -> f64 {
        self.own_period_payoff + self.partner_period_payoff
    }

    /// Negative absolute gap between the two period payoffs
    pub fn payoff_gap(&self) -> f64 {
        -(self.own_period_payoff - self.partner_period_payoff).abs()
    }
}
