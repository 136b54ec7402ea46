//! Chart model
//!
//! Library-agnostic description of what the decision chart shows. The page
//! hands it to whatever charting library it uses; dataset order is fixed so
//! the page can address datasets by index.

use serde::{Deserialize, Serialize};
use crate::curve::{joint_payoff_curve, payoff_curve, relative_payoff_curve, Point};
use crate::session::{RoundState, SessionParams};

/// Curve resolution: actions 0.00, 0.01, .., 1.00
pub const CURVE_POINTS: usize = 101;

/// Datasets in chart order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetId {
    OwnCurve,
    OwnAction,
    PartnerAction,
    OwnPayoff,
    PartnerPayoff,
    JointCurve,
    JointPayoff,
    RelativeCurve,
    RelativePayoff,
}

impl DatasetId {
    pub const ALL: [DatasetId; 9] = [
        DatasetId::OwnCurve,
        DatasetId::OwnAction,
        DatasetId::PartnerAction,
        DatasetId::OwnPayoff,
        DatasetId::PartnerPayoff,
        DatasetId::JointCurve,
        DatasetId::JointPayoff,
        DatasetId::RelativeCurve,
        DatasetId::RelativePayoff,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// How a dataset is drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    SolidLine,
    DashedLine,
    DottedLine,
    OwnSquare,
    PartnerSquare,
    OwnDot,
    PartnerDot,
    MarketDot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub style: Style,
    pub hidden: bool,
    pub data: Vec<Point>,
}

/// Horizontal axis range, slightly wider than the action range so that the
/// markers at 0 and 1 are not cut off
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct XAxis {
    pub min: f64,
    pub max: f64,
}

impl Default for XAxis {
    fn default() -> Self {
        Self { min: -0.02, max: 1.02 }
    }
}

impl XAxis {
    /// Data value under a canvas-relative pixel column
    pub fn value_for_pixel(&self, pixel: f64, width: f64) -> f64 {
        if width <= 0.0 {
            return self.min;
        }
        self.min + (pixel / width) * (self.max - self.min)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartModel {
    pub datasets: Vec<Dataset>,
    /// Position of the vertical line marking the pending choice
    pub choice_line: f64,
    pub x_axis: XAxis,
    pub y_suggested_max: f64,
}

/// Snap a clicked data value to the choice grid and clamp it into [0, 1]
pub fn snap_choice(raw_x: f64, number_of_choices: u32) -> f64 {
    if !raw_x.is_finite() {
        return 0.0;
    }
    let n = number_of_choices.max(1) as f64;
    ((raw_x * n).round() / n).clamp(0.0, 1.0)
}

fn style_of(id: DatasetId) -> Style {
    match id {
        DatasetId::OwnCurve => Style::SolidLine,
        DatasetId::OwnAction => Style::OwnSquare,
        DatasetId::PartnerAction => Style::PartnerSquare,
        DatasetId::OwnPayoff => Style::OwnDot,
        DatasetId::PartnerPayoff => Style::PartnerDot,
        DatasetId::JointCurve => Style::DashedLine,
        DatasetId::JointPayoff => Style::MarketDot,
        DatasetId::RelativeCurve => Style::DottedLine,
        DatasetId::RelativePayoff => Style::MarketDot,
    }
}

fn is_hidden(id: DatasetId, session: &SessionParams) -> bool {
    match id {
        DatasetId::PartnerPayoff => !(session.joint_payoff_info || session.relative_payoff_info),
        DatasetId::JointCurve | DatasetId::JointPayoff => !session.joint_payoff_info,
        DatasetId::RelativeCurve | DatasetId::RelativePayoff => !session.relative_payoff_info,
        _ => false,
    }
}

impl ChartModel {
    /// Build every dataset from scratch for the given round
    pub fn build(session: &SessionParams, round: &RoundState, curve_points: usize, choice: f64) -> Self {
        let datasets = DatasetId::ALL
            .iter()
            .map(|&id| Dataset {
                id,
                style: style_of(id),
                hidden: is_hidden(id, session),
                data: Self::data_for(id, session, round, curve_points),
            })
            .collect();

        Self {
            datasets,
            choice_line: choice,
            x_axis: XAxis::default(),
            y_suggested_max: 0.5 * 100.0,
        }
    }

    fn data_for(id: DatasetId, session: &SessionParams, round: &RoundState, curve_points: usize) -> Vec<Point> {
        let c = session.confidence;
        let pc = session.partner_confidence;
        let g = session.gamma;
        let pa = round.partner_action;
        match id {
            DatasetId::OwnCurve => payoff_curve(c, curve_points, pa, g).collect(),
            DatasetId::JointCurve => joint_payoff_curve(c, pc, curve_points, pa, g).collect(),
            DatasetId::RelativeCurve => relative_payoff_curve(c, pc, curve_points, pa, g).collect(),
            DatasetId::OwnAction => vec![Point::new(round.own_action, 0.0)],
            DatasetId::PartnerAction => vec![Point::new(pa, 0.0)],
            DatasetId::OwnPayoff => vec![Point::new(round.own_action, round.own_period_payoff)],
            DatasetId::PartnerPayoff => vec![Point::new(pa, round.partner_period_payoff)],
            DatasetId::JointPayoff => vec![Point::new(round.own_action, round.market_payoff())],
            DatasetId::RelativePayoff => vec![Point::new(round.own_action, round.payoff_gap())],
        }
    }

    pub fn dataset(&self, id: DatasetId) -> &Dataset {
        &self.datasets[id.index()]
    }

    /// Move the choice indicator; datasets stay as they are
    pub fn set_choice(&mut self, choice: f64) {
        self.choice_line = choice;
    }
}
