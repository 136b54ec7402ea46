//! Counterfactual payoff curves
//!
//! Each curve samples `payoff` on an equally spaced grid over [0, 1] while the
//! partner's action stays fixed. Curves are lazy iterators: they are rebuilt
//! on every redraw and consumed once.

use serde::{Deserialize, Serialize};
use crate::payoff;

/// A point on the chart, in data coordinates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Grid position `i` of `num_points` equally spaced values in [0, 1]
fn grid_x(i: usize, num_points: usize) -> f64 {
    if num_points <= 1 {
        0.0
    } else {
        i as f64 / (num_points - 1) as f64
    }
}

/// Own payoff for every grid action against a fixed partner action
pub fn payoff_curve(
    confidence: f64,
    num_points: usize,
    partner_action: f64,
    gamma: f64,
) -> impl Iterator<Item = Point> {
    (0..num_points).map(move |i| {
        let x = grid_x(i, num_points);
        Point::new(x, payoff(confidence, x, partner_action, gamma))
    })
}

/// Both components of the joint payoff at grid action `x`: (own, partner)
fn components(
    confidence: f64,
    partner_confidence: f64,
    x: f64,
    partner_action: f64,
    gamma: f64,
) -> (f64, f64) {
    let own = payoff(confidence, x, partner_action, gamma);
    // roles reversed: the partner's quantity is fixed, ours moves along the grid
    let partner = payoff(partner_confidence, partner_action, x, gamma);
    (own, partner)
}

/// Sum of both players' payoffs for every grid action
pub fn joint_payoff_curve(
    confidence: f64,
    partner_confidence: f64,
    num_points: usize,
    partner_action: f64,
    gamma: f64,
) -> impl Iterator<Item = Point> {
    (0..num_points).map(move |i| {
        let x = grid_x(i, num_points);
        let (own, partner) = components(confidence, partner_confidence, x, partner_action, gamma);
        Point::new(x, own + partner)
    })
}

/// Negative absolute payoff gap for every grid action
///
/// Zero where both players earn the same, increasingly negative as the
/// payoffs diverge.
pub fn relative_payoff_curve(
    confidence: f64,
    partner_confidence: f64,
    num_points: usize,
    partner_action: f64,
    gamma: f64,
) -> impl Iterator<Item = Point> {
    (0..num_points).map(move |i| {
        let x = grid_x(i, num_points);
        let (own, partner) = components(confidence, partner_confidence, x, partner_action, gamma);
        Point::new(x, -(own - partner).abs())
    })
}

/// Best grid action against a fixed partner action
///
/// Searches the `number_of_choices + 1` actions `0, 1/n, .., 1`. Ties go to
/// the lowest action.
pub fn best_response(
    confidence: f64,
    partner_action: f64,
    gamma: f64,
    number_of_choices: u32,
) -> f64 {
    let points = number_of_choices.max(1) as usize + 1;
    let mut best = Point::new(0.0, payoff(confidence, 0.0, partner_action, gamma));
    for point in payoff_curve(confidence, points, partner_action, gamma).skip(1) {
        if point.y > best.y {
            best = point;
        }
    }
    best.x
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_curve_grid() {
        let curve: Vec<Point> = payoff_curve(1.0, 5, 0.2, 0.5).collect();
        let xs: Vec<f64> = curve.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_curve_degenerate_sizes() {
        assert_eq!(payoff_curve(1.0, 0, 0.2, 0.5).count(), 0);
        let single: Vec<Point> = payoff_curve(1.0, 1, 0.2, 0.5).collect();
        assert_eq!(single, vec![Point::new(0.0, 0.0)]);
    }

    #[test]
    fn test_curve_contains_scenario_value() {
        let point = payoff_curve(1.1, 101, 0.25, 0.0)
            .find(|p| (p.x - 0.35).abs() < 1e-9)
            .expect("0.35 is on the grid");
        assert!((point.y - 26.25).abs() < 1e-9, "got {}", point.y);
    }

    #[test]
    fn test_relative_zero_at_symmetric_point() {
        // equal confidence and equal actions give equal payoffs
        let point = relative_payoff_curve(1.0, 1.0, 101, 0.3, 0.5)
            .find(|p| (p.x - 0.3).abs() < 1e-9)
            .expect("0.3 is on the grid");
        assert!(point.y.abs() < 1e-9, "got {}", point.y);
    }

    #[test]
    fn test_best_response_cournot() {
        // argmax of q * (1 - q - 0.5 * 0.4) is q = 0.4
        let q = best_response(1.0, 0.4, 0.5, 100);
        assert!((q - 0.4).abs() < 1e-9, "got {}", q);
    }

    #[test]
    fn test_best_response_when_market_is_closed() {
        // price is zero everywhere, so every action ties at zero
        assert_eq!(best_response(0.0, 1.0, 1.0, 100), 0.0);
    }

    proptest! {
        #[test]
        fn prop_curve_shape(n in 2usize..300, c in 0.0f64..2.0, pa in 0.0f64..=1.0, g in 0.0f64..1.0) {
            let curve: Vec<Point> = payoff_curve(c, n, pa, g).collect();
            prop_assert_eq!(curve.len(), n);
            prop_assert_eq!(curve[0].x, 0.0);
            prop_assert_eq!(curve[n - 1].x, 1.0);
            for (i, pair) in curve.windows(2).enumerate() {
                prop_assert!(pair[0].x < pair[1].x, "not increasing at {}", i);
            }
        }

        #[test]
        fn prop_joint_is_sum_of_roles(
            c1 in 0.0f64..2.0, c2 in 0.0f64..2.0, pa in 0.0f64..=1.0, g in 0.0f64..1.0, n in 2usize..200,
        ) {
            for (i, point) in joint_payoff_curve(c1, c2, n, pa, g).enumerate() {
                let x = i as f64 / (n - 1) as f64;
                let expected = payoff(c1, x, pa, g) + payoff(c2, pa, x, g);
                prop_assert_eq!(point.x, x);
                prop_assert!((point.y - expected).abs() < 1e-9);
            }
        }

        #[test]
        fn prop_relative_never_positive(
            c1 in 0.0f64..2.0, c2 in 0.0f64..2.0, pa in 0.0f64..=1.0, g in 0.0f64..1.0, n in 2usize..200,
        ) {
            let joint = joint_payoff_curve(c1, c2, n, pa, g);
            let relative = relative_payoff_curve(c1, c2, n, pa, g);
            for (j, r) in joint.zip(relative) {
                prop_assert!(r.y <= 0.0);
                let own = payoff(c1, j.x, pa, g);
                let partner = j.y - own;
                prop_assert!((r.y + (own - partner).abs()).abs() < 1e-9);
            }
        }
    }
}
