//! Messages exchanged with the experiment server

use serde::{Deserialize, Deserializer, Serialize};
use crate::error::ControllerError;

/// What the server wants the page to do next
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    StartPeriod,
    EndSupergame,
}

/// Message pushed by the server at every period boundary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodUpdate {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub period: u32,
    /// Milliseconds until the next period boundary
    #[serde(deserialize_with = "deserialize_millis")]
    pub next_period_length: u64,
    /// Server timestamp (ms) at which the boundary is expected; echoed back on submit
    pub expected: f64,
    pub p1_action: f64,
    pub p2_action: f64,
    pub p1_period_payoff: f64,
    pub p2_period_payoff: f64,
    pub p1_round_payoff: f64,
    pub p2_round_payoff: f64,
}

/// The server adjusts period lengths by wall-clock drift, so lengths can
/// arrive as fractional milliseconds.
fn deserialize_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "period length must be a non-negative number of milliseconds, got {}",
            value
        )));
    }
    Ok(value.round() as u64)
}

impl PeriodUpdate {
    /// Parse and validate one inbound message
    pub fn from_json(json: &str) -> Result<Self, ControllerError> {
        let update: PeriodUpdate = serde_json::from_str(json)
            .map_err(|e| ControllerError::MalformedMessage(e.to_string()))?;
        update.validate()?;
        Ok(update)
    }

    /// Same as `from_json`, for messages that are already decoded
    pub fn from_value(value: serde_json::Value) -> Result<Self, ControllerError> {
        let update: PeriodUpdate = serde_json::from_value(value)
            .map_err(|e| ControllerError::MalformedMessage(e.to_string()))?;
        update.validate()?;
        Ok(update)
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        for (name, value) in [("p1_action", self.p1_action), ("p2_action", self.p2_action)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ControllerError::MalformedMessage(format!(
                    "{} = {} outside [0, 1]",
                    name, value
                )));
            }
        }
        let numbers = [
            ("expected", self.expected),
            ("p1_period_payoff", self.p1_period_payoff),
            ("p2_period_payoff", self.p2_period_payoff),
            ("p1_round_payoff", self.p1_round_payoff),
            ("p2_round_payoff", self.p2_round_payoff),
        ];
        for (name, value) in numbers {
            if !value.is_finite() {
                return Err(ControllerError::MalformedMessage(format!("{} is not finite", name)));
            }
        }
        Ok(())
    }
}

/// Message sent by the page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Page finished loading and can receive periods
    Ready,
    /// Choice for the period that ends at `expected`
    Update { action: f64, expected: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn start_period_json() -> serde_json::Value {
        json!({
            "type": "start-period",
            "period": 1,
            "next_period_length": 4000,
            "expected": 1700000004000.0,
            "p1_action": 0.35,
            "p2_action": 0.25,
            "p1_period_payoff": 26.25,
            "p2_period_payoff": 18.75,
            "p1_round_payoff": 26.25,
            "p2_round_payoff": 18.75
        })
    }

    #[test]
    fn test_parse_start_period() {
        let update = PeriodUpdate::from_value(start_period_json()).unwrap();
        assert_eq!(update.kind, MessageKind::StartPeriod);
        assert_eq!(update.period, 1);
        assert_eq!(update.next_period_length, 4000);
        assert_eq!(update.expected, 1700000004000.0);
    }

    #[test]
    fn test_parse_end_supergame() {
        let mut value = start_period_json();
        value["type"] = json!("end-supergame");
        let update = PeriodUpdate::from_json(&value.to_string()).unwrap();
        assert_eq!(update.kind, MessageKind::EndSupergame);
    }

    #[test]
    fn test_fractional_period_length_rounds() {
        let mut value = start_period_json();
        value["next_period_length"] = json!(3912.6);
        let update = PeriodUpdate::from_value(value).unwrap();
        assert_eq!(update.next_period_length, 3913);
    }

    #[test]
    fn test_rejects_negative_period_length() {
        let mut value = start_period_json();
        value["next_period_length"] = json!(-5);
        let err = PeriodUpdate::from_value(value).unwrap_err();
        assert!(matches!(err, ControllerError::MalformedMessage(_)));
    }

    #[test]
    fn test_rejects_missing_field() {
        let mut value = start_period_json();
        value.as_object_mut().unwrap().remove("p2_action");
        assert!(PeriodUpdate::from_value(value).is_err());
    }

    #[test]
    fn test_rejects_unknown_type() {
        let mut value = start_period_json();
        value["type"] = json!("pause");
        assert!(PeriodUpdate::from_value(value).is_err());
    }

    #[test]
    fn test_rejects_action_outside_unit_interval() {
        let mut value = start_period_json();
        value["p1_action"] = json!(1.5);
        assert!(PeriodUpdate::from_value(value).is_err());
    }

    #[test]
    fn test_client_messages_wire_format() {
        assert_eq!(serde_json::to_value(ClientMessage::Ready).unwrap(), json!({"type": "ready"}));
        let update = ClientMessage::Update { action: 0.73, expected: 5000.0 };
        assert_eq!(
            serde_json::to_value(update).unwrap(),
            json!({"type": "update", "action": 0.73, "expected": 5000.0})
        );
    }
}
