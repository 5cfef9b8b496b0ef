//! Invocation payloads, as posted by the surrounding platform.

use crate::application::engine::Trigger;
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `{ "order_id": string }`
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Clone)]
pub struct DispatchTrigger {
    #[serde(default)]
    pub order_id: Option<String>,
}

/// `{ "order_id": string, "delivered_amount": number }`
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Clone)]
pub struct SettlementTrigger {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub delivered_amount: Option<Decimal>,
}

fn required_order_id(order_id: Option<String>) -> Result<String> {
    match order_id.map(|id| id.trim().to_string()) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(EngineError::InvalidInput("order_id is required".to_string())),
    }
}

impl TryFrom<DispatchTrigger> for Trigger {
    type Error = EngineError;

    fn try_from(payload: DispatchTrigger) -> Result<Self> {
        Ok(Trigger::Dispatch {
            order_id: required_order_id(payload.order_id)?,
        })
    }
}

impl TryFrom<SettlementTrigger> for Trigger {
    type Error = EngineError;

    fn try_from(payload: SettlementTrigger) -> Result<Self> {
        let order_id = required_order_id(payload.order_id)?;
        let delivered_amount = payload
            .delivered_amount
            .ok_or_else(|| EngineError::InvalidInput("delivered_amount is required".to_string()))?;
        if delivered_amount <= Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "delivered_amount must be positive, got {delivered_amount}"
            )));
        }
        Ok(Trigger::Settle {
            order_id,
            delivered_amount,
        })
    }
}

fn malformed(e: serde_json::Error) -> EngineError {
    EngineError::InvalidInput(format!("malformed payload: {e}"))
}

pub fn parse_dispatch(body: &str) -> Result<Trigger> {
    serde_json::from_str::<DispatchTrigger>(body)
        .map_err(malformed)?
        .try_into()
}

pub fn parse_settlement(body: &str) -> Result<Trigger> {
    serde_json::from_str::<SettlementTrigger>(body)
        .map_err(malformed)?
        .try_into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_dispatch() {
        assert_eq!(
            parse_dispatch(r#"{"order_id":"o-1"}"#).unwrap(),
            Trigger::Dispatch {
                order_id: "o-1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_settlement_accepts_numbers() {
        assert_eq!(
            parse_settlement(r#"{"order_id":"o-1","delivered_amount":1000}"#).unwrap(),
            Trigger::Settle {
                order_id: "o-1".to_string(),
                delivered_amount: dec!(1000)
            }
        );
        assert_eq!(
            parse_settlement(r#"{"order_id":"o-1","delivered_amount":"99.5"}"#).unwrap(),
            Trigger::Settle {
                order_id: "o-1".to_string(),
                delivered_amount: dec!(99.5)
            }
        );
    }

    #[test]
    fn test_missing_fields_are_client_errors() {
        for body in [
            r#"{}"#,
            r#"{"order_id":"  "}"#,
            r#"{"order_id":"o-1"}"#,
            r#"{"order_id":"o-1","delivered_amount":0}"#,
            r#"not json"#,
        ] {
            let err = parse_settlement(body).unwrap_err();
            assert_eq!(err.class(), ErrorClass::Client, "{body}");
        }
        assert_eq!(parse_dispatch("{}").unwrap_err().class(), ErrorClass::Client);
    }
}
