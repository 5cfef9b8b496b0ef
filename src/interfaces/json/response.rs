//! Structured result of one invocation.

use crate::application::dispatcher::DispatchOutcome;
use crate::application::engine::{Outcome, Trigger};
use crate::application::settlement::{CashbackResult, ReferralResult, SettlementOutcome};
use crate::domain::wallet::ConversionOutcome;
use crate::error::{EngineError, ErrorClass};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfulfillable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashback: Option<CashbackView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral: Option<ReferralView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CashbackView {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<Decimal>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ReferralView {
    pub status: &'static str,
    pub referrer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Response {
    pub fn render(trigger: &Trigger, result: &Result<Outcome, EngineError>) -> Self {
        let (operation, order_id) = match trigger {
            Trigger::Dispatch { order_id } => ("dispatch", order_id.clone()),
            Trigger::Settle { order_id, .. } => ("settle", order_id.clone()),
        };
        let mut response = match result {
            Ok(Outcome::Dispatch(outcome)) => Self::dispatch(outcome),
            Ok(Outcome::Settlement(outcome)) => Self::settlement(outcome),
            Err(e) => Self::failure(e),
        };
        response.operation = Some(operation);
        response.order_id = Some(order_id);
        response
    }

    /// A failure that happened before a trigger could be built.
    pub fn failure(err: &EngineError) -> Self {
        let class = match err.class() {
            ErrorClass::Client => "client",
            ErrorClass::NotFound => "not_found",
            ErrorClass::Server => "server",
        };
        Self {
            success: false,
            error: Some(err.to_string()),
            error_class: Some(class),
            retryable: Some(err.is_retryable()),
            ..Self::default()
        }
    }

    fn dispatch(outcome: &DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Assigned {
                vendor_id,
                distance_km,
                delivery_id,
            } => Self {
                success: true,
                vendor_id: Some(vendor_id.clone()),
                distance_km: Some(*distance_km),
                delivery_id: Some(delivery_id.clone()),
                ..Self::default()
            },
            DispatchOutcome::Unfulfillable { reason } => Self {
                success: false,
                unfulfillable: Some(true),
                reason: Some(reason.as_str().to_string()),
                ..Self::default()
            },
            DispatchOutcome::ManualAssignment => Self {
                success: true,
                skipped: Some(true),
                reason: Some("manual_assignment".to_string()),
                ..Self::default()
            },
            DispatchOutcome::AlreadyHandled { status } => Self {
                success: true,
                skipped: Some(true),
                reason: Some("already_handled".to_string()),
                status: Some(status.to_string()),
                ..Self::default()
            },
        }
    }

    fn settlement(outcome: &SettlementOutcome) -> Self {
        let cashback = match &outcome.cashback {
            CashbackResult::Credited {
                amount,
                balance_after,
            } => CashbackView {
                status: "credited",
                amount: Some(amount.value()),
                balance_after: Some(balance_after.value()),
            },
            CashbackResult::AlreadySettled => CashbackView {
                status: "already_settled",
                amount: None,
                balance_after: None,
            },
            CashbackResult::Skipped => CashbackView {
                status: "skipped",
                amount: None,
                balance_after: None,
            },
        };

        Self {
            success: true,
            cashback: Some(cashback),
            referral: outcome.referral.as_ref().map(referral_view),
            ..Self::default()
        }
    }
}

fn referral_view(result: &ReferralResult) -> ReferralView {
    match result {
        ReferralResult::Attempted(conversion) => ReferralView {
            status: match conversion.outcome {
                ConversionOutcome::Full { .. } => "converted",
                ConversionOutcome::Partial { .. } => "partial",
                ConversionOutcome::None { .. } => "not_converted",
            },
            referrer_id: conversion.referrer_id.clone(),
            converted: Some(conversion.converted()),
            converted_amount: Some(
                conversion
                    .outcome
                    .converted_amount()
                    .map(|a| a.value())
                    .unwrap_or(Decimal::ZERO),
            ),
            reward_amount: Some(conversion.reward_amount.value()),
            failure_reason: conversion.failure_reason(),
        },
        ReferralResult::AlreadySettled { referrer_id } => ReferralView {
            status: "already_settled",
            referrer_id: referrer_id.clone(),
            converted: None,
            converted_amount: None,
            reward_amount: None,
            failure_reason: None,
        },
        ReferralResult::Skipped { referrer_id } => ReferralView {
            status: "skipped",
            referrer_id: referrer_id.clone(),
            converted: None,
            converted_amount: None,
            reward_amount: None,
            failure_reason: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderStatus, UnfulfillableReason};
    use serde_json::json;

    fn dispatch_trigger() -> Trigger {
        Trigger::Dispatch {
            order_id: "o-1".to_string(),
        }
    }

    #[test]
    fn test_assigned_shape() {
        let result = Ok(Outcome::Dispatch(DispatchOutcome::Assigned {
            vendor_id: "v-1".to_string(),
            distance_km: 2.0,
            delivery_id: "d-1".to_string(),
        }));
        let value = serde_json::to_value(Response::render(&dispatch_trigger(), &result)).unwrap();
        assert_eq!(
            value,
            json!({
                "success": true,
                "operation": "dispatch",
                "order_id": "o-1",
                "vendor_id": "v-1",
                "distance_km": 2.0,
                "delivery_id": "d-1",
            })
        );
    }

    #[test]
    fn test_unfulfillable_shape() {
        let result = Ok(Outcome::Dispatch(DispatchOutcome::Unfulfillable {
            reason: UnfulfillableReason::NoVendorsInRadius,
        }));
        let value = serde_json::to_value(Response::render(&dispatch_trigger(), &result)).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["unfulfillable"], true);
        assert_eq!(value["reason"], "no_vendors_in_radius");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_already_handled_shape() {
        let result = Ok(Outcome::Dispatch(DispatchOutcome::AlreadyHandled {
            status: OrderStatus::Processing,
        }));
        let value = serde_json::to_value(Response::render(&dispatch_trigger(), &result)).unwrap();
        assert_eq!(value["skipped"], true);
        assert_eq!(value["status"], "processing");
    }

    #[test]
    fn test_error_shape() {
        let result = Err(EngineError::not_found("order", "o-1"));
        let value = serde_json::to_value(Response::render(&dispatch_trigger(), &result)).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "order not found: o-1");
        assert_eq!(value["error_class"], "not_found");
        assert_eq!(value["retryable"], false);
    }
}
