use crate::error::EngineError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const SERVICE_RADIUS_KEY: &str = "service_radius_km";
pub const CASHBACK_PERCENTAGE_KEY: &str = "cashback_percentage";
pub const REFERRAL_PERCENTAGE_KEY: &str = "referral_percentage";
pub const ASSIGNMENT_MODE_KEY: &str = "vendor_assignment_mode";

pub const DEFAULT_SERVICE_RADIUS_KM: f64 = 10.0;
pub const DEFAULT_CASHBACK_PERCENTAGE: Decimal = dec!(100);
pub const DEFAULT_REFERRAL_PERCENTAGE: Decimal = dec!(10);

/// A raw key/value configuration row.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct SystemSetting {
    pub key: String,
    pub value: String,
}

impl SystemSetting {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentMode {
    /// The engine picks the nearest vendor.
    #[default]
    Single,
    /// Operators assign vendors by hand.
    Multi,
}

impl FromStr for AssignmentMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "multi" => Ok(Self::Multi),
            other => Err(EngineError::Config(format!(
                "{ASSIGNMENT_MODE_KEY} must be 'single' or 'multi', got '{other}'"
            ))),
        }
    }
}

/// Typed view of the settings the engine reads.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub service_radius_km: f64,
    pub cashback_percentage: Decimal,
    pub referral_percentage: Decimal,
    pub assignment_mode: AssignmentMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            service_radius_km: DEFAULT_SERVICE_RADIUS_KM,
            cashback_percentage: DEFAULT_CASHBACK_PERCENTAGE,
            referral_percentage: DEFAULT_REFERRAL_PERCENTAGE,
            assignment_mode: AssignmentMode::default(),
        }
    }
}

impl EngineSettings {
    /// Builds settings from raw rows. Unknown keys are ignored, missing keys
    /// take their defaults, malformed values are rejected.
    pub fn from_rows(rows: &[SystemSetting]) -> Result<Self, EngineError> {
        let mut settings = Self::default();
        for row in rows {
            let value = row.value.trim();
            match row.key.as_str() {
                SERVICE_RADIUS_KEY => settings.service_radius_km = parse_radius(value)?,
                CASHBACK_PERCENTAGE_KEY => {
                    settings.cashback_percentage = parse_percentage(&row.key, value)?
                }
                REFERRAL_PERCENTAGE_KEY => {
                    settings.referral_percentage = parse_percentage(&row.key, value)?
                }
                ASSIGNMENT_MODE_KEY => settings.assignment_mode = value.parse()?,
                _ => {}
            }
        }
        Ok(settings)
    }
}

fn parse_radius(value: &str) -> Result<f64, EngineError> {
    let radius: f64 = value.parse().map_err(|_| {
        EngineError::Config(format!("{SERVICE_RADIUS_KEY} is not a number: '{value}'"))
    })?;
    if radius.is_finite() && radius > 0.0 {
        Ok(radius)
    } else {
        Err(EngineError::Config(format!(
            "{SERVICE_RADIUS_KEY} must be a positive distance, got {radius}"
        )))
    }
}

fn parse_percentage(key: &str, value: &str) -> Result<Decimal, EngineError> {
    let pct = Decimal::from_str(value)
        .map_err(|_| EngineError::Config(format!("{key} is not a number: '{value}'")))?;
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(EngineError::Config(format!(
            "{key} must be between 0 and 100, got {pct}"
        )));
    }
    Ok(pct)
}
