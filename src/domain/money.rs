use crate::error::EngineError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A wallet balance.
///
/// Wraps `rust_decimal::Decimal` so balances and transaction amounts cannot be
/// mixed up in ledger arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub Decimal);

/// A strictly positive monetary amount moved by a single ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, EngineError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EngineError::ValidationError(format!(
                "Amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// `value * pct / 100`, or `Ok(None)` when the result is not positive.
    ///
    /// A product outside the `Decimal` range is an input error.
    pub fn percentage(value: Decimal, pct: Decimal) -> Result<Option<Self>, EngineError> {
        let share = value
            .checked_mul(pct)
            .and_then(|product| product.checked_div(Decimal::ONE_HUNDRED))
            .ok_or_else(|| {
                EngineError::InvalidInput(format!("{pct}% of {value} is out of range"))
            })?;
        Ok(Self::new(share).ok())
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Balance {
    /// `None` when the sum leaves the `Decimal` range.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_arithmetic() {
        let b1 = Balance::new(dec!(10.0));
        let b2 = Balance::new(dec!(5.0));
        assert_eq!(b1.checked_add(b2), Some(Balance::new(dec!(15.0))));
        assert_eq!(b1.checked_sub(b2), Some(Balance::new(dec!(5.0))));
        assert_eq!(Balance::new(Decimal::MAX).checked_add(b2), None);
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(EngineError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(EngineError::ValidationError(_))
        ));
    }

    #[test]
    fn test_percentage() {
        assert_eq!(
            Amount::percentage(dec!(1000), dec!(5)).unwrap().map(|a| a.value()),
            Some(dec!(50))
        );
        assert_eq!(
            Amount::percentage(dec!(250), dec!(100)).unwrap().map(|a| a.value()),
            Some(dec!(250))
        );
        assert!(Amount::percentage(dec!(1000), dec!(0)).unwrap().is_none());
    }

    #[test]
    fn test_percentage_out_of_range() {
        assert!(matches!(
            Amount::percentage(Decimal::MAX, dec!(5)),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            Amount::percentage(Decimal::MAX, dec!(100)),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_amount_display_is_normalized() {
        let amount = Amount::new(dec!(30.00)).unwrap();
        assert_eq!(amount.to_string(), "30");
    }

    #[test]
    fn test_amount_rejects_non_positive_json() {
        assert!(serde_json::from_str::<Amount>("\"0\"").is_err());
        let amount: Amount = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(amount.value(), dec!(12.5));
    }
}
