use super::money::{Amount, Balance};
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    /// Earned through cashback and referrals; not directly spendable.
    Reward,
    Spendable,
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reward => f.write_str("reward"),
            Self::Spendable => f.write_str("spendable"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

/// A customer's wallet.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub reward_balance: Balance,
    #[serde(default)]
    pub spendable_balance: Balance,
    /// Code other customers enter to name this profile as their referrer.
    #[serde(default)]
    pub referral_code: Option<String>,
    /// Referral code of the profile that referred this one.
    #[serde(default)]
    pub referred_by: Option<String>,
}

/// A single balance change requested of the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub wallet: WalletKind,
    pub direction: Direction,
    pub amount: Amount,
    pub order_id: String,
    pub description: String,
}

impl LedgerEntry {
    pub fn credit(wallet: WalletKind, amount: Amount, order_id: &str, description: String) -> Self {
        Self {
            wallet,
            direction: Direction::Credit,
            amount,
            order_id: order_id.to_string(),
            description,
        }
    }

    pub fn debit(wallet: WalletKind, amount: Amount, order_id: &str, description: String) -> Self {
        Self {
            wallet,
            direction: Direction::Debit,
            amount,
            order_id: order_id.to_string(),
            description,
        }
    }
}

/// Append-only audit row for one balance change.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct WalletTransaction {
    pub id: String,
    pub profile_id: String,
    pub direction: Direction,
    pub wallet: WalletKind,
    pub amount: Amount,
    /// Balance of `wallet` right after this entry was applied.
    pub balance_after: Balance,
    pub order_id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            reward_balance: Balance::ZERO,
            spendable_balance: Balance::ZERO,
            referral_code: None,
            referred_by: None,
        }
    }

    pub fn balance(&self, wallet: WalletKind) -> Balance {
        match wallet {
            WalletKind::Reward => self.reward_balance,
            WalletKind::Spendable => self.spendable_balance,
        }
    }

    fn balance_mut(&mut self, wallet: WalletKind) -> &mut Balance {
        match wallet {
            WalletKind::Reward => &mut self.reward_balance,
            WalletKind::Spendable => &mut self.spendable_balance,
        }
    }

    /// Applies one entry and returns the audit row describing it.
    ///
    /// Debits that would take the wallet below zero are rejected and leave the
    /// profile untouched.
    pub fn apply_entry(&mut self, entry: &LedgerEntry) -> Result<WalletTransaction, EngineError> {
        let profile_id = self.id.clone();
        let balance = self.balance_mut(entry.wallet);
        let amount = Balance::from(entry.amount);

        let updated = match entry.direction {
            Direction::Credit => balance.checked_add(amount),
            Direction::Debit => {
                if *balance < amount {
                    return Err(EngineError::ValidationError(format!(
                        "Insufficient {} balance on profile {}: required={}, available={}",
                        entry.wallet, profile_id, entry.amount, balance
                    )));
                }
                balance.checked_sub(amount)
            }
        };
        *balance = updated.ok_or_else(|| {
            EngineError::ValidationError(format!(
                "{:?} of {} leaves the {} balance of profile {} out of range",
                entry.direction, entry.amount, entry.wallet, profile_id
            ))
        })?;

        Ok(WalletTransaction {
            id: Uuid::new_v4().to_string(),
            profile_id,
            direction: entry.direction,
            wallet: entry.wallet,
            amount: entry.amount,
            balance_after: *balance,
            order_id: entry.order_id.clone(),
            description: entry.description.clone(),
            created_at: Utc::now(),
        })
    }
}

/// Result of trying to convert a referral reward into spendable balance.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConversionOutcome {
    /// The whole reward was converted.
    Full { converted: Amount },
    /// Only the available reward balance was converted.
    Partial {
        converted: Amount,
        required: Amount,
        available: Balance,
    },
    /// Nothing was available to convert.
    None { required: Amount, available: Balance },
}

impl ConversionOutcome {
    /// Decides how much of `required` can be converted out of `available`.
    pub fn plan(required: Amount, available: Balance) -> Self {
        if available >= Balance::from(required) {
            Self::Full {
                converted: required,
            }
        } else {
            match Amount::new(available.value()) {
                Ok(converted) => Self::Partial {
                    converted,
                    required,
                    available,
                },
                Err(_) => Self::None {
                    required,
                    available,
                },
            }
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Self::Full { .. })
    }

    pub fn converted_amount(&self) -> Option<Amount> {
        match self {
            Self::Full { converted } | Self::Partial { converted, .. } => Some(*converted),
            Self::None { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Full { .. } => None,
            Self::Partial {
                converted,
                required,
                available,
            } => Some(format!(
                "Insufficient reward balance: required={required}, available={available}; partially converted {converted}"
            )),
            Self::None {
                required,
                available,
            } => Some(format!(
                "Insufficient reward balance: required={required}, available={available}; nothing converted"
            )),
        }
    }
}

/// Durable record of one referral conversion attempt.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ReferralConversion {
    pub id: String,
    pub referrer_id: String,
    pub referred_id: String,
    pub order_id: String,
    pub order_value: Decimal,
    pub reward_amount: Amount,
    pub outcome: ConversionOutcome,
    pub created_at: DateTime<Utc>,
}

impl ReferralConversion {
    pub fn converted(&self) -> bool {
        self.outcome.is_converted()
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.outcome.failure_reason()
    }
}
