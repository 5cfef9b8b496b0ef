//! Settlement steps run when a delivery completes.
//!
//! Each step is applied by a store as one atomic unit together with its
//! [`SettlementKey`], so a replayed step is detected instead of re-applied.

use super::money::Amount;
use super::wallet::{
    ConversionOutcome, LedgerEntry, Profile, ReferralConversion, WalletKind, WalletTransaction,
};
use crate::error::EngineError;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SettlementKind {
    Cashback,
    ReferralConversion,
}

impl fmt::Display for SettlementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cashback => f.write_str("cashback"),
            Self::ReferralConversion => f.write_str("referral_conversion"),
        }
    }
}

/// Uniqueness key for a settlement step: at most one per order and kind.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct SettlementKey {
    pub order_id: String,
    pub kind: SettlementKind,
}

impl SettlementKey {
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.order_id, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementStep {
    /// Credit cashback to the customer's reward wallet.
    Cashback {
        profile_id: String,
        order_id: String,
        amount: Amount,
    },
    /// Convert the referrer's reward balance into spendable balance.
    ReferralConversion {
        referrer_id: String,
        referred_id: String,
        order_id: String,
        order_value: Decimal,
        reward: Amount,
    },
}

/// What a step wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReceipt {
    pub transactions: Vec<WalletTransaction>,
    pub conversion: Option<ReferralConversion>,
}

/// Result of handing a step to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Applied(StepReceipt),
    /// The key was already recorded; nothing was written.
    AlreadySettled,
}

impl SettlementStep {
    pub fn key(&self) -> SettlementKey {
        match self {
            Self::Cashback { order_id, .. } => SettlementKey {
                order_id: order_id.clone(),
                kind: SettlementKind::Cashback,
            },
            Self::ReferralConversion { order_id, .. } => SettlementKey {
                order_id: order_id.clone(),
                kind: SettlementKind::ReferralConversion,
            },
        }
    }

    /// The profile whose balances this step changes.
    pub fn profile_id(&self) -> &str {
        match self {
            Self::Cashback { profile_id, .. } => profile_id,
            Self::ReferralConversion { referrer_id, .. } => referrer_id,
        }
    }

    /// Applies the step to `profile`.
    ///
    /// Stores call this on a working copy and persist the copy, the returned
    /// transactions, the conversion row and the key together, or nothing.
    pub fn apply(&self, profile: &mut Profile) -> Result<StepReceipt, EngineError> {
        if profile.id != self.profile_id() {
            return Err(EngineError::ValidationError(format!(
                "Settlement step for profile {} applied to profile {}",
                self.profile_id(),
                profile.id
            )));
        }

        match self {
            Self::Cashback {
                order_id, amount, ..
            } => {
                let entry = LedgerEntry::credit(
                    WalletKind::Reward,
                    *amount,
                    order_id,
                    format!("Cashback for order {order_id}"),
                );
                let tx = profile.apply_entry(&entry)?;
                Ok(StepReceipt {
                    transactions: vec![tx],
                    conversion: None,
                })
            }
            Self::ReferralConversion {
                referrer_id,
                referred_id,
                order_id,
                order_value,
                reward,
            } => {
                let outcome = ConversionOutcome::plan(*reward, profile.reward_balance);
                let mut transactions = Vec::with_capacity(2);

                if let Some(converted) = outcome.converted_amount() {
                    let description = format!("Referral reward conversion for order {order_id}");
                    transactions.push(profile.apply_entry(&LedgerEntry::debit(
                        WalletKind::Reward,
                        converted,
                        order_id,
                        description.clone(),
                    ))?);
                    transactions.push(profile.apply_entry(&LedgerEntry::credit(
                        WalletKind::Spendable,
                        converted,
                        order_id,
                        description,
                    ))?);
                }

                Ok(StepReceipt {
                    transactions,
                    conversion: Some(ReferralConversion {
                        id: Uuid::new_v4().to_string(),
                        referrer_id: referrer_id.clone(),
                        referred_id: referred_id.clone(),
                        order_id: order_id.clone(),
                        order_value: *order_value,
                        reward_amount: *reward,
                        outcome,
                        created_at: Utc::now(),
                    }),
                })
            }
        }
    }
}
