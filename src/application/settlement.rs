use super::deadline::{notify_quietly, within};
use crate::config::EngineConfig;
use crate::domain::money::{Amount, Balance};
use crate::domain::notification::{Notification, NotificationKind, Priority, Role};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::ports::{NotifierRef, OrderStoreRef, SettingsSourceRef, WalletStoreRef};
use crate::domain::settings::EngineSettings;
use crate::domain::settlement::{SettlementStep, StepOutcome};
use crate::domain::wallet::{Profile, ReferralConversion, WalletKind};
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum CashbackResult {
    Credited {
        amount: Amount,
        balance_after: Balance,
    },
    AlreadySettled,
    /// The configured percentage produced nothing to credit.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReferralResult {
    Attempted(ReferralConversion),
    AlreadySettled { referrer_id: String },
    Skipped { referrer_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettlementOutcome {
    pub order_id: String,
    pub profile_id: String,
    pub cashback: CashbackResult,
    /// `None` when the customer has no referrer.
    pub referral: Option<ReferralResult>,
}

/// Credits cashback and converts referral rewards once a delivery completes.
///
/// The cashback step and the referral step are each atomic and keyed by
/// order, so a replay after a partial failure finishes the missing step and
/// leaves the finished one alone.
pub struct SettlementService {
    orders: OrderStoreRef,
    wallets: WalletStoreRef,
    settings: SettingsSourceRef,
    notifier: NotifierRef,
    config: EngineConfig,
}

impl SettlementService {
    pub fn new(
        orders: OrderStoreRef,
        wallets: WalletStoreRef,
        settings: SettingsSourceRef,
        notifier: NotifierRef,
        config: EngineConfig,
    ) -> Self {
        Self {
            orders,
            wallets,
            settings,
            notifier,
            config,
        }
    }

    #[instrument(skip_all, fields(order_id = %order_id, delivered_amount = %delivered_amount))]
    pub async fn settle(&self, order_id: &str, delivered_amount: Decimal) -> Result<SettlementOutcome> {
        if order_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("order_id is required".to_string()));
        }
        if delivered_amount <= Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "delivered_amount must be positive, got {delivered_amount}"
            )));
        }
        let limit = self.config.io_timeout;

        let order = within(limit, "order store", self.orders.get_order(order_id))
            .await?
            .ok_or_else(|| EngineError::not_found("order", order_id))?;
        if order.status != OrderStatus::Delivered {
            warn!(status = %order.status, "settling an order that is not marked delivered");
        }

        let rows = within(limit, "settings", self.settings.settings()).await?;
        let settings = EngineSettings::from_rows(&rows)?;

        let customer = within(
            limit,
            "wallet store",
            self.wallets.profile_for_user(&order.customer_id),
        )
        .await?
        .ok_or_else(|| EngineError::not_found("profile", &order.customer_id))?;

        let cashback = self
            .credit_cashback(&order, &customer, delivered_amount, &settings)
            .await?;

        let referral = match self.find_referrer(&customer).await? {
            Some(referrer) => Some(
                self.convert_referral(&order, &customer, &referrer, delivered_amount, &settings)
                    .await?,
            ),
            None => None,
        };

        Ok(SettlementOutcome {
            order_id: order.id,
            profile_id: customer.id,
            cashback,
            referral,
        })
    }

    async fn credit_cashback(
        &self,
        order: &Order,
        customer: &Profile,
        delivered_amount: Decimal,
        settings: &EngineSettings,
    ) -> Result<CashbackResult> {
        let Some(amount) = Amount::percentage(delivered_amount, settings.cashback_percentage)? else {
            info!(
                cashback_percentage = %settings.cashback_percentage,
                "no cashback to credit"
            );
            return Ok(CashbackResult::Skipped);
        };

        let step = SettlementStep::Cashback {
            profile_id: customer.id.clone(),
            order_id: order.id.clone(),
            amount,
        };
        let receipt = match self.apply(step).await? {
            StepOutcome::Applied(receipt) => receipt,
            StepOutcome::AlreadySettled => {
                info!("cashback already credited for this order");
                return Ok(CashbackResult::AlreadySettled);
            }
        };

        let balance_after = receipt
            .transactions
            .iter()
            .rev()
            .find(|tx| tx.wallet == WalletKind::Reward)
            .map(|tx| tx.balance_after)
            .ok_or_else(|| {
                EngineError::InternalError("cashback step wrote no reward transaction".into())
            })?;
        info!(profile_id = %customer.id, %amount, %balance_after, "cashback credited");

        self.notify(Notification {
            user_id: customer.user_id.clone(),
            role: Some(Role::Customer),
            kind: NotificationKind::CashbackCredited,
            title: "Cashback credited".to_string(),
            message: format!("{amount} cashback for order {} was added to your rewards", order.id),
            priority: Priority::Normal,
            entity_id: order.id.clone(),
            data: json!({
                "order_id": order.id,
                "amount": amount.value(),
                "reward_balance": balance_after.value(),
            }),
        })
        .await;

        Ok(CashbackResult::Credited {
            amount,
            balance_after,
        })
    }

    async fn find_referrer(&self, customer: &Profile) -> Result<Option<Profile>> {
        let Some(code) = customer.referred_by.as_deref() else {
            return Ok(None);
        };
        let referrer = within(
            self.config.io_timeout,
            "wallet store",
            self.wallets.profile_by_referral_code(code),
        )
        .await?;

        match referrer {
            Some(referrer) if referrer.id == customer.id => {
                warn!(referral_code = code, "profile refers itself, ignoring referral");
                Ok(None)
            }
            Some(referrer) => Ok(Some(referrer)),
            None => {
                warn!(referral_code = code, "referral code matches no profile");
                Ok(None)
            }
        }
    }

    async fn convert_referral(
        &self,
        order: &Order,
        customer: &Profile,
        referrer: &Profile,
        delivered_amount: Decimal,
        settings: &EngineSettings,
    ) -> Result<ReferralResult> {
        let referrer_id = referrer.id.clone();
        let Some(reward) = Amount::percentage(delivered_amount, settings.referral_percentage)? else {
            info!(
                referral_percentage = %settings.referral_percentage,
                "no referral reward to convert"
            );
            return Ok(ReferralResult::Skipped { referrer_id });
        };

        let step = SettlementStep::ReferralConversion {
            referrer_id: referrer.id.clone(),
            referred_id: customer.id.clone(),
            order_id: order.id.clone(),
            order_value: delivered_amount,
            reward,
        };
        let conversion = match self.apply(step).await? {
            StepOutcome::Applied(receipt) => receipt.conversion.ok_or_else(|| {
                EngineError::InternalError("referral step recorded no conversion".into())
            })?,
            StepOutcome::AlreadySettled => {
                info!(referrer_id = %referrer_id, "referral already settled for this order");
                return Ok(ReferralResult::AlreadySettled { referrer_id });
            }
        };

        match conversion.outcome.converted_amount() {
            Some(converted) => {
                info!(
                    referrer_id = %referrer_id,
                    %reward,
                    %converted,
                    converted_in_full = conversion.converted(),
                    "referral reward converted"
                );
                self.notify(Notification {
                    user_id: referrer.user_id.clone(),
                    role: Some(Role::Customer),
                    kind: NotificationKind::ReferralConverted,
                    title: "Referral reward unlocked".to_string(),
                    message: format!("{converted} moved from rewards to your spendable balance"),
                    priority: Priority::Normal,
                    entity_id: order.id.clone(),
                    data: json!({
                        "order_id": order.id,
                        "referred_id": customer.id,
                        "converted": converted.value(),
                        "reward_amount": reward.value(),
                    }),
                })
                .await;
            }
            None => {
                info!(
                    referrer_id = %referrer_id,
                    %reward,
                    reason = conversion.failure_reason().as_deref().unwrap_or_default(),
                    "referrer has no reward balance to convert"
                );
            }
        }

        Ok(ReferralResult::Attempted(conversion))
    }

    async fn apply(&self, step: SettlementStep) -> Result<StepOutcome> {
        within(
            self.config.io_timeout,
            "wallet store",
            self.wallets.apply_settlement(step),
        )
        .await
    }

    async fn notify(&self, notification: Notification) {
        notify_quietly(self.notifier.as_ref(), self.config.io_timeout, notification).await;
    }
}
