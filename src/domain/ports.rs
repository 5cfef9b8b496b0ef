use super::notification::Notification;
use super::order::{Address, Delivery, DeliveryItem, DispatchAssignment, Order, OrderItem};
use super::settings::SystemSetting;
use super::settlement::{SettlementStep, StepOutcome};
use super::snapshot::Snapshot;
use super::vendor::Vendor;
use super::wallet::{Profile, ReferralConversion, WalletTransaction};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>>;
    async fn get_address(&self, address_id: &str) -> Result<Option<Address>>;
    async fn order_items(&self, order_id: &str) -> Result<Vec<OrderItem>>;
    async fn delivery_for_order(&self, order_id: &str) -> Result<Option<Delivery>>;
    async fn delivery_items(&self, delivery_id: &str) -> Result<Vec<DeliveryItem>>;

    /// Moves the order from `placed` to `unfulfillable`.
    ///
    /// Returns `false` without writing when the order is no longer `placed`.
    async fn mark_unfulfillable(&self, order_id: &str) -> Result<bool>;

    /// Moves the order from `placed` to `processing`, assigns its items and
    /// inserts the delivery with its items, all or nothing.
    ///
    /// Returns `false` without writing when the order is no longer `placed`
    /// or already has a delivery.
    async fn commit_dispatch(&self, assignment: DispatchAssignment) -> Result<bool>;
}

/// Read-only listing of vendors.
#[async_trait]
pub trait VendorDirectory: Send + Sync {
    async fn active_vendors(&self) -> Result<Vec<Vendor>>;
}

/// Read-only key/value settings.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn settings(&self) -> Result<Vec<SystemSetting>>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>>;
    async fn profile_for_user(&self, user_id: &str) -> Result<Option<Profile>>;
    async fn profile_by_referral_code(&self, code: &str) -> Result<Option<Profile>>;

    /// Applies a settlement step atomically with its settlement key.
    ///
    /// A key that was already recorded yields `StepOutcome::AlreadySettled`
    /// and no writes.
    async fn apply_settlement(&self, step: SettlementStep) -> Result<StepOutcome>;

    async fn transactions(&self, profile_id: &str) -> Result<Vec<WalletTransaction>>;
    async fn referral_conversions(&self, order_id: &str) -> Result<Vec<ReferralConversion>>;
}

/// Fire-and-forget delivery of notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<()>;
}

/// Bulk import used when bootstrapping a store.
///
/// Insert-only: a row whose key already exists is left as it is, so
/// reseeding a live store never resets balances or order progress.
#[async_trait]
pub trait SeedStore: Send + Sync {
    async fn seed(&self, snapshot: Snapshot) -> Result<()>;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type VendorDirectoryRef = Arc<dyn VendorDirectory>;
pub type SettingsSourceRef = Arc<dyn SettingsSource>;
pub type WalletStoreRef = Arc<dyn WalletStore>;
pub type NotifierRef = Arc<dyn Notifier>;
