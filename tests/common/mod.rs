#![allow(dead_code)]

use async_trait::async_trait;
use dispatch_ledger::application::engine::{Collaborators, OrderEngine};
use dispatch_ledger::config::EngineConfig;
use dispatch_ledger::domain::money::Balance;
use dispatch_ledger::domain::notification::Notification;
use dispatch_ledger::domain::order::{
    Address, Delivery, DeliveryItem, DispatchAssignment, ItemStatus, Order, OrderItem, OrderStatus,
};
use dispatch_ledger::domain::ports::{Notifier, NotifierRef, OrderStore, WalletStore};
use dispatch_ledger::domain::settings::SystemSetting;
use dispatch_ledger::domain::settlement::{SettlementKind, SettlementStep, StepOutcome};
use dispatch_ledger::domain::vendor::Vendor;
use dispatch_ledger::domain::wallet::{Profile, ReferralConversion, WalletTransaction};
use dispatch_ledger::error::{EngineError, Result};
use dispatch_ledger::infrastructure::in_memory::InMemoryStore;
use dispatch_ledger::infrastructure::notifier::RecordingNotifier;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const CUSTOMER_LAT: f64 = 12.9716;
pub const CUSTOMER_LON: f64 = 77.5946;

/// Kilometres per degree of latitude on the haversine sphere.
const KM_PER_DEGREE: f64 = 6371.0 * std::f64::consts::PI / 180.0;

/// Latitude `km` kilometres due north of the customer.
pub fn north_of_customer(km: f64) -> f64 {
    CUSTOMER_LAT + km / KM_PER_DEGREE
}

pub fn vendor(id: &str, km_north: f64, service_radius_km: Option<f64>) -> Vendor {
    Vendor {
        id: id.to_string(),
        business_name: format!("Vendor {id}"),
        address: Some(format!("{id} Market Street")),
        latitude: Some(north_of_customer(km_north)),
        longitude: Some(CUSTOMER_LON),
        service_radius_km,
        active: true,
    }
}

pub fn customer_address(id: &str) -> Address {
    Address {
        id: id.to_string(),
        line: "12 MG Road".to_string(),
        city: "Bengaluru".to_string(),
        postal_code: Some("560001".to_string()),
        latitude: Some(CUSTOMER_LAT),
        longitude: Some(CUSTOMER_LON),
    }
}

pub fn address_without_coordinates(id: &str) -> Address {
    Address {
        latitude: None,
        longitude: None,
        ..customer_address(id)
    }
}

pub fn profile(id: &str, user_id: &str, reward: Decimal) -> Profile {
    Profile {
        reward_balance: Balance::new(reward),
        referral_code: Some(format!("CODE-{id}")),
        ..Profile::new(id, user_id)
    }
}

/// An in-memory store plus a recording notifier, wired into an engine on
/// demand.
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub notifier: RecordingNotifier,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            notifier: RecordingNotifier::new(),
        }
    }

    pub fn engine(&self) -> OrderEngine {
        self.engine_with(Arc::new(self.notifier.clone()), EngineConfig::default())
    }

    pub fn engine_with(&self, notifier: NotifierRef, config: EngineConfig) -> OrderEngine {
        OrderEngine::new(
            Collaborators::from_store(self.store.clone(), notifier),
            config,
        )
    }

    pub async fn setting(&self, key: &str, value: &str) {
        self.store.put_setting(SystemSetting::new(key, value)).await;
    }

    /// A placed order with one item, delivered to `address`.
    pub async fn place_order(&self, order_id: &str, customer_id: &str, address: Address) {
        self.put_order(order_id, customer_id, address, OrderStatus::Placed)
            .await;
    }

    pub async fn delivered_order(&self, order_id: &str, customer_id: &str) {
        self.put_order(
            order_id,
            customer_id,
            customer_address(&format!("addr-{order_id}")),
            OrderStatus::Delivered,
        )
        .await;
    }

    async fn put_order(
        &self,
        order_id: &str,
        customer_id: &str,
        address: Address,
        status: OrderStatus,
    ) {
        self.store
            .put_order(Order {
                id: order_id.to_string(),
                customer_id: customer_id.to_string(),
                total: dec!(250),
                address_id: address.id.clone(),
                status,
            })
            .await;
        self.store.put_address(address).await;
        self.store
            .put_order_item(OrderItem {
                id: format!("{order_id}-item-1"),
                order_id: order_id.to_string(),
                product_name: "Milk".to_string(),
                quantity: 2,
                unit_price: dec!(125),
                vendor_id: None,
                status: ItemStatus::Pending,
            })
            .await;
    }
}

/// A notifier whose every call fails.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: Notification) -> Result<()> {
        Err(EngineError::InternalError("push gateway unavailable".into()))
    }
}

/// A notifier that never answers in time.
pub struct StalledNotifier;

#[async_trait]
impl Notifier for StalledNotifier {
    async fn notify(&self, _notification: Notification) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

/// Wallet store that fails the first referral step it sees, as if the
/// process died between the cashback and referral writes.
pub struct CrashBeforeReferral {
    pub inner: Arc<InMemoryStore>,
    crashed: AtomicBool,
}

impl CrashBeforeReferral {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            crashed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl WalletStore for CrashBeforeReferral {
    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>> {
        self.inner.get_profile(profile_id).await
    }

    async fn profile_for_user(&self, user_id: &str) -> Result<Option<Profile>> {
        self.inner.profile_for_user(user_id).await
    }

    async fn profile_by_referral_code(&self, code: &str) -> Result<Option<Profile>> {
        self.inner.profile_by_referral_code(code).await
    }

    async fn apply_settlement(&self, step: SettlementStep) -> Result<StepOutcome> {
        if step.key().kind == SettlementKind::ReferralConversion
            && !self.crashed.swap(true, Ordering::SeqCst)
        {
            return Err(EngineError::InternalError("connection reset".into()));
        }
        self.inner.apply_settlement(step).await
    }

    async fn transactions(&self, profile_id: &str) -> Result<Vec<WalletTransaction>> {
        self.inner.transactions(profile_id).await
    }

    async fn referral_conversions(&self, order_id: &str) -> Result<Vec<ReferralConversion>> {
        self.inner.referral_conversions(order_id).await
    }
}

/// Wallet store whose writes hang.
pub struct StalledWallets {
    pub inner: Arc<InMemoryStore>,
}

#[async_trait]
impl WalletStore for StalledWallets {
    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>> {
        self.inner.get_profile(profile_id).await
    }

    async fn profile_for_user(&self, user_id: &str) -> Result<Option<Profile>> {
        self.inner.profile_for_user(user_id).await
    }

    async fn profile_by_referral_code(&self, code: &str) -> Result<Option<Profile>> {
        self.inner.profile_by_referral_code(code).await
    }

    async fn apply_settlement(&self, _step: SettlementStep) -> Result<StepOutcome> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(EngineError::InternalError("unreachable".into()))
    }

    async fn transactions(&self, profile_id: &str) -> Result<Vec<WalletTransaction>> {
        self.inner.transactions(profile_id).await
    }

    async fn referral_conversions(&self, order_id: &str) -> Result<Vec<ReferralConversion>> {
        self.inner.referral_conversions(order_id).await
    }
}

/// Order store whose conditional writes fail, as if the backend dropped the
/// connection mid-dispatch. Reads go through.
pub struct FailingOrderWrites {
    pub inner: Arc<InMemoryStore>,
}

#[async_trait]
impl OrderStore for FailingOrderWrites {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        self.inner.get_order(order_id).await
    }

    async fn get_address(&self, address_id: &str) -> Result<Option<Address>> {
        self.inner.get_address(address_id).await
    }

    async fn order_items(&self, order_id: &str) -> Result<Vec<OrderItem>> {
        self.inner.order_items(order_id).await
    }

    async fn delivery_for_order(&self, order_id: &str) -> Result<Option<Delivery>> {
        self.inner.delivery_for_order(order_id).await
    }

    async fn delivery_items(&self, delivery_id: &str) -> Result<Vec<DeliveryItem>> {
        self.inner.delivery_items(delivery_id).await
    }

    async fn mark_unfulfillable(&self, _order_id: &str) -> Result<bool> {
        Err(EngineError::InternalError("connection reset".into()))
    }

    async fn commit_dispatch(&self, _assignment: DispatchAssignment) -> Result<bool> {
        Err(EngineError::InternalError("connection reset".into()))
    }
}
