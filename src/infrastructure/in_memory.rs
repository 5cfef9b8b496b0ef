use crate::domain::order::{
    Address, Delivery, DeliveryItem, DispatchAssignment, Order, OrderItem, OrderStatus,
};
use crate::domain::ports::{OrderStore, SeedStore, SettingsSource, VendorDirectory, WalletStore};
use crate::domain::settings::SystemSetting;
use crate::domain::settlement::{SettlementKey, SettlementStep, StepOutcome};
use crate::domain::snapshot::Snapshot;
use crate::domain::vendor::Vendor;
use crate::domain::wallet::{Profile, ReferralConversion, WalletTransaction};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Default)]
struct State {
    settings: BTreeMap<String, SystemSetting>,
    vendors: BTreeMap<String, Vendor>,
    addresses: BTreeMap<String, Address>,
    orders: BTreeMap<String, Order>,
    order_items: BTreeMap<String, OrderItem>,
    deliveries: BTreeMap<String, Delivery>,
    delivery_items: Vec<DeliveryItem>,
    profiles: BTreeMap<String, Profile>,
    transactions: Vec<WalletTransaction>,
    conversions: Vec<ReferralConversion>,
    settlements: HashSet<SettlementKey>,
}

/// A thread-safe in-memory backend implementing every port.
///
/// All entities sit behind one `RwLock`, so conditional transitions and
/// multi-row commits are atomic with respect to each other. Ideal for testing
/// or single-process runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_setting(&self, setting: SystemSetting) {
        let mut state = self.state.write().await;
        state.settings.insert(setting.key.clone(), setting);
    }

    pub async fn put_vendor(&self, vendor: Vendor) {
        let mut state = self.state.write().await;
        state.vendors.insert(vendor.id.clone(), vendor);
    }

    pub async fn put_address(&self, address: Address) {
        let mut state = self.state.write().await;
        state.addresses.insert(address.id.clone(), address);
    }

    pub async fn put_order(&self, order: Order) {
        let mut state = self.state.write().await;
        state.orders.insert(order.id.clone(), order);
    }

    pub async fn put_order_item(&self, item: OrderItem) {
        let mut state = self.state.write().await;
        state.order_items.insert(item.id.clone(), item);
    }

    pub async fn put_profile(&self, profile: Profile) {
        let mut state = self.state.write().await;
        state.profiles.insert(profile.id.clone(), profile);
    }

    /// Every delivery ever created, ordered by id.
    pub async fn deliveries(&self) -> Vec<Delivery> {
        let state = self.state.read().await;
        state.deliveries.values().cloned().collect()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(order_id).cloned())
    }

    async fn get_address(&self, address_id: &str) -> Result<Option<Address>> {
        let state = self.state.read().await;
        Ok(state.addresses.get(address_id).cloned())
    }

    async fn order_items(&self, order_id: &str) -> Result<Vec<OrderItem>> {
        let state = self.state.read().await;
        Ok(state
            .order_items
            .values()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn delivery_for_order(&self, order_id: &str) -> Result<Option<Delivery>> {
        let state = self.state.read().await;
        Ok(state
            .deliveries
            .values()
            .find(|delivery| delivery.order_id == order_id)
            .cloned())
    }

    async fn delivery_items(&self, delivery_id: &str) -> Result<Vec<DeliveryItem>> {
        let state = self.state.read().await;
        Ok(state
            .delivery_items
            .iter()
            .filter(|item| item.delivery_id == delivery_id)
            .cloned()
            .collect())
    }

    async fn mark_unfulfillable(&self, order_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| EngineError::not_found("order", order_id))?;
        if order.status != OrderStatus::Placed {
            return Ok(false);
        }
        order.status = OrderStatus::Unfulfillable;
        Ok(true)
    }

    async fn commit_dispatch(&self, assignment: DispatchAssignment) -> Result<bool> {
        let mut state = self.state.write().await;
        let status = state
            .orders
            .get(&assignment.order_id)
            .map(|order| order.status)
            .ok_or_else(|| EngineError::not_found("order", &assignment.order_id))?;
        let has_delivery = state
            .deliveries
            .values()
            .any(|delivery| delivery.order_id == assignment.order_id);
        if status != OrderStatus::Placed || has_delivery {
            return Ok(false);
        }

        for item in state.order_items.values_mut() {
            if item.order_id == assignment.order_id {
                assignment.assign(item);
            }
        }
        if let Some(order) = state.orders.get_mut(&assignment.order_id) {
            order.status = OrderStatus::Processing;
        }
        state.delivery_items.extend(assignment.items);
        state
            .deliveries
            .insert(assignment.delivery.id.clone(), assignment.delivery);
        Ok(true)
    }
}

#[async_trait]
impl VendorDirectory for InMemoryStore {
    async fn active_vendors(&self) -> Result<Vec<Vendor>> {
        let state = self.state.read().await;
        Ok(state
            .vendors
            .values()
            .filter(|vendor| vendor.active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SettingsSource for InMemoryStore {
    async fn settings(&self) -> Result<Vec<SystemSetting>> {
        let state = self.state.read().await;
        Ok(state.settings.values().cloned().collect())
    }
}

#[async_trait]
impl WalletStore for InMemoryStore {
    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>> {
        let state = self.state.read().await;
        Ok(state.profiles.get(profile_id).cloned())
    }

    async fn profile_for_user(&self, user_id: &str) -> Result<Option<Profile>> {
        let state = self.state.read().await;
        Ok(state
            .profiles
            .values()
            .find(|profile| profile.user_id == user_id)
            .cloned())
    }

    async fn profile_by_referral_code(&self, code: &str) -> Result<Option<Profile>> {
        let state = self.state.read().await;
        Ok(state
            .profiles
            .values()
            .find(|profile| profile.referral_code.as_deref() == Some(code))
            .cloned())
    }

    async fn apply_settlement(&self, step: SettlementStep) -> Result<StepOutcome> {
        let mut state = self.state.write().await;
        let key = step.key();
        if state.settlements.contains(&key) {
            return Ok(StepOutcome::AlreadySettled);
        }

        let mut profile = state
            .profiles
            .get(step.profile_id())
            .cloned()
            .ok_or_else(|| EngineError::not_found("profile", step.profile_id()))?;
        let receipt = step.apply(&mut profile)?;

        state.profiles.insert(profile.id.clone(), profile);
        state.transactions.extend(receipt.transactions.iter().cloned());
        if let Some(conversion) = &receipt.conversion {
            state.conversions.push(conversion.clone());
        }
        state.settlements.insert(key);
        Ok(StepOutcome::Applied(receipt))
    }

    async fn transactions(&self, profile_id: &str) -> Result<Vec<WalletTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .filter(|tx| tx.profile_id == profile_id)
            .cloned()
            .collect())
    }

    async fn referral_conversions(&self, order_id: &str) -> Result<Vec<ReferralConversion>> {
        let state = self.state.read().await;
        Ok(state
            .conversions
            .iter()
            .filter(|conversion| conversion.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SeedStore for InMemoryStore {
    async fn seed(&self, snapshot: Snapshot) -> Result<()> {
        let mut state = self.state.write().await;
        let mut skipped = 0usize;
        for setting in snapshot.settings {
            skipped += insert_new(&mut state.settings, setting.key.clone(), setting);
        }
        for vendor in snapshot.vendors {
            skipped += insert_new(&mut state.vendors, vendor.id.clone(), vendor);
        }
        for address in snapshot.addresses {
            skipped += insert_new(&mut state.addresses, address.id.clone(), address);
        }
        for order in snapshot.orders {
            skipped += insert_new(&mut state.orders, order.id.clone(), order);
        }
        for item in snapshot.order_items {
            skipped += insert_new(&mut state.order_items, item.id.clone(), item);
        }
        for profile in snapshot.profiles {
            skipped += insert_new(&mut state.profiles, profile.id.clone(), profile);
        }
        if skipped > 0 {
            warn!(skipped, "seed rows already present were left untouched");
        }
        Ok(())
    }
}

/// Inserts `value` unless `key` is taken. Returns 1 when the row was skipped.
fn insert_new<V>(map: &mut BTreeMap<String, V>, key: String, value: V) -> usize {
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(value);
            0
        }
        Entry::Occupied(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::{Amount, Balance};
    use crate::domain::order::{DeliveryStatus, ItemStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn placed_order() -> Order {
        Order {
            id: "o-1".to_string(),
            customer_id: "u-1".to_string(),
            total: dec!(250),
            address_id: "a-1".to_string(),
            status: OrderStatus::Placed,
        }
    }

    fn item(id: &str) -> OrderItem {
        OrderItem {
            id: id.to_string(),
            order_id: "o-1".to_string(),
            product_name: "Bread".to_string(),
            quantity: 1,
            unit_price: dec!(125),
            vendor_id: None,
            status: ItemStatus::Pending,
        }
    }

    fn assignment(delivery_id: &str, items: &[OrderItem]) -> DispatchAssignment {
        DispatchAssignment::new(
            Delivery {
                id: delivery_id.to_string(),
                order_id: "o-1".to_string(),
                vendor_id: "v-1".to_string(),
                pickup_address: "Fresh Mart".to_string(),
                delivery_address: "12 MG Road, Bengaluru".to_string(),
                otp: "482913".to_string(),
                status: DeliveryStatus::Assigned,
                created_at: Utc::now(),
            },
            items,
        )
    }

    #[tokio::test]
    async fn test_commit_dispatch_is_conditional() {
        let store = InMemoryStore::new();
        store.put_order(placed_order()).await;
        let items = vec![item("i-1"), item("i-2")];
        for i in &items {
            store.put_order_item(i.clone()).await;
        }

        assert!(store.commit_dispatch(assignment("d-1", &items)).await.unwrap());
        assert!(!store.commit_dispatch(assignment("d-2", &items)).await.unwrap());

        let order = store.get_order("o-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(store.deliveries().await.len(), 1);
        assert_eq!(store.delivery_items("d-1").await.unwrap().len(), 2);
        for stored in store.order_items("o-1").await.unwrap() {
            assert_eq!(stored.vendor_id.as_deref(), Some("v-1"));
            assert_eq!(stored.status, ItemStatus::Accepted);
        }
    }

    #[tokio::test]
    async fn test_mark_unfulfillable_only_from_placed() {
        let store = InMemoryStore::new();
        store.put_order(placed_order()).await;

        assert!(store.mark_unfulfillable("o-1").await.unwrap());
        assert!(!store.mark_unfulfillable("o-1").await.unwrap());
        assert!(matches!(
            store.mark_unfulfillable("missing").await,
            Err(EngineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_active_vendors_excludes_inactive() {
        let store = InMemoryStore::new();
        for (id, active) in [("v-2", true), ("v-1", true), ("v-3", false)] {
            store
                .put_vendor(Vendor {
                    id: id.to_string(),
                    business_name: id.to_string(),
                    address: None,
                    latitude: Some(0.0),
                    longitude: Some(0.0),
                    service_radius_km: None,
                    active,
                })
                .await;
        }

        let ids: Vec<_> = store
            .active_vendors()
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec!["v-1", "v-2"]);
    }

    #[tokio::test]
    async fn test_settlement_key_blocks_replay() {
        let store = InMemoryStore::new();
        store.put_profile(Profile::new("p-1", "u-1")).await;
        let step = SettlementStep::Cashback {
            profile_id: "p-1".to_string(),
            order_id: "o-1".to_string(),
            amount: Amount::new(dec!(40)).unwrap(),
        };

        assert!(matches!(
            store.apply_settlement(step.clone()).await.unwrap(),
            StepOutcome::Applied(_)
        ));
        assert_eq!(
            store.apply_settlement(step).await.unwrap(),
            StepOutcome::AlreadySettled
        );

        let profile = store.get_profile("p-1").await.unwrap().unwrap();
        assert_eq!(profile.reward_balance, Balance::new(dec!(40)));
        assert_eq!(store.transactions("p-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_step_writes_nothing() {
        let store = InMemoryStore::new();
        store.put_profile(Profile::new("p-1", "u-1")).await;
        let step = SettlementStep::Cashback {
            profile_id: "p-2".to_string(),
            order_id: "o-1".to_string(),
            amount: Amount::new(dec!(40)).unwrap(),
        };

        assert!(store.apply_settlement(step.clone()).await.is_err());
        assert!(store.transactions("p-2").await.unwrap().is_empty());

        // The key was not consumed by the failed attempt.
        store.put_profile(Profile::new("p-2", "u-2")).await;
        assert!(matches!(
            store.apply_settlement(step).await.unwrap(),
            StepOutcome::Applied(_)
        ));
    }

    #[tokio::test]
    async fn test_profile_lookups() {
        let store = InMemoryStore::new();
        let mut referrer = Profile::new("p-1", "u-1");
        referrer.referral_code = Some("FRESH10".to_string());
        store.put_profile(referrer).await;

        assert_eq!(
            store.profile_for_user("u-1").await.unwrap().map(|p| p.id),
            Some("p-1".to_string())
        );
        assert_eq!(
            store
                .profile_by_referral_code("FRESH10")
                .await
                .unwrap()
                .map(|p| p.id),
            Some("p-1".to_string())
        );
        assert!(store.profile_by_referral_code("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reseed_keeps_existing_rows() {
        let store = InMemoryStore::new();
        let snapshot = Snapshot {
            orders: vec![placed_order()],
            order_items: vec![item("i-1")],
            profiles: vec![Profile::new("p-1", "u-1")],
            ..Snapshot::default()
        };
        store.seed(snapshot.clone()).await.unwrap();

        let items = store.order_items("o-1").await.unwrap();
        assert!(store.commit_dispatch(assignment("d-1", &items)).await.unwrap());
        let step = SettlementStep::Cashback {
            profile_id: "p-1".to_string(),
            order_id: "o-1".to_string(),
            amount: Amount::new(dec!(40)).unwrap(),
        };
        store.apply_settlement(step).await.unwrap();

        store.seed(snapshot).await.unwrap();

        let order = store.get_order("o-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        let items = store.order_items("o-1").await.unwrap();
        assert_eq!(items[0].vendor_id.as_deref(), Some("v-1"));
        let profile = store.get_profile("p-1").await.unwrap().unwrap();
        assert_eq!(profile.reward_balance, Balance::new(dec!(40)));
        let txs = store.transactions("p-1").await.unwrap();
        assert_eq!(txs.last().map(|tx| tx.balance_after), Some(profile.reward_balance));
    }
}
