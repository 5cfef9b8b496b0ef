use crate::domain::order::{
    Address, Delivery, DeliveryItem, DispatchAssignment, Order, OrderItem, OrderStatus,
};
use crate::domain::ports::{OrderStore, SeedStore, SettingsSource, VendorDirectory, WalletStore};
use crate::domain::settings::SystemSetting;
use crate::domain::settlement::{SettlementStep, StepOutcome};
use crate::domain::snapshot::Snapshot;
use crate::domain::vendor::Vendor;
use crate::domain::wallet::{Profile, ReferralConversion, WalletTransaction};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

pub const CF_SETTINGS: &str = "settings";
pub const CF_VENDORS: &str = "vendors";
pub const CF_ADDRESSES: &str = "addresses";
pub const CF_ORDERS: &str = "orders";
/// Keyed by `{order_id}/{item_id}`.
pub const CF_ORDER_ITEMS: &str = "order_items";
/// Keyed by order id, which enforces one delivery per order.
pub const CF_DELIVERIES: &str = "deliveries";
/// Keyed by `{delivery_id}/{order_item_id}`.
pub const CF_DELIVERY_ITEMS: &str = "delivery_items";
pub const CF_PROFILES: &str = "profiles";
/// User id to profile id.
pub const CF_PROFILES_BY_USER: &str = "profiles_by_user";
/// Referral code to profile id.
pub const CF_PROFILES_BY_REFERRAL_CODE: &str = "profiles_by_referral_code";
/// Keyed by `{profile_id}/{created_at_nanos}/{id}`.
pub const CF_WALLET_TRANSACTIONS: &str = "wallet_transactions";
/// Keyed by `{order_id}/{id}`.
pub const CF_REFERRAL_CONVERSIONS: &str = "referral_conversions";
/// Keyed by `{order_id}/{settlement_kind}`.
pub const CF_SETTLEMENTS: &str = "settlements";

const COLUMN_FAMILIES: [&str; 13] = [
    CF_SETTINGS,
    CF_VENDORS,
    CF_ADDRESSES,
    CF_ORDERS,
    CF_ORDER_ITEMS,
    CF_DELIVERIES,
    CF_DELIVERY_ITEMS,
    CF_PROFILES,
    CF_PROFILES_BY_USER,
    CF_PROFILES_BY_REFERRAL_CODE,
    CF_WALLET_TRANSACTIONS,
    CF_REFERRAL_CONVERSIONS,
    CF_SETTLEMENTS,
];

/// A persistent store implementation using RocksDB.
///
/// Each entity lives in its own column family as JSON. Multi-row commits go
/// through a single `WriteBatch`, and conditional writes hold `write_lock` so
/// the read-check-write sequence cannot interleave with another writer.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column family.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EngineError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &'static str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn exists(&self, cf_name: &'static str, key: &str) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        Ok(self.db.get_pinned_cf(cf, key.as_bytes())?.is_some())
    }

    /// Values whose key starts with `prefix`, in key order. An empty prefix
    /// scans the whole column family.
    fn scan_json<T: DeserializeOwned>(&self, cf_name: &'static str, prefix: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mode = IteratorMode::From(prefix.as_bytes(), Direction::Forward);
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &'static str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(cf, key.as_bytes(), serde_json::to_vec(value)?);
        Ok(())
    }

    /// Follows a secondary index entry to the profile it names.
    fn indexed_profile(&self, index: &'static str, key: &str) -> Result<Option<Profile>> {
        match self.get_json::<String>(index, key)? {
            Some(profile_id) => self.get_json(CF_PROFILES, &profile_id),
            None => Ok(None),
        }
    }

    /// Queues `value` under `key` unless the key is already stored. Returns 1
    /// when the row was skipped.
    fn put_new<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &'static str,
        key: &str,
        value: &T,
    ) -> Result<usize> {
        if self.exists(cf_name, key)? {
            return Ok(1);
        }
        self.put_json(batch, cf_name, key, value)?;
        Ok(0)
    }
}

fn prefix(id: &str) -> String {
    format!("{id}/")
}

fn transaction_key(tx: &WalletTransaction) -> String {
    let nanos = tx.created_at.timestamp_nanos_opt().unwrap_or_default();
    format!("{}/{:020}/{}", tx.profile_id, nanos, tx.id)
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, order_id)
    }

    async fn get_address(&self, address_id: &str) -> Result<Option<Address>> {
        self.get_json(CF_ADDRESSES, address_id)
    }

    async fn order_items(&self, order_id: &str) -> Result<Vec<OrderItem>> {
        self.scan_json(CF_ORDER_ITEMS, &prefix(order_id))
    }

    async fn delivery_for_order(&self, order_id: &str) -> Result<Option<Delivery>> {
        self.get_json(CF_DELIVERIES, order_id)
    }

    async fn delivery_items(&self, delivery_id: &str) -> Result<Vec<DeliveryItem>> {
        self.scan_json(CF_DELIVERY_ITEMS, &prefix(delivery_id))
    }

    async fn mark_unfulfillable(&self, order_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut order: Order = self
            .get_json(CF_ORDERS, order_id)?
            .ok_or_else(|| EngineError::not_found("order", order_id))?;
        if order.status != OrderStatus::Placed {
            return Ok(false);
        }
        order.status = OrderStatus::Unfulfillable;

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ORDERS, order_id, &order)?;
        self.db.write(batch)?;
        Ok(true)
    }

    async fn commit_dispatch(&self, assignment: DispatchAssignment) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let order_id = assignment.order_id.as_str();
        let mut order: Order = self
            .get_json(CF_ORDERS, order_id)?
            .ok_or_else(|| EngineError::not_found("order", order_id))?;
        if order.status != OrderStatus::Placed || self.exists(CF_DELIVERIES, order_id)? {
            return Ok(false);
        }
        order.status = OrderStatus::Processing;

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ORDERS, order_id, &order)?;
        for mut item in self.scan_json::<OrderItem>(CF_ORDER_ITEMS, &prefix(order_id))? {
            assignment.assign(&mut item);
            let key = format!("{order_id}/{}", item.id);
            self.put_json(&mut batch, CF_ORDER_ITEMS, &key, &item)?;
        }
        self.put_json(&mut batch, CF_DELIVERIES, order_id, &assignment.delivery)?;
        for item in &assignment.items {
            let key = format!("{}/{}", item.delivery_id, item.order_item_id);
            self.put_json(&mut batch, CF_DELIVERY_ITEMS, &key, item)?;
        }
        self.db.write(batch)?;
        Ok(true)
    }
}

#[async_trait]
impl VendorDirectory for RocksDBStore {
    async fn active_vendors(&self) -> Result<Vec<Vendor>> {
        Ok(self
            .scan_json::<Vendor>(CF_VENDORS, "")?
            .into_iter()
            .filter(|vendor| vendor.active)
            .collect())
    }
}

#[async_trait]
impl SettingsSource for RocksDBStore {
    async fn settings(&self) -> Result<Vec<SystemSetting>> {
        self.scan_json(CF_SETTINGS, "")
    }
}

#[async_trait]
impl WalletStore for RocksDBStore {
    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>> {
        self.get_json(CF_PROFILES, profile_id)
    }

    async fn profile_for_user(&self, user_id: &str) -> Result<Option<Profile>> {
        self.indexed_profile(CF_PROFILES_BY_USER, user_id)
    }

    async fn profile_by_referral_code(&self, code: &str) -> Result<Option<Profile>> {
        self.indexed_profile(CF_PROFILES_BY_REFERRAL_CODE, code)
    }

    async fn apply_settlement(&self, step: SettlementStep) -> Result<StepOutcome> {
        let _guard = self.write_lock.lock().await;
        let key = step.key().storage_key();
        if self.exists(CF_SETTLEMENTS, &key)? {
            return Ok(StepOutcome::AlreadySettled);
        }

        let mut profile: Profile = self
            .get_json(CF_PROFILES, step.profile_id())?
            .ok_or_else(|| EngineError::not_found("profile", step.profile_id()))?;
        let receipt = step.apply(&mut profile)?;

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_PROFILES, &profile.id, &profile)?;
        for tx in &receipt.transactions {
            self.put_json(&mut batch, CF_WALLET_TRANSACTIONS, &transaction_key(tx), tx)?;
        }
        if let Some(conversion) = &receipt.conversion {
            let conversion_key = format!("{}/{}", conversion.order_id, conversion.id);
            self.put_json(&mut batch, CF_REFERRAL_CONVERSIONS, &conversion_key, conversion)?;
        }
        self.put_json(&mut batch, CF_SETTLEMENTS, &key, &step.key())?;
        self.db.write(batch)?;

        Ok(StepOutcome::Applied(receipt))
    }

    async fn transactions(&self, profile_id: &str) -> Result<Vec<WalletTransaction>> {
        self.scan_json(CF_WALLET_TRANSACTIONS, &prefix(profile_id))
    }

    async fn referral_conversions(&self, order_id: &str) -> Result<Vec<ReferralConversion>> {
        self.scan_json(CF_REFERRAL_CONVERSIONS, &prefix(order_id))
    }
}

#[async_trait]
impl SeedStore for RocksDBStore {
    async fn seed(&self, snapshot: Snapshot) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let mut skipped = 0usize;
        for setting in &snapshot.settings {
            skipped += self.put_new(&mut batch, CF_SETTINGS, &setting.key, setting)?;
        }
        for vendor in &snapshot.vendors {
            skipped += self.put_new(&mut batch, CF_VENDORS, &vendor.id, vendor)?;
        }
        for address in &snapshot.addresses {
            skipped += self.put_new(&mut batch, CF_ADDRESSES, &address.id, address)?;
        }
        for order in &snapshot.orders {
            skipped += self.put_new(&mut batch, CF_ORDERS, &order.id, order)?;
        }
        for item in &snapshot.order_items {
            let key = format!("{}/{}", item.order_id, item.id);
            skipped += self.put_new(&mut batch, CF_ORDER_ITEMS, &key, item)?;
        }
        for profile in &snapshot.profiles {
            if self.put_new(&mut batch, CF_PROFILES, &profile.id, profile)? > 0 {
                skipped += 1;
                continue;
            }
            self.put_json(&mut batch, CF_PROFILES_BY_USER, &profile.user_id, &profile.id)?;
            if let Some(code) = &profile.referral_code {
                self.put_json(&mut batch, CF_PROFILES_BY_REFERRAL_CODE, code, &profile.id)?;
            }
        }
        self.db.write(batch)?;
        if skipped > 0 {
            warn!(skipped, "seed rows already present were left untouched");
        }
        Ok(())
    }
}
