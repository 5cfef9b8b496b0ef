use super::order::{Address, Order, OrderItem};
use super::settings::SystemSetting;
use super::vendor::Vendor;
use super::wallet::Profile;
use serde::{Deserialize, Serialize};

/// Reference data and wallets imported into a store before triggers run.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Clone)]
pub struct Snapshot {
    #[serde(default)]
    pub settings: Vec<SystemSetting>,
    #[serde(default)]
    pub vendors: Vec<Vendor>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}
