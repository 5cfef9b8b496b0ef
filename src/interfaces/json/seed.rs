use crate::domain::settings::EngineSettings;
use crate::domain::snapshot::Snapshot;
use crate::error::{EngineError, Result};
use std::collections::HashSet;
use std::io::Read;

/// Separator stores use to build child keys such as `{order_id}/{item_id}`.
pub const KEY_SEPARATOR: char = '/';

/// Reads a JSON snapshot and checks that its ids and references line up.
pub fn read_snapshot<R: Read>(source: R) -> Result<Snapshot> {
    let snapshot: Snapshot = serde_json::from_reader(source)?;
    validate(&snapshot)?;
    Ok(snapshot)
}

fn validate(snapshot: &Snapshot) -> Result<()> {
    EngineSettings::from_rows(&snapshot.settings)?;

    check_ids("vendor", snapshot.vendors.iter().map(|v| v.id.as_str()))?;
    check_ids("address", snapshot.addresses.iter().map(|a| a.id.as_str()))?;
    check_ids("order", snapshot.orders.iter().map(|o| o.id.as_str()))?;
    check_ids("order item", snapshot.order_items.iter().map(|i| i.id.as_str()))?;
    check_ids("profile", snapshot.profiles.iter().map(|p| p.id.as_str()))?;

    let addresses: HashSet<&str> = snapshot.addresses.iter().map(|a| a.id.as_str()).collect();
    for order in &snapshot.orders {
        if !addresses.contains(order.address_id.as_str()) {
            return Err(EngineError::Config(format!(
                "order {} references unknown address {}",
                order.id, order.address_id
            )));
        }
    }

    let orders: HashSet<&str> = snapshot.orders.iter().map(|o| o.id.as_str()).collect();
    for item in &snapshot.order_items {
        if !orders.contains(item.order_id.as_str()) {
            return Err(EngineError::Config(format!(
                "order item {} references unknown order {}",
                item.id, item.order_id
            )));
        }
    }

    let mut codes = HashSet::new();
    for profile in &snapshot.profiles {
        if let Some(code) = profile.referral_code.as_deref()
            && !codes.insert(code)
        {
            return Err(EngineError::Config(format!(
                "referral code {code} is used by more than one profile"
            )));
        }
    }
    Ok(())
}

/// Ids must be non-empty, unique within their entity and free of the key
/// separator.
fn check_ids<'a>(entity: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() || id.contains(KEY_SEPARATOR) {
            return Err(EngineError::Config(format!(
                "{entity} id '{id}' must be non-empty and must not contain '{KEY_SEPARATOR}'"
            )));
        }
        if !seen.insert(id) {
            return Err(EngineError::Config(format!(
                "{entity} id {id} is used more than once"
            )));
        }
    }
    Ok(())
}
