use super::geo::Coordinates;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Processing,
    Unfulfillable,
    Delivered,
    Canceled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Placed => "placed",
            Self::Processing => "processing",
            Self::Unfulfillable => "unfulfillable",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: String,
    /// User id of the customer who checked out.
    pub customer_id: String,
    pub total: Decimal,
    pub address_id: String,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Pending,
    Accepted,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub status: ItemStatus,
}

/// Customer delivery address. Coordinates may be missing.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Address {
    pub id: String,
    pub line: String,
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Address {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }

    pub fn formatted(&self) -> String {
        match &self.postal_code {
            Some(code) => format!("{}, {} {}", self.line, self.city, code),
            None => format!("{}, {}", self.line, self.city),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Assigned,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Delivery {
    pub id: String,
    pub order_id: String,
    pub vendor_id: String,
    pub pickup_address: String,
    pub delivery_address: String,
    pub otp: String,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct DeliveryItem {
    pub delivery_id: String,
    pub order_item_id: String,
}

/// Everything a successful dispatch writes, committed as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchAssignment {
    pub order_id: String,
    pub vendor_id: String,
    pub delivery: Delivery,
    pub items: Vec<DeliveryItem>,
}

impl DispatchAssignment {
    /// Assigns every item of the order to the delivery's vendor.
    pub fn new(delivery: Delivery, order_items: &[OrderItem]) -> Self {
        let items = order_items
            .iter()
            .map(|item| DeliveryItem {
                delivery_id: delivery.id.clone(),
                order_item_id: item.id.clone(),
            })
            .collect();
        Self {
            order_id: delivery.order_id.clone(),
            vendor_id: delivery.vendor_id.clone(),
            delivery,
            items,
        }
    }

    /// Applies the item-level side of the assignment.
    pub fn assign(&self, item: &mut OrderItem) {
        item.vendor_id = Some(self.vendor_id.clone());
        item.status = ItemStatus::Accepted;
    }
}

/// Why an order could not be matched to a vendor.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum UnfulfillableReason {
    MissingCoordinates,
    NoVendors,
    NoVendorsInRadius,
}

impl UnfulfillableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCoordinates => "missing_coordinates",
            Self::NoVendors => "no_vendors",
            Self::NoVendorsInRadius => "no_vendors_in_radius",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::MissingCoordinates => "Delivery address has no coordinates",
            Self::NoVendors => "No active vendors are registered",
            Self::NoVendorsInRadius => "No active vendor serves the delivery address",
        }
    }
}

impl fmt::Display for UnfulfillableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> OrderItem {
        OrderItem {
            id: id.to_string(),
            order_id: "o-1".to_string(),
            product_name: "Milk".to_string(),
            quantity: 2,
            unit_price: Decimal::ONE,
            vendor_id: None,
            status: ItemStatus::Pending,
        }
    }

    #[test]
    fn test_address_formatting() {
        let mut address = Address {
            id: "a-1".to_string(),
            line: "12 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            postal_code: Some("560001".to_string()),
            latitude: None,
            longitude: Some(77.6),
        };
        assert_eq!(address.formatted(), "12 MG Road, Bengaluru 560001");
        assert!(address.coordinates().is_none());

        address.postal_code = None;
        address.latitude = Some(12.97);
        assert_eq!(address.formatted(), "12 MG Road, Bengaluru");
        assert!(address.coordinates().is_some());
    }

    #[test]
    fn test_assignment_covers_every_item() {
        let delivery = Delivery {
            id: "d-1".to_string(),
            order_id: "o-1".to_string(),
            vendor_id: "v-1".to_string(),
            pickup_address: "Fresh Mart".to_string(),
            delivery_address: "12 MG Road".to_string(),
            otp: "123456".to_string(),
            status: DeliveryStatus::Assigned,
            created_at: Utc::now(),
        };
        let items = vec![item("i-1"), item("i-2")];
        let assignment = DispatchAssignment::new(delivery, &items);

        assert_eq!(assignment.items.len(), 2);
        assert!(assignment.items.iter().all(|i| i.delivery_id == "d-1"));

        let mut first = items[0].clone();
        assignment.assign(&mut first);
        assert_eq!(first.vendor_id.as_deref(), Some("v-1"));
        assert_eq!(first.status, ItemStatus::Accepted);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Unfulfillable).unwrap(),
            "\"unfulfillable\""
        );
        assert_eq!(
            serde_json::to_string(&UnfulfillableReason::NoVendorsInRadius).unwrap(),
            "\"no_vendors_in_radius\""
        );
    }
}
