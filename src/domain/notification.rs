use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Vendor,
    Customer,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderUnfulfillable,
    OrderAssigned,
    CashbackCredited,
    ReferralConverted,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    High,
}

/// Payload handed to the notification collaborator.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Notification {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub entity_id: String,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let notification = Notification {
            user_id: "operations".to_string(),
            role: Some(Role::Admin),
            kind: NotificationKind::OrderUnfulfillable,
            title: "Order cannot be fulfilled".to_string(),
            message: "No vendors".to_string(),
            priority: Priority::High,
            entity_id: "o-1".to_string(),
            data: json!({ "reason": "no_vendors" }),
        };

        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "order_unfulfillable");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["role"], "admin");
        assert_eq!(value["data"]["reason"], "no_vendors");
    }
}
