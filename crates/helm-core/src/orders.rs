use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DocId, UserId};

/// Order lifecycle states. Admin-driven: an order may be moved to any
/// explicit status; no transition graph is enforced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Assigned,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Human-readable status message written alongside each transition.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Pending => "Order is pending",
            Self::Assigned => "Order has been assigned",
            Self::OutForDelivery => "Order is out for delivery",
            Self::Delivered => "Order has been delivered",
            Self::Cancelled => "Order has been cancelled",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "assigned" => Ok(Self::Assigned),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    #[default]
    Product,
    Porter,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    #[default]
    Product,
    Porter,
}

/// One entry of the append-only status trail. The trail only grows; after
/// any lifecycle write its last entry matches the order's current status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub changed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub price: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeliveryAddress {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub mobile_number: Option<String>,
}

/// An order as stored. `code` is the human-assigned business identifier;
/// `key` is the store surrogate, present once persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<DocId>,
    pub code: String,
    pub user: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_partner: Option<UserId>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub kind: OrderKind,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<DeliveryAddress>,
    #[serde(default)]
    pub promo_code: String,
    #[serde(default)]
    pub promo_discount: f64,
    #[serde(default)]
    pub tip_amount: f64,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default = "default_payment_status")]
    pub payment_status: String,
    #[serde(default)]
    pub accepted_partners: Vec<UserId>,
    #[serde(default)]
    pub status_message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status_change_history: Vec<StatusChange>,
}

fn default_payment_status() -> String {
    "pending".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Assigned,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let parsed: OrderStatus = status.as_str().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn status_rejects_unknown() {
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
    }

    #[test]
    fn order_deserializes_with_sparse_fields() {
        let json = serde_json::json!({
            "code": "ORD7F21",
            "user": "usr_a",
            "created_at": "2026-01-05T10:00:00Z",
        });
        let order: Order = serde_json::from_value(json).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, "pending");
        assert!(order.status_change_history.is_empty());
        assert!(order.delivery_partner.is_none());
        assert!(order.key.is_none());
    }

    #[test]
    fn item_kind_uses_type_field() {
        let json = serde_json::json!({"product": "GRO-1001", "type": "product", "quantity": 2});
        let item: OrderItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.kind, ItemKind::Product);
        assert_eq!(item.quantity, 2);
    }

    #[test]
    fn history_entry_omits_absent_fields() {
        let entry = StatusChange {
            status: OrderStatus::Delivered,
            changed_at: Utc::now(),
            changed_by: None,
            message: Some("Order has been delivered".into()),
            partner_id: None,
            partner_name: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("changed_by").is_none());
        assert!(json.get("partner_id").is_none());
        assert_eq!(json["status"], "delivered");
    }
}
