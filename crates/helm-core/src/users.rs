use serde::{Deserialize, Serialize};

use crate::ids::{DocId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Admin,
    DeliveryPartner,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::DeliveryPartner => "delivery_partner",
        }
    }
}

/// Read-only from this core's perspective: joined into orders, requests and
/// partner-assignment checks, never mutated here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<DocId>,
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub role: UserRole,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
