use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::DocId;

/// Porter request states. Unlike orders these track only the current
/// status; there is no history trail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PorterStatus {
    #[default]
    Pending,
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
}

impl PorterStatus {
    pub const ALL: [PorterStatus; 5] = [
        Self::Pending,
        Self::Assigned,
        Self::InTransit,
        Self::Delivered,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Comma-separated list of valid statuses, used in rejection messages.
    pub fn valid_options() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for PorterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PorterStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "assigned" => Ok(Self::Assigned),
            "in_transit" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown porter status: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl std::str::FromStr for PackageSize {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            other => Err(format!("unknown package size: {other}")),
        }
    }
}

/// A porter (point-to-point delivery) request. Addressed by surrogate key
/// only; it carries no business code.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PorterRequest {
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<DocId>,
    #[serde(default = "empty_object")]
    pub pickup_address: serde_json::Value,
    #[serde(default = "empty_object")]
    pub delivery_address: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_distance: Option<f64>,
    #[serde(default)]
    pub package_size: PackageSize,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub status: PorterStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_key: Option<DocId>,
    // Denormalized requester contact, used when the user join misses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_partner_key: Option<DocId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_partner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PorterStatusBreakdown {
    pub pending: u64,
    pub assigned: u64,
    pub in_transit: u64,
    pub delivered: u64,
    pub cancelled: u64,
}

impl PorterStatusBreakdown {
    pub fn record(&mut self, status: PorterStatus) {
        match status {
            PorterStatus::Pending => self.pending += 1,
            PorterStatus::Assigned => self.assigned += 1,
            PorterStatus::InTransit => self.in_transit += 1,
            PorterStatus::Delivered => self.delivered += 1,
            PorterStatus::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PorterStats {
    pub total_requests: u64,
    pub today_requests: u64,
    pub urgent_requests: u64,
    pub total_revenue: f64,
    pub status_breakdown: PorterStatusBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in PorterStatus::ALL {
            let parsed: PorterStatus = status.as_str().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn valid_options_lists_all() {
        assert_eq!(
            PorterStatus::valid_options(),
            "pending, assigned, in_transit, delivered, cancelled"
        );
    }

    #[test]
    fn request_defaults() {
        let json = serde_json::json!({"created_at": "2026-02-01T08:30:00Z"});
        let req: PorterRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.status, PorterStatus::Pending);
        assert_eq!(req.package_size, PackageSize::Small);
        assert!(!req.urgent);
        assert!(req.pickup_address.is_object());
    }

    #[test]
    fn breakdown_counts() {
        let mut breakdown = PorterStatusBreakdown::default();
        breakdown.record(PorterStatus::Pending);
        breakdown.record(PorterStatus::Delivered);
        breakdown.record(PorterStatus::Delivered);
        assert_eq!(breakdown.pending, 1);
        assert_eq!(breakdown.delivered, 2);
        assert_eq!(breakdown.cancelled, 0);
    }
}
