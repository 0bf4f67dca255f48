//! Status and assignment lifecycle for orders and porter requests.
//!
//! Every order transition sets the current status, refreshes the modified
//! timestamp, writes a human-readable status message, and appends one audit
//! entry, all expressed in a single store update so partial application
//! cannot occur. Porter requests run an equivalent engine without the audit
//! trail.

use chrono::Utc;
use serde::Serialize;

use helm_core::ids::{DocId, UserId};
use helm_core::orders::{OrderStatus, StatusChange};
use helm_core::porter::PorterStatus;
use helm_core::users::UserRole;
use helm_core::ConsoleError;
use helm_store::{Clause, DocumentStore, Predicate, UpdateSpec};

use crate::views::{self, ORDERS, PORTER_REQUESTS, USERS};

/// Enriched acknowledgment returned by partner assignment: the one
/// transition that reads the order back before acknowledging.
#[derive(Clone, Debug, Serialize)]
pub struct AssignmentAck {
    pub order_id: String,
    pub delivery_partner_id: String,
    pub delivery_partner_name: String,
    pub status: OrderStatus,
    pub timestamp: String,
}

/// Move an order to an explicit status and append the audit entry.
pub async fn update_order_status(
    store: &dyn DocumentStore,
    order_code: &str,
    status: OrderStatus,
    admin_name: Option<&str>,
) -> Result<(), ConsoleError> {
    let now = Utc::now();
    let message = status.describe();

    let entry = StatusChange {
        status,
        changed_at: now,
        changed_by: admin_name.map(str::to_owned),
        message: Some(message.to_owned()),
        partner_id: None,
        partner_name: None,
    };

    let update = UpdateSpec::default()
        .set("status", status.as_str())
        .set("updated_at", now.to_rfc3339())
        .set("status_message", message)
        .push(
            "status_change_history",
            serde_json::to_value(&entry)
                .map_err(|e| ConsoleError::Internal(format!("encode history entry: {e}")))?,
        );

    let updated = store
        .update_one(
            ORDERS,
            &Predicate::empty().with(Clause::eq("code", order_code)),
            update,
        )
        .await?;
    if !updated {
        return Err(ConsoleError::not_found("Order"));
    }

    tracing::info!(order = order_code, status = %status, "order status updated");
    Ok(())
}

/// Look up an active delivery partner by business id.
async fn find_active_partner_by_id(
    store: &dyn DocumentStore,
    partner_id: &UserId,
) -> Result<Option<helm_core::users::User>, ConsoleError> {
    let predicate = Predicate::empty()
        .with(Clause::eq("id", partner_id.as_str()))
        .with(Clause::eq("role", UserRole::DeliveryPartner.as_str()))
        .with(Clause::eq("is_active", true));
    match store.find_one(USERS, &predicate).await? {
        Some(doc) => Ok(Some(views::decode(doc, "user")?)),
        None => Ok(None),
    }
}

/// Assign a delivery partner to an order. The partner must exist, hold the
/// delivery-partner role, and be active; any failed check rejects without
/// touching the order.
pub async fn assign_delivery_partner(
    store: &dyn DocumentStore,
    order_code: &str,
    partner_id: &UserId,
    admin_name: &str,
) -> Result<AssignmentAck, ConsoleError> {
    views::load_order(store, order_code).await?;

    let partner = find_active_partner_by_id(store, partner_id)
        .await?
        .ok_or_else(|| {
            ConsoleError::validation("Delivery partner not found or inactive")
        })?;

    let now = Utc::now();
    let message = format!("Order assigned to {} by {}", partner.name, admin_name);
    let entry = StatusChange {
        status: OrderStatus::Assigned,
        changed_at: now,
        changed_by: Some(admin_name.to_owned()),
        message: Some(message.clone()),
        partner_id: Some(partner_id.clone()),
        partner_name: Some(partner.name.clone()),
    };

    let update = UpdateSpec::default()
        .set("delivery_partner", partner_id.as_str())
        .set("status", OrderStatus::Assigned.as_str())
        .set("assigned_at", now.to_rfc3339())
        .set("updated_at", now.to_rfc3339())
        .set(
            "status_message",
            format!("Order assigned to {}", partner.name),
        )
        .push(
            "status_change_history",
            serde_json::to_value(&entry)
                .map_err(|e| ConsoleError::Internal(format!("encode history entry: {e}")))?,
        );

    let updated = store
        .update_one(
            ORDERS,
            &Predicate::empty().with(Clause::eq("code", order_code)),
            update,
        )
        .await?;
    if !updated {
        return Err(ConsoleError::not_found("Order"));
    }

    // Read-after-write: downstream consumers expect the enriched object,
    // not just an acknowledgment flag.
    let order = views::load_order(store, order_code).await?;
    tracing::info!(order = order_code, partner = %partner_id, "delivery partner assigned");

    Ok(AssignmentAck {
        order_id: order.code,
        delivery_partner_id: partner_id.as_str().to_owned(),
        delivery_partner_name: partner.name,
        status: OrderStatus::Assigned,
        timestamp: now.to_rfc3339(),
    })
}

/// Update a porter request's status. The request key must match the store's
/// identifier format (rejected before any lookup) and the status must be
/// in the porter enum.
pub async fn update_porter_status(
    store: &dyn DocumentStore,
    request_id: &str,
    status: &str,
    admin_notes: Option<&str>,
    estimated_cost: Option<f64>,
) -> Result<PorterStatus, ConsoleError> {
    let status: PorterStatus = status.parse().map_err(|_| {
        ConsoleError::validation(format!(
            "Invalid status. Valid options: {}",
            PorterStatus::valid_options()
        ))
    })?;
    let key =
        DocId::parse(request_id).map_err(|_| ConsoleError::validation("Invalid request ID format"))?;

    let mut update = UpdateSpec::default()
        .set("status", status.as_str())
        .set("updated_at", Utc::now().to_rfc3339());
    if let Some(notes) = admin_notes.filter(|n| !n.is_empty()) {
        update = update.set("admin_notes", notes);
    }
    if let Some(cost) = estimated_cost {
        update = update.set("estimated_cost", cost);
    }

    let updated = store
        .update_one(
            PORTER_REQUESTS,
            &Predicate::empty().with(Clause::eq("_key", key.as_str())),
            update,
        )
        .await?;
    if !updated {
        return Err(ConsoleError::not_found("Porter request"));
    }

    tracing::info!(request = request_id, status = %status, "porter request updated");
    Ok(status)
}

/// Assign a delivery partner to a porter request. Both identifiers must be
/// valid store keys; the partner must hold the role and be active.
pub async fn assign_porter_partner(
    store: &dyn DocumentStore,
    request_id: &str,
    partner_id: &str,
    estimated_cost: Option<f64>,
) -> Result<String, ConsoleError> {
    let request_key =
        DocId::parse(request_id).map_err(|_| ConsoleError::validation("Invalid ID format"))?;
    let partner_key =
        DocId::parse(partner_id).map_err(|_| ConsoleError::validation("Invalid ID format"))?;

    let predicate = Predicate::empty()
        .with(Clause::eq("_key", partner_key.as_str()))
        .with(Clause::eq("role", UserRole::DeliveryPartner.as_str()))
        .with(Clause::eq("is_active", true));
    let partner: helm_core::users::User = match store.find_one(USERS, &predicate).await? {
        Some(doc) => views::decode(doc, "user")?,
        None => return Err(ConsoleError::validation("Invalid delivery partner")),
    };

    let mut update = UpdateSpec::default()
        .set("assigned_partner_key", partner_key.as_str())
        .set("assigned_partner_name", partner.name.clone())
        .set("status", PorterStatus::Assigned.as_str())
        .set("updated_at", Utc::now().to_rfc3339());
    if let Some(cost) = estimated_cost {
        update = update.set("estimated_cost", cost);
    }

    let updated = store
        .update_one(
            PORTER_REQUESTS,
            &Predicate::empty().with(Clause::eq("_key", request_key.as_str())),
            update,
        )
        .await?;
    if !updated {
        return Err(ConsoleError::not_found("Porter request"));
    }

    tracing::info!(request = request_id, partner = partner_id, "porter partner assigned");
    Ok(partner.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_core::orders::Order;
    use helm_store::MemoryStore;
    use serde_json::json;

    fn seed_order(store: &MemoryStore, code: &str) {
        store.seed(
            ORDERS,
            vec![json!({
                "code": code,
                "user": "usr_a",
                "total_amount": 50.0,
                "status": "pending",
                "created_at": "2026-01-01T00:00:00Z",
            })],
        );
    }

    fn seed_partner(store: &MemoryStore, id: &str, name: &str, active: bool) {
        store.seed(
            USERS,
            vec![json!({
                "id": id,
                "name": name,
                "email": "p@example.com",
                "phone": "1",
                "role": "delivery_partner",
                "is_active": active,
            })],
        );
    }

    async fn fetch_order(store: &MemoryStore, code: &str) -> Order {
        views::load_order(store, code).await.unwrap()
    }

    #[tokio::test]
    async fn status_update_appends_history_atomically() {
        let store = MemoryStore::new();
        seed_order(&store, "ORD1");

        update_order_status(&store, "ORD1", OrderStatus::OutForDelivery, None)
            .await
            .unwrap();

        let order = fetch_order(&store, "ORD1").await;
        assert_eq!(order.status, OrderStatus::OutForDelivery);
        assert_eq!(order.status_message, "Order is out for delivery");
        assert_eq!(order.status_change_history.len(), 1);
        assert_eq!(
            order.status_change_history.last().unwrap().status,
            OrderStatus::OutForDelivery
        );
        assert!(order.updated_at.is_some());
    }

    #[tokio::test]
    async fn history_grows_and_tail_tracks_status() {
        let store = MemoryStore::new();
        seed_order(&store, "ORD1");

        let sequence = [
            OrderStatus::Assigned,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ];
        let mut prev_len = 0;
        for status in sequence {
            update_order_status(&store, "ORD1", status, Some("ops")).await.unwrap();
            let order = fetch_order(&store, "ORD1").await;
            assert!(order.status_change_history.len() > prev_len);
            prev_len = order.status_change_history.len();
            assert_eq!(order.status_change_history.last().unwrap().status, status);
            assert_eq!(order.status, status);
        }
        assert_eq!(prev_len, 4);
    }

    #[tokio::test]
    async fn status_update_missing_order() {
        let store = MemoryStore::new();
        let err = update_order_status(&store, "NOPE", OrderStatus::Delivered, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Order not found");
    }

    #[tokio::test]
    async fn assignment_happy_path_returns_enriched_ack() {
        let store = MemoryStore::new();
        seed_order(&store, "ORD1");
        seed_partner(&store, "usr_rider", "Ravi", true);

        let ack = assign_delivery_partner(&store, "ORD1", &UserId::from_raw("usr_rider"), "Maya")
            .await
            .unwrap();
        assert_eq!(ack.order_id, "ORD1");
        assert_eq!(ack.delivery_partner_name, "Ravi");
        assert_eq!(ack.status, OrderStatus::Assigned);

        let order = fetch_order(&store, "ORD1").await;
        assert_eq!(order.status, OrderStatus::Assigned);
        assert_eq!(order.delivery_partner.as_ref().unwrap().as_str(), "usr_rider");
        assert!(order.assigned_at.is_some());
        let entry = order.status_change_history.last().unwrap();
        assert_eq!(entry.changed_by.as_deref(), Some("Maya"));
        assert_eq!(entry.partner_name.as_deref(), Some("Ravi"));
    }

    #[tokio::test]
    async fn assignment_rejects_inactive_partner() {
        let store = MemoryStore::new();
        seed_order(&store, "ORD1");
        seed_partner(&store, "usr_rider", "Ravi", false);

        let err = assign_delivery_partner(&store, "ORD1", &UserId::from_raw("usr_rider"), "Maya")
            .await
            .unwrap_err();
        assert!(err.is_client_fault());

        // Order untouched
        let order = fetch_order(&store, "ORD1").await;
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.delivery_partner.is_none());
        assert!(order.status_change_history.is_empty());
    }

    #[tokio::test]
    async fn assignment_rejects_wrong_role() {
        let store = MemoryStore::new();
        seed_order(&store, "ORD1");
        store.seed(
            USERS,
            vec![json!({
                "id": "usr_cust",
                "name": "Casey",
                "role": "customer",
                "is_active": true,
            })],
        );

        let err = assign_delivery_partner(&store, "ORD1", &UserId::from_raw("usr_cust"), "Maya")
            .await
            .unwrap_err();
        assert!(err.is_client_fault());
        let order = fetch_order(&store, "ORD1").await;
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn porter_update_rejects_bad_key_before_lookup() {
        let store = MemoryStore::new();
        let err = update_porter_status(&store, "not-a-key", "assigned", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid request ID format");
    }

    #[tokio::test]
    async fn porter_update_rejects_bad_status() {
        let store = MemoryStore::new();
        let err = update_porter_status(&store, DocId::new().as_str(), "vanished", None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Valid options"));
    }

    #[tokio::test]
    async fn porter_update_sets_fields() {
        let store = MemoryStore::new();
        let key = store
            .insert_one(
                PORTER_REQUESTS,
                json!({"status": "pending", "created_at": "2026-01-01T00:00:00Z"}),
            )
            .await
            .unwrap();

        update_porter_status(&store, key.as_str(), "in_transit", Some("fragile"), Some(45.0))
            .await
            .unwrap();

        let doc = store
            .find_one(
                PORTER_REQUESTS,
                &Predicate::empty().with(Clause::eq("_key", key.as_str())),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["status"], "in_transit");
        assert_eq!(doc["admin_notes"], "fragile");
        assert_eq!(doc["estimated_cost"], 45.0);
    }

    #[tokio::test]
    async fn porter_assignment_requires_valid_partner() {
        let store = MemoryStore::new();
        let request_key = store
            .insert_one(
                PORTER_REQUESTS,
                json!({"status": "pending", "created_at": "2026-01-01T00:00:00Z"}),
            )
            .await
            .unwrap();
        // Partner exists but has the wrong role
        let partner_key = store
            .insert_one(
                USERS,
                json!({"id": "usr_x", "name": "X", "role": "customer", "is_active": true}),
            )
            .await
            .unwrap();

        let err = assign_porter_partner(&store, request_key.as_str(), partner_key.as_str(), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid delivery partner");
    }

    #[tokio::test]
    async fn porter_assignment_sets_denormalized_name() {
        let store = MemoryStore::new();
        let request_key = store
            .insert_one(
                PORTER_REQUESTS,
                json!({"status": "pending", "created_at": "2026-01-01T00:00:00Z"}),
            )
            .await
            .unwrap();
        let partner_key = store
            .insert_one(
                USERS,
                json!({"id": "usr_r", "name": "Ravi", "role": "delivery_partner", "is_active": true}),
            )
            .await
            .unwrap();

        let name = assign_porter_partner(&store, request_key.as_str(), partner_key.as_str(), Some(99.0))
            .await
            .unwrap();
        assert_eq!(name, "Ravi");

        let doc = store
            .find_one(
                PORTER_REQUESTS,
                &Predicate::empty().with(Clause::eq("_key", request_key.as_str())),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["status"], "assigned");
        assert_eq!(doc["assigned_partner_name"], "Ravi");
        assert_eq!(doc["estimated_cost"], 99.0);
    }
}
