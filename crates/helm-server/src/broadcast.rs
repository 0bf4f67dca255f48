//! Snapshot broadcast: after a successful mutation, re-assemble fresh state
//! and push it to every live session. Replication is whole-snapshot, not
//! diffing, and a failed delivery to one session never affects the others.

use std::sync::Arc;

use helm_store::DocumentStore;

use crate::protocol::Response;
use crate::sessions::{SessionId, SessionRegistry};
use crate::views;

/// Serialize a response for the wire. Returns None (with an error log)
/// instead of propagating encoder failures into a mutation's ack path.
pub fn encode(response: &Response) -> Option<String> {
    match serde_json::to_string(response) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode response");
            None
        }
    }
}

/// Push a precomputed response to every open session, optionally excluding
/// the initiator (which already got its own acknowledgment).
pub fn publish(
    registry: &SessionRegistry,
    response: &Response,
    except: Option<&SessionId>,
) -> usize {
    let Some(json) = encode(response) else {
        return 0;
    };
    registry.broadcast(&json, except)
}

/// Re-assemble the full catalog snapshot and fan it out to all sessions.
/// Assembly failures are logged, never propagated to the caller.
pub async fn broadcast_catalog(store: &dyn DocumentStore, registry: &Arc<SessionRegistry>) {
    match views::assemble_catalog_snapshot(store).await {
        Ok(snapshot) => {
            let delivered = publish(registry, &Response::products_data(snapshot), None);
            tracing::debug!(delivered, "catalog snapshot broadcast");
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to assemble catalog snapshot for broadcast");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn catalog_broadcast_reaches_all_sessions() {
        let store = MemoryStore::new();
        store.seed(
            views::PRODUCTS,
            vec![json!({
                "code": "GRO-1001",
                "name": "Rice",
                "category": "CAT-GRO",
                "created_at": "2026-01-01T00:00:00Z",
            })],
        );
        let registry = Arc::new(SessionRegistry::new(32));
        let (_a, mut rx_a) = registry.register();
        let (_b, mut rx_b) = registry.register();

        broadcast_catalog(&store, &registry).await;

        for rx in [&mut rx_a, &mut rx_b] {
            let msg = rx.try_recv().unwrap();
            let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
            assert_eq!(value["type"], "products_data");
            assert_eq!(value["products"][0]["code"], "GRO-1001");
            assert!(value["categories"].is_array());
        }
    }

    #[tokio::test]
    async fn publish_excludes_initiator() {
        let registry = SessionRegistry::new(32);
        let (initiator, mut rx_initiator) = registry.register();
        let (_other, mut rx_other) = registry.register();

        let delivered = publish(
            &registry,
            &Response::OrderUpdated {
                success: true,
                order_id: "ORD1".into(),
            },
            Some(&initiator),
        );
        assert_eq!(delivered, 1);
        assert!(rx_initiator.try_recv().is_err());
        let msg = rx_other.try_recv().unwrap();
        assert!(msg.contains("order_updated"));
    }
}
