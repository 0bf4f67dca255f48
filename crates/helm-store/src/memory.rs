use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use helm_core::ids::DocId;

use crate::contract::{Document, DocumentStore};
use crate::error::StoreError;
use crate::query::{compare_values, FindOptions, Predicate, UpdateSpec};

/// In-memory reference implementation of the document-store contract.
/// Backs the test suite and the development binary; a production deployment
/// substitutes a real store behind the same trait.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection directly, bypassing surrogate-key assignment for
    /// documents that already carry one.
    pub fn seed(&self, collection: &str, docs: Vec<Document>) {
        let mut guard = self.collections.write();
        let bucket = guard.entry(collection.to_owned()).or_default();
        for mut doc in docs {
            ensure_key(&mut doc);
            bucket.push(doc);
        }
    }
}

fn ensure_key(doc: &mut Document) {
    if let Some(obj) = doc.as_object_mut() {
        if !obj.contains_key("_key") {
            obj.insert("_key".into(), Value::String(DocId::new().to_string()));
        }
    }
}

fn sort_documents(docs: &mut [Document], field: &str, descending: bool) {
    docs.sort_by(|a, b| {
        let ord = match (a.get(field), b.get(field)) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Greater,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (None, None) => std::cmp::Ordering::Equal,
        };
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

fn apply_update(doc: &mut Document, update: &UpdateSpec) {
    let Some(obj) = doc.as_object_mut() else {
        return;
    };
    for (field, value) in &update.set {
        obj.insert(field.clone(), value.clone());
    }
    for (field, value) in &update.push {
        match obj.get_mut(field) {
            Some(Value::Array(items)) => items.push(value.clone()),
            _ => {
                obj.insert(field.clone(), Value::Array(vec![value.clone()]));
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn count(&self, collection: &str, predicate: &Predicate) -> Result<u64, StoreError> {
        let guard = self.collections.read();
        let count = guard
            .get(collection)
            .map(|docs| docs.iter().filter(|d| predicate.matches(d)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn find_one(
        &self,
        collection: &str,
        predicate: &Predicate,
    ) -> Result<Option<Document>, StoreError> {
        let guard = self.collections.read();
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| predicate.matches(d)).cloned()))
    }

    async fn find_many(
        &self,
        collection: &str,
        predicate: &Predicate,
        options: FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read();
        let mut matched: Vec<Document> = guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| predicate.matches(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(guard);

        if let Some(sort) = &options.sort {
            sort_documents(&mut matched, &sort.field, sort.descending);
        }
        let skip = options.skip.unwrap_or(0);
        let mut page: Vec<Document> = matched.into_iter().skip(skip).collect();
        if let Some(limit) = options.limit {
            page.truncate(limit);
        }
        Ok(page)
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<DocId, StoreError> {
        let Some(obj) = doc.as_object_mut() else {
            return Err(StoreError::Serialization(
                "document must be a JSON object".into(),
            ));
        };
        let key = DocId::new();
        obj.insert("_key".into(), Value::String(key.to_string()));
        let mut guard = self.collections.write();
        guard.entry(collection.to_owned()).or_default().push(doc);
        Ok(key)
    }

    async fn update_one(
        &self,
        collection: &str,
        predicate: &Predicate,
        update: UpdateSpec,
    ) -> Result<bool, StoreError> {
        let mut guard = self.collections.write();
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter_mut().find(|d| predicate.matches(&**d)) {
            Some(doc) => {
                apply_update(doc, &update);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(
        &self,
        collection: &str,
        predicate: &Predicate,
    ) -> Result<bool, StoreError> {
        let mut guard = self.collections.write();
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter().position(|d| predicate.matches(d)) {
            Some(idx) => {
                docs.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Clause, Sort};
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_surrogate_key() {
        let store = MemoryStore::new();
        let key = store
            .insert_one("orders", json!({"code": "ORD1"}))
            .await
            .unwrap();

        let doc = store
            .find_one("orders", &Predicate::empty().with(Clause::eq("code", "ORD1")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["_key"], key.to_string());
    }

    #[tokio::test]
    async fn count_and_find_respect_predicate() {
        let store = MemoryStore::new();
        store.seed(
            "orders",
            vec![
                json!({"code": "A", "status": "pending"}),
                json!({"code": "B", "status": "delivered"}),
                json!({"code": "C", "status": "pending"}),
            ],
        );

        let pred = Predicate::empty().with(Clause::eq("status", "pending"));
        assert_eq!(store.count("orders", &pred).await.unwrap(), 2);
        let docs = store
            .find_many("orders", &pred, FindOptions::default())
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn find_many_sorts_skips_limits() {
        let store = MemoryStore::new();
        store.seed(
            "orders",
            vec![
                json!({"code": "A", "created_at": "2026-01-01T00:00:00Z"}),
                json!({"code": "B", "created_at": "2026-01-03T00:00:00Z"}),
                json!({"code": "C", "created_at": "2026-01-02T00:00:00Z"}),
            ],
        );

        let docs = store
            .find_many(
                "orders",
                &Predicate::empty(),
                FindOptions::sorted(Sort::desc("created_at")).skip(1).limit(1),
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["code"], "C");
    }

    #[tokio::test]
    async fn update_applies_set_and_push_together() {
        let store = MemoryStore::new();
        store.seed("orders", vec![json!({"code": "A", "status": "pending"})]);

        let pred = Predicate::empty().with(Clause::eq("code", "A"));
        let updated = store
            .update_one(
                "orders",
                &pred,
                UpdateSpec::default()
                    .set("status", "assigned")
                    .push("status_change_history", json!({"status": "assigned"})),
            )
            .await
            .unwrap();
        assert!(updated);

        let doc = store.find_one("orders", &pred).await.unwrap().unwrap();
        assert_eq!(doc["status"], "assigned");
        assert_eq!(doc["status_change_history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_missing_returns_false() {
        let store = MemoryStore::new();
        let pred = Predicate::empty().with(Clause::eq("code", "nope"));
        let updated = store
            .update_one("orders", &pred, UpdateSpec::default().set("status", "x"))
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn delete_removes_first_match() {
        let store = MemoryStore::new();
        store.seed(
            "products",
            vec![json!({"code": "P1"}), json!({"code": "P2"})],
        );
        let pred = Predicate::empty().with(Clause::eq("code", "P1"));
        assert!(store.delete_one("products", &pred).await.unwrap());
        assert!(!store.delete_one("products", &pred).await.unwrap());
        assert_eq!(
            store.count("products", &Predicate::empty()).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn insert_rejects_non_object() {
        let store = MemoryStore::new();
        assert!(store.insert_one("orders", json!("scalar")).await.is_err());
    }
}
