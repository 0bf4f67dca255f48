use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::DocId;

/// Keyword lists are deduplicated (order preserving) and capped.
pub const MAX_KEYWORDS: usize = 20;

/// Hard cap on images attached to one product.
pub const MAX_PRODUCT_IMAGES: usize = 10;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub public_id: String,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub is_primary: bool,
}

// Legacy documents may store an image as a bare URL string.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImageRepr {
    Full(ProductImage),
    Url(String),
}

fn deserialize_images<'de, D>(deserializer: D) -> Result<Vec<ProductImage>, D::Error>
where
    D: Deserializer<'de>,
{
    let reprs: Vec<ImageRepr> = Vec::deserialize(deserializer)?;
    Ok(reprs
        .into_iter()
        .enumerate()
        .map(|(i, repr)| match repr {
            ImageRepr::Full(img) => img,
            ImageRepr::Url(url) => ProductImage {
                thumbnail: url.clone(),
                url,
                public_id: String::new(),
                index: i,
                is_primary: i == 0,
            },
        })
        .collect())
}

/// A catalog item. `code` is the category-derived business identifier.
/// `status` and `is_active` are kept in sync: status == "active" ⇔ is_active.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<DocId>,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub actual_price: f64,
    #[serde(default)]
    pub selling_price: f64,
    #[serde(default)]
    pub discount: f64,
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default, deserialize_with = "deserialize_images")]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub allow_user_images: bool,
    #[serde(default)]
    pub allow_user_description: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<DocId>,
    pub code: String,
    pub name: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Brand {
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<DocId>,
    pub code: String,
    pub name: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_status() -> String {
    "active".into()
}

fn default_true() -> bool {
    true
}

pub fn is_active_status(status: &str) -> bool {
    status == "active"
}

/// Normalize inbound keywords: accepts a comma-separated string or a list,
/// trims entries, drops empties, dedups preserving first occurrence, caps
/// at [`MAX_KEYWORDS`].
pub fn clean_keywords(raw: &serde_json::Value) -> Vec<String> {
    let candidates: Vec<String> = match raw {
        serde_json::Value::String(s) => s.split(',').map(|kw| kw.trim().to_owned()).collect(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|kw| match kw {
                serde_json::Value::String(s) => s.trim().to_owned(),
                other => other.to_string(),
            })
            .collect(),
        _ => return Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|kw| !kw.is_empty())
        .filter(|kw| seen.insert(kw.clone()))
        .take(MAX_KEYWORDS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_from_comma_string() {
        let raw = serde_json::json!("rice, basmati , rice,  ");
        assert_eq!(clean_keywords(&raw), vec!["rice", "basmati"]);
    }

    #[test]
    fn keywords_from_list_dedup_and_cap() {
        let many: Vec<String> = (0..30).map(|i| format!("kw{i}")).collect();
        let raw = serde_json::json!(many);
        let cleaned = clean_keywords(&raw);
        assert_eq!(cleaned.len(), MAX_KEYWORDS);
        assert_eq!(cleaned[0], "kw0");
    }

    #[test]
    fn keywords_from_non_collection() {
        assert!(clean_keywords(&serde_json::json!(42)).is_empty());
        assert!(clean_keywords(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn legacy_string_images_normalize() {
        let json = serde_json::json!({
            "code": "GRO-1001",
            "name": "Basmati Rice",
            "category": "CAT-GRO",
            "created_at": "2026-01-10T00:00:00Z",
            "images": ["https://cdn.example/a.jpg", {"url": "https://cdn.example/b.jpg", "thumbnail": "t", "public_id": "p", "index": 1, "is_primary": false}],
        });
        let product: Product = serde_json::from_value(json).unwrap();
        assert_eq!(product.images.len(), 2);
        assert_eq!(product.images[0].thumbnail, "https://cdn.example/a.jpg");
        assert!(product.images[0].is_primary);
        assert!(product.images[0].public_id.is_empty());
        assert_eq!(product.images[1].public_id, "p");
    }

    #[test]
    fn product_defaults() {
        let json = serde_json::json!({
            "code": "GRO-1002",
            "name": "Salt",
            "category": "CAT-GRO",
            "created_at": "2026-01-10T00:00:00Z",
        });
        let product: Product = serde_json::from_value(json).unwrap();
        assert_eq!(product.status, "active");
        assert!(product.is_active);
        assert!(product.images.is_empty());
        assert_eq!(product.stock, 0);
    }

    #[test]
    fn active_status_sync() {
        assert!(is_active_status("active"));
        assert!(!is_active_status("inactive"));
        assert!(!is_active_status("Active"));
    }
}
