//! Contract over the external catalog-code generator.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Next business code for a catalog item in the given category.
    async fn next_product_code(&self, category_name: &str) -> Result<String, StoreError>;
}

/// Reference implementation: `<PREFIX>-<counter>` where the prefix is the
/// first three alphanumeric characters of the category name, uppercased.
#[derive(Default)]
pub struct PrefixCodeGenerator {
    counters: DashMap<String, u64>,
}

impl PrefixCodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CodeGenerator for PrefixCodeGenerator {
    async fn next_product_code(&self, category_name: &str) -> Result<String, StoreError> {
        let prefix: String = category_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(3)
            .collect::<String>()
            .to_uppercase();
        let prefix = if prefix.is_empty() {
            "ITM".to_owned()
        } else {
            prefix
        };
        let mut counter = self.counters.entry(prefix.clone()).or_insert(1000);
        *counter += 1;
        Ok(format!("{prefix}-{}", *counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn codes_are_prefixed_and_sequential() {
        let gen = PrefixCodeGenerator::new();
        let a = gen.next_product_code("Groceries").await.unwrap();
        let b = gen.next_product_code("Groceries").await.unwrap();
        assert_eq!(a, "GRO-1001");
        assert_eq!(b, "GRO-1002");
    }

    #[tokio::test]
    async fn empty_category_falls_back() {
        let gen = PrefixCodeGenerator::new();
        let code = gen.next_product_code("--").await.unwrap();
        assert!(code.starts_with("ITM-"), "got: {code}");
    }
}
