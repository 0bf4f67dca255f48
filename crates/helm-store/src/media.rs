//! Contract over the external object-storage service for media assets.

use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Debug, thiserror::Error)]
#[error("object storage error: {0}")]
pub struct MediaError(pub String);

impl From<MediaError> for helm_core::ConsoleError {
    fn from(e: MediaError) -> Self {
        helm_core::ConsoleError::Storage(e.to_string())
    }
}

/// URLs and the storage identifier returned by a successful upload.
#[derive(Clone, Debug)]
pub struct UploadedAsset {
    pub url: String,
    pub thumbnail: String,
    pub public_id: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload one asset under `folder/public_id`.
    async fn upload(
        &self,
        data: &[u8],
        folder: &str,
        public_id: &str,
    ) -> Result<UploadedAsset, MediaError>;

    /// Best-effort delete; returns false when the asset was unknown.
    async fn delete(&self, public_id: &str) -> Result<bool, MediaError>;
}

/// In-memory media store for tests and the development binary. Serves fake
/// CDN URLs and tracks stored identifiers so deletions can be asserted.
#[derive(Default)]
pub struct MemoryMediaStore {
    assets: DashMap<String, usize>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.assets.contains_key(public_id)
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(
        &self,
        data: &[u8],
        folder: &str,
        public_id: &str,
    ) -> Result<UploadedAsset, MediaError> {
        let qualified = format!("{folder}/{public_id}");
        self.assets.insert(qualified.clone(), data.len());
        Ok(UploadedAsset {
            url: format!("https://media.invalid/{qualified}"),
            thumbnail: format!("https://media.invalid/{qualified}/thumb"),
            public_id: qualified,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<bool, MediaError> {
        Ok(self.assets.remove(public_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_delete() {
        let store = MemoryMediaStore::new();
        let asset = store
            .upload(b"bytes", "products", "product_GRO-1_image_0")
            .await
            .unwrap();
        assert_eq!(asset.public_id, "products/product_GRO-1_image_0");
        assert!(asset.url.contains("product_GRO-1_image_0"));
        assert!(store.contains(&asset.public_id));

        assert!(store.delete(&asset.public_id).await.unwrap());
        assert!(!store.delete(&asset.public_id).await.unwrap());
    }
}
