//! Multi-asset upload pipeline: independent, in-order attempts with
//! progress reporting and partial-failure tolerance. A failed upload is
//! logged and skipped, never retried, and never aborts the batch.

use async_trait::async_trait;
use base64::Engine;

use helm_core::catalog::ProductImage;
use helm_store::MediaStore;

use crate::protocol::Response;
use crate::sessions::{SessionId, SessionRegistry};

pub const UPLOAD_FOLDER: &str = "products";

const PROGRESS_FLOOR: u8 = 10;
const PROGRESS_SPAN: u8 = 70;

/// Receiver of progress events: the originating session in production, a
/// recording double in tests.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn progress(&self, progress: u8, message: String);
}

/// Forwards progress events to the originating session. A closed session
/// swallows them; progress is best-effort by design.
pub struct SessionProgress {
    pub registry: std::sync::Arc<SessionRegistry>,
    pub session_id: SessionId,
}

#[async_trait]
impl ProgressSink for SessionProgress {
    async fn progress(&self, progress: u8, message: String) {
        let response = Response::UploadProgress { message, progress };
        if let Ok(json) = serde_json::to_string(&response) {
            self.registry.send_to(&self.session_id, json);
        }
    }
}

/// Outcome of one upload batch.
#[derive(Debug, Default)]
pub struct UploadBatch {
    pub images: Vec<ProductImage>,
    pub submitted: usize,
    pub succeeded: usize,
}

/// Decode a `data:` URI payload. Anything else (empty strings, bare URLs,
/// broken base64) is not uploadable.
pub fn decode_data_uri(payload: &str) -> Option<Vec<u8>> {
    let rest = payload.strip_prefix("data:")?;
    let (_, encoded) = rest.split_once(";base64,")?;
    base64::engine::general_purpose::STANDARD.decode(encoded).ok()
}

fn step_progress(attempted: usize, submitted: usize) -> u8 {
    PROGRESS_FLOOR + (PROGRESS_SPAN as usize * attempted / submitted) as u8
}

/// Upload payloads independently and in order. Position index reflects the
/// original submission index (`start_index + i`), gaps included. When
/// `primary_allowed`, the submission-index-0 image is primary; if it failed
/// but others succeeded, the first success is promoted so exactly one image
/// is primary whenever any exists.
pub async fn upload_images(
    media: &dyn MediaStore,
    sink: &dyn ProgressSink,
    product_code: &str,
    payloads: &[String],
    start_index: usize,
    primary_allowed: bool,
) -> UploadBatch {
    let submitted = payloads.len();
    let mut batch = UploadBatch {
        submitted,
        ..Default::default()
    };
    if submitted == 0 {
        return batch;
    }

    sink.progress(
        PROGRESS_FLOOR,
        format!("Uploading {submitted} images..."),
    )
    .await;

    for (i, payload) in payloads.iter().enumerate() {
        let index = start_index + i;
        let Some(bytes) = decode_data_uri(payload) else {
            tracing::warn!(index, "skipping non-inline image payload");
            continue;
        };

        sink.progress(
            step_progress(i + 1, submitted),
            format!("Uploading image {} of {submitted}...", i + 1),
        )
        .await;

        let public_id = format!("product_{product_code}_image_{index}");
        match media.upload(&bytes, UPLOAD_FOLDER, &public_id).await {
            Ok(asset) => {
                batch.images.push(ProductImage {
                    url: asset.url,
                    thumbnail: asset.thumbnail,
                    public_id: asset.public_id,
                    index,
                    is_primary: primary_allowed && index == 0,
                });
                batch.succeeded += 1;
            }
            Err(e) => {
                tracing::error!(index, error = %e, "image upload failed, skipping");
            }
        }
    }

    if primary_allowed
        && !batch.images.is_empty()
        && !batch.images.iter().any(|img| img.is_primary)
    {
        batch.images[0].is_primary = true;
    }

    let final_message = if batch.succeeded > 0 {
        format!(
            "Successfully uploaded {} of {submitted} images!",
            batch.succeeded
        )
    } else {
        "Failed to upload images".to_owned()
    };
    sink.progress(100, final_message).await;

    batch
}

/// Delete every stored image of a product from object storage. When an
/// image carries no stored identifier, fall back to the derived pattern.
/// Failures are logged and never block the caller.
pub async fn delete_images(
    media: &dyn MediaStore,
    product_code: &str,
    images: &[ProductImage],
) -> usize {
    let mut deleted = 0;
    for image in images {
        let public_id = if image.public_id.is_empty() {
            format!("{UPLOAD_FOLDER}/product_{product_code}_image_0")
        } else {
            image.public_id.clone()
        };
        match media.delete(&public_id).await {
            Ok(true) => deleted += 1,
            Ok(false) => {
                tracing::warn!(public_id, "image not present in object storage");
            }
            Err(e) => {
                tracing::warn!(public_id, error = %e, "failed to delete image");
            }
        }
    }
    deleted
}
