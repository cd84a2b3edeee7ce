//! Listing images (offer logos)
//!
//! An image is uploaded in three steps: register a `PendingUpload` record,
//! PUT the bytes to the returned SAS URI, then mark the record `Uploaded`.
//! Images with the same file name are removed first so re-runs don't pile up.

use crate::confs::ProductContext;
use crate::core::error::{PublishError, Result};
use crate::ingestion::{ListResponse, UploadRecord, upload_to_sas};
use serde_json::{Value, json};
use std::path::Path;
use tracing::{debug, info};

/// Images attached to one listing
#[derive(Debug, Clone, Copy)]
pub struct ListingImage<'a> {
    ctx: ProductContext<'a>,
    listing_id: &'a str,
}

impl<'a> ListingImage<'a> {
    pub fn new(ctx: ProductContext<'a>, listing_id: &'a str) -> Self {
        Self { ctx, listing_id }
    }

    fn images_path(&self) -> String {
        self.ctx.path(&format!("listings/{}/images", self.listing_id))
    }

    fn image_path(&self, image_id: &str) -> String {
        format!("{}/{}", self.images_path(), image_id)
    }

    pub async fn list(&self) -> Result<Vec<UploadRecord>> {
        let list: ListResponse<UploadRecord> = self.ctx.client.get(&self.images_path()).await?;
        Ok(list.value)
    }

    /// Upload `file` as an image of `image_type` (e.g. `AzureLogoLarge`)
    pub async fn set(&self, file: &Path, image_type: &str) -> Result<Value> {
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|_| file.is_file())
            .ok_or_else(|| PublishError::FileNotFound {
                path: file.display().to_string(),
                what: format!("{} image", image_type),
            })?;

        for stale in self
            .list()
            .await?
            .into_iter()
            .filter(|image| image.file_name.as_deref() == Some(file_name))
        {
            debug!(image_id = %stale.id, file_name, "removing previous image");
            self.ctx.client.delete(&self.image_path(&stale.id)).await?;
        }

        let pending: UploadRecord = self
            .ctx
            .client
            .post(
                &self.images_path(),
                &json!({
                    "resourceType": "ListingImage",
                    "fileName": file_name,
                    "type": image_type,
                    "state": "PendingUpload",
                    "order": 0,
                }),
            )
            .await?;

        let sas_uri = pending
            .file_sas_uri
            .as_deref()
            .ok_or_else(|| PublishError::NotFound {
                resource: "upload URL for image".to_string(),
                name: pending.id.clone(),
            })?;
        upload_to_sas(self.ctx.client.http(), sas_uri, file).await?;

        let mut body = serde_json::to_value(&pending)?;
        body["state"] = json!("Uploaded");
        let uploaded = self
            .ctx
            .client
            .put(&self.image_path(&pending.id), pending.etag()?, &body)
            .await?;

        info!(image_type, file_name, "listing image uploaded");
        Ok(uploaded)
    }
}
