//! Plan listing

use crate::confs::ProductContext;
use crate::core::error::Result;
use crate::ingestion::Resource;
use serde_json::{Map, Value, json};
use tracing::info;

const MODULE: &str = "Listing";
const COLLECTION: &str = "listings";

/// Listing of a single plan
#[derive(Debug, Clone, Copy)]
pub struct OfferListing<'a> {
    ctx: ProductContext<'a>,
    variant_id: &'a str,
}

impl<'a> OfferListing<'a> {
    pub fn new(ctx: ProductContext<'a>, variant_id: &'a str) -> Self {
        Self { ctx, variant_id }
    }

    pub async fn get(&self) -> Result<Resource> {
        self.ctx
            .instance_settings(MODULE, COLLECTION, Some(self.variant_id), None)
            .await
    }

    /// PUT the plan's `plan_listing` settings as they are
    pub async fn set(&self, plan_listing: &Map<String, Value>) -> Result<Value> {
        let current = self.get().await?;

        let mut body = plan_listing.clone();
        body.insert("resourceType".to_string(), json!("AzureListing"));
        body.insert("@odata.etag".to_string(), json!(current.etag()?));
        body.insert("id".to_string(), json!(current.id));

        let updated = self
            .ctx
            .put_settings(COLLECTION, &current, &Value::Object(body), None)
            .await?;

        info!(variant_id = self.variant_id, "plan listing updated");
        Ok(updated)
    }
}
