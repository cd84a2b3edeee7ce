//! Offer listing (title, descriptions, links, contacts)

use crate::confs::{ProductContext, reject_as_config_error};
use crate::core::config::OfferListingSettings;
use crate::core::error::Result;
use crate::ingestion::Resource;
use serde_json::{Value, json};
use tracing::info;

const MODULE: &str = "Listing";
const COLLECTION: &str = "listings";

/// Offer-level listing module
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a> {
    ctx: ProductContext<'a>,
}

impl<'a> Listing<'a> {
    pub fn new(ctx: ProductContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn get(&self) -> Result<Resource> {
        self.ctx
            .instance_settings(MODULE, COLLECTION, None, None)
            .await
    }

    /// Replace the listing text; the API's "Missing ..." rejections become config errors
    pub async fn set(&self, settings: &OfferListingSettings, publisher_name: &str) -> Result<Value> {
        let current = self.get().await?;
        let body = listing_body(settings, publisher_name, &current);

        let updated = self
            .ctx
            .put_settings(COLLECTION, &current, &body, None)
            .await
            .map_err(|e| reject_as_config_error(e, "Missing"))?;

        info!(product_id = self.ctx.product_id, "listing updated");
        Ok(updated)
    }
}

fn listing_body(settings: &OfferListingSettings, publisher_name: &str, current: &Resource) -> Value {
    json!({
        "resourceType": "AzureListing",
        "summary": settings.summary,
        "listingUris": settings.listing_uris,
        "listingContacts": settings.listing_contacts,
        "languageCode": "en-us",
        "title": settings.title,
        "description": settings.description,
        "shortDescription": settings.short_description,
        "publisherName": publisher_name,
        "keywords": settings.keywords,
        "@odata.etag": current.odata_etag,
        "id": current.id,
    })
}
