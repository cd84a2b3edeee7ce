//! Configuration setters
//!
//! Each setter follows the same round-trip: resolve the module's draft
//! instance, fetch the current settings (for the `@odata.etag` and `id`),
//! build a body from local configuration and PUT it back with `If-Match`.

pub mod listing;
pub mod listing_image;
pub mod product_availability;
pub mod properties;
pub mod reseller;
pub mod variant;

pub use listing::Listing;
pub use listing_image::ListingImage;
pub use product_availability::ProductAvailability;
pub use properties::Properties;
pub use reseller::{ResellerChannelState, ResellerConfiguration};
pub use variant::{FeatureAvailability, OfferListing, Package, PackageType};

use crate::core::error::{PublishError, Result};
use crate::ingestion::{DraftResolver, IngestionClient, ListResponse, Resource};
use serde_json::Value;

/// Everything a setter needs to reach one product
#[derive(Debug, Clone, Copy)]
pub struct ProductContext<'a> {
    pub client: &'a IngestionClient,
    pub drafts: &'a DraftResolver,
    pub product_id: &'a str,
}

impl<'a> ProductContext<'a> {
    pub fn new(client: &'a IngestionClient, drafts: &'a DraftResolver, product_id: &'a str) -> Self {
        Self {
            client,
            drafts,
            product_id,
        }
    }

    /// `products/{product_id}/{suffix}`
    pub fn path(&self, suffix: &str) -> String {
        format!("products/{}/{}", self.product_id, suffix)
    }

    /// Resolve the module's draft instance and fetch its settings
    ///
    /// `variant_id` selects the plan-level draft instead of the offer-level one.
    pub async fn instance_settings(
        &self,
        module: &str,
        collection: &str,
        variant_id: Option<&str>,
        expand: Option<&str>,
    ) -> Result<Resource> {
        let instance_id = match variant_id {
            Some(variant_id) => {
                self.drafts
                    .variant_draft(self.product_id, variant_id, module)
                    .await?
            }
            None => self.drafts.offer_draft(self.product_id, module).await?,
        };

        let path = self.path(&format!(
            "{}/getByInstanceID(instanceID={})",
            collection, instance_id
        ));
        let list: ListResponse<Resource> = match expand {
            Some(expand) => {
                self.client
                    .get_with_query(&path, &[("$expand", expand)])
                    .await?
            }
            None => self.client.get(&path).await?,
        };

        list.value
            .into_iter()
            .next()
            .ok_or_else(|| PublishError::NotFound {
                resource: format!("{} settings", module),
                name: instance_id,
            })
    }

    /// PUT a settings body back to `{collection}/{id}` with the current etag
    pub async fn put_settings(
        &self,
        collection: &str,
        current: &Resource,
        body: &Value,
        expand: Option<&str>,
    ) -> Result<Value> {
        let mut path = self.path(&format!("{}/{}", collection, current.id));
        if let Some(expand) = expand {
            path.push_str("?$expand=");
            path.push_str(expand);
        }

        self.client.put(&path, current.etag()?, body).await
    }
}

/// Turn an API rejection whose message mentions `needle` into a config error
pub(crate) fn reject_as_config_error(error: PublishError, needle: &str) -> PublishError {
    if error.message_contains(needle) {
        PublishError::InvalidConfig {
            message: error.to_string(),
        }
    } else {
        error
    }
}
