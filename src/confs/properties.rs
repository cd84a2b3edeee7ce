//! Offer properties (categories, industries, terms of use)

use crate::confs::ProductContext;
use crate::core::config::PropertySettings;
use crate::core::error::Result;
use crate::ingestion::Resource;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

const MODULE: &str = "Property";
const COLLECTION: &str = "properties";

#[derive(Debug, Clone, Copy)]
pub struct Properties<'a> {
    ctx: ProductContext<'a>,
}

impl<'a> Properties<'a> {
    pub fn new(ctx: ProductContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn get(&self) -> Result<Resource> {
        self.ctx
            .instance_settings(MODULE, COLLECTION, None, None)
            .await
    }

    /// Replace the property settings
    ///
    /// `app_version` is the version of the offer's first plan.
    pub async fn set(&self, settings: &PropertySettings, app_version: Option<&str>) -> Result<Value> {
        let current = self.get().await?;
        let body = properties_body(settings, app_version, &current);

        let updated = self
            .ctx
            .put_settings(COLLECTION, &current, &body, None)
            .await?;

        info!(
            product_id = self.ctx.product_id,
            categories = ?settings.category,
            "properties updated"
        );
        Ok(updated)
    }
}

fn properties_body(settings: &PropertySettings, app_version: Option<&str>, current: &Resource) -> Value {
    // Fields not managed locally keep their server-side value
    let terms_of_use = settings
        .terms_of_use
        .as_deref()
        .or_else(|| current.str_field("termsOfUse"));
    let app_version = app_version.or_else(|| current.str_field("appVersion"));

    json!({
        "resourceType": "AzureProperty",
        "industries": settings.industries,
        "categories": settings.category,
        "leveledCategories": settings.leveled_categories.clone().unwrap_or_else(|| json!({})),
        "submissionVersion": Uuid::new_v4().to_string(),
        "productTags": settings.product_tags,
        "appVersion": app_version,
        "useEnterpriseContract": settings.use_enterprise_contract,
        "termsOfUse": terms_of_use,
        "globalAmendmentTerms": null,
        "customAmendments": [],
        "@odata.etag": current.odata_etag,
        "id": current.id,
    })
}
