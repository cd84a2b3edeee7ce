//! Plans (variants) of managed application and solution template offers

use crate::confs::{FeatureAvailability, OfferListing, Package, ProductContext};
use crate::core::config::{ListingConfig, PlanSettings};
use crate::core::error::{PublishError, Result};
use crate::core::retry::RetryManager;
use crate::ingestion::Variant;
use crate::offers::OfferType;
use crate::orchestration::context::PublishContext;
use serde_json::{Value, json};
use tracing::info;

/// Attempts for `POST variants`; new offers sometimes reject it for a while
pub const PLAN_CREATE_ATTEMPTS: u32 = 5;

/// Plan operations for one product
pub struct PlanPublisher<'a> {
    ctx: ProductContext<'a>,
    context: &'a PublishContext,
    offer_type: OfferType,
}

impl<'a> PlanPublisher<'a> {
    pub fn new(ctx: ProductContext<'a>, context: &'a PublishContext, offer_type: OfferType) -> Self {
        Self {
            ctx,
            context,
            offer_type,
        }
    }

    /// Variant whose `externalID` is `plan_name`
    pub async fn find(&self, plan_name: &str) -> Result<Variant> {
        self.ctx
            .client
            .list_variants(self.ctx.product_id)
            .await?
            .value
            .into_iter()
            .find(|v| v.external_id.as_deref() == Some(plan_name))
            .ok_or_else(|| PublishError::NotFound {
                resource: "plan".to_string(),
                name: plan_name.to_string(),
            })
    }

    /// `AzureSkuVariant` creation body
    pub fn create_body(&self, plan_name: &str) -> Value {
        let mut body = json!({
            "resourceType": "AzureSkuVariant",
            "state": "Active",
            "friendlyName": plan_name.replace('-', " "),
            "leadGenID": format!("{}.{}", self.context.config.publisher_name(), plan_name),
            "externalID": plan_name,
            "cloudAvailabilities": ["public-azure"],
        });
        if let Some(subtype) = self.offer_type.plan_subtype() {
            body["SubType"] = json!(subtype);
        }
        body
    }

    /// Create the plan and apply its settings
    pub async fn create(
        &self,
        plan_name: &str,
        listing: &ListingConfig,
        update_if_exists: bool,
    ) -> Result<Value> {
        match self.find(plan_name).await {
            Ok(existing) if update_if_exists => {
                info!(plan_name, variant_id = %existing.id, "plan exists, updating");
                return self.apply(&existing.id, self.settings(plan_name, listing)?).await;
            }
            Ok(_) => {
                return Err(PublishError::AlreadyExists {
                    resource: "plan".to_string(),
                    name: plan_name.to_string(),
                });
            }
            Err(PublishError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let settings = self.settings(plan_name, listing)?;
        let body = self.create_body(plan_name);
        let manager = RetryManager::new(
            self.context
                .retry_options()
                .with_max_attempts(PLAN_CREATE_ATTEMPTS),
        );
        let client = self.ctx.client;
        let product_id = self.ctx.product_id;
        let body = &body;

        let created = manager
            .retry("plan create", || async move {
                client.create_variant(product_id, body).await
            })
            .await?;

        let variant_id = created
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PublishError::Api {
                status: 200,
                message: "variant create response carries no id".to_string(),
            })?
            .to_string();
        info!(plan_name, %variant_id, "plan created");

        self.apply(&variant_id, settings).await?;
        Ok(created)
    }

    /// Apply listing, pricing and technical configuration to an existing plan
    pub async fn update(&self, plan_name: &str, listing: &ListingConfig) -> Result<Value> {
        let variant = self.find(plan_name).await?;
        self.apply(&variant.id, self.settings(plan_name, listing)?)
            .await
    }

    pub async fn show(&self, plan_name: &str) -> Result<Value> {
        Ok(serde_json::to_value(self.find(plan_name).await?)?)
    }

    pub async fn list(&self) -> Result<Value> {
        self.ctx.client.list_variants_raw(self.ctx.product_id).await
    }

    pub async fn delete(&self, plan_name: &str) -> Result<()> {
        let variant = self.find(plan_name).await?;
        self.ctx
            .client
            .delete_variant(self.ctx.product_id, &variant.id)
            .await?;
        info!(plan_name, variant_id = %variant.id, "plan deleted");
        Ok(())
    }

    fn settings<'l>(&self, plan_name: &str, listing: &'l ListingConfig) -> Result<&'l PlanSettings> {
        listing
            .plan(Some(plan_name))
            .ok_or_else(|| PublishError::InvalidConfig {
                message: format!("listing config has no plan_overview entry for '{}'", plan_name),
            })
    }

    async fn apply(&self, variant_id: &str, plan: &PlanSettings) -> Result<Value> {
        OfferListing::new(self.ctx, variant_id)
            .set(&plan.plan_listing)
            .await?;

        FeatureAvailability::new(
            self.ctx,
            variant_id,
            self.offer_type == OfferType::ManagedApplication,
        )
        .set(&plan.pricing_and_availability)
        .await?;

        let Some(package_type) = self.offer_type.package_type() else {
            return Ok(json!({"id": variant_id}));
        };
        let zip = self.context.app_zip()?;
        let retry = self.context.retry_options();
        Package::new(self.ctx, variant_id, package_type, &retry)
            .set(&zip, &plan.technical_configuration, &self.context.env)
            .await
    }
}
