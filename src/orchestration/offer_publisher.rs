//! Offer Publisher - drives managed application, solution template and
//! container offers through the Partner Center ingestion API
//!
//! Manages the publishing workflow:
//! - Offer lookup by its `AzureOfferId` external id
//! - Local file checks before any request
//! - Offer settings (properties, listing, logos, preview audience, reseller)
//! - Plan creation and update for offer types that carry plans
//! - Submission, promotion and status
//! - State tracking (created, configured, submitted, promoted)

use crate::confs::{
    Listing, ListingImage, ProductAvailability, ProductContext, Properties, ResellerChannelState,
    ResellerConfiguration,
};
use crate::core::config::ListingConfig;
use crate::core::error::{PublishError, Result};
use crate::core::state_machine::{OfferState, OfferStateMachine};
use crate::core::traits::{OfferCommands, OfferStatus};
use crate::ingestion::{DraftResolver, IngestionClient, Product};
use crate::offers::OfferType;
use crate::orchestration::context::PublishContext;
use crate::orchestration::plan::PlanPublisher;
use crate::orchestration::submission::Submissions;
use crate::validation::ListingValidator;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Ingestion-API offer
pub struct OfferPublisher {
    offer_type: OfferType,
    name: String,
    context: PublishContext,
    client: IngestionClient,
    drafts: DraftResolver,
    state_machine: OfferStateMachine,
    product_id: Option<String>,
}

impl OfferPublisher {
    /// Fails with `TokenMissing` when no Partner Center token is configured
    pub fn new(offer_type: OfferType, name: &str, context: PublishContext) -> Result<Self> {
        let (client, drafts) = context.ingestion()?;

        Ok(Self {
            offer_type,
            name: name.to_string(),
            context,
            client,
            drafts,
            state_machine: OfferStateMachine::new(),
            product_id: None,
        })
    }

    pub fn state_machine(&self) -> &OfferStateMachine {
        &self.state_machine
    }

    /// Product body for `POST products`
    pub fn product_body(&self) -> Value {
        json!({
            "resourceType": self.offer_type.resource_type(),
            "name": self.name,
            "externalIDs": [{"type": "AzureOfferId", "value": self.name}],
            "isModularPublishing": true,
        })
    }

    /// Product registered under this offer's name
    pub async fn find_product(&self) -> Result<Product> {
        let filter = format!(
            "ExternalIDs/Any(i:i/Type eq 'AzureOfferId' and i/Value eq '{}')",
            self.name
        );

        self.client
            .list_products(&filter)
            .await?
            .value
            .into_iter()
            .find(|p| p.name.as_deref() == Some(self.name.as_str()))
            .ok_or_else(|| PublishError::NotFound {
                resource: self.offer_type.resource_type().to_string(),
                name: self.name.clone(),
            })
    }

    /// Product id, looked up once per instance
    async fn product_id(&mut self) -> Result<String> {
        if let Some(id) = &self.product_id {
            return Ok(id.clone());
        }

        let product = self.find_product().await?;
        debug!(name = %self.name, product_id = %product.id, "offer found");
        self.state_machine.ensure_created(&product.id)?;
        self.product_id = Some(product.id.clone());
        Ok(product.id)
    }

    /// Check the listing config and local files before anything is sent
    fn checked_listing(&self, listing: &ListingConfig) -> Result<()> {
        let app_zip = self.context.app_zip().ok();
        let validator = ListingValidator::new();

        validator.check_files(
            listing,
            self.offer_type,
            &self.context.app_path,
            app_zip.as_deref(),
        )?;

        let result = validator.validate(
            listing,
            self.offer_type,
            &self.context.app_path,
            app_zip.as_deref(),
        );
        for warning in &result.warnings {
            warn!(field = %warning.field, "{}", warning.message);
        }
        if !result.valid {
            let message = result
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PublishError::InvalidConfig { message });
        }

        Ok(())
    }

    /// Plan named on the command line or manifest, else the first plan in the listing config
    fn plan_name<'l>(&'l self, listing: &'l ListingConfig) -> Option<&'l str> {
        self.context
            .plan_name(None)
            .or_else(|| listing.plan(None).and_then(|p| p.plan_name.as_deref()))
    }

    fn require_plans(&self, operation: &str) -> Result<()> {
        if self.offer_type.has_plans() {
            Ok(())
        } else {
            Err(self.unsupported(operation))
        }
    }

    fn transition(&mut self, to: OfferState, key: &str, value: &str) -> Result<()> {
        let mut metadata = HashMap::new();
        metadata.insert(key.to_string(), Value::String(value.to_string()));
        self.state_machine.transition(to, Some(metadata))
    }
}

#[async_trait]
impl OfferCommands for OfferPublisher {
    fn offer_type(&self) -> &str {
        self.offer_type.as_str()
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&mut self, update_if_exists: bool) -> Result<Value> {
        let listing = self.context.listing_config().await?;
        self.checked_listing(&listing)?;

        let created = match self.client.create_product(&self.product_body()).await {
            Ok(created) => created,
            Err(PublishError::Api { status, message }) if status == 400 || status == 409 => {
                if update_if_exists {
                    info!(name = %self.name, "offer exists, updating");
                    return self.update().await;
                }
                debug!(status, %message, "product create rejected");
                return Err(PublishError::AlreadyExists {
                    resource: self.offer_type.resource_type().to_string(),
                    name: self.name.clone(),
                });
            }
            Err(e) => return Err(e),
        };

        let product_id = created
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PublishError::Api {
                status: 200,
                message: "product create response carries no id".to_string(),
            })?
            .to_string();
        info!(name = %self.name, %product_id, "offer created");

        self.transition(OfferState::Created, "product_id", &product_id)?;
        self.product_id = Some(product_id);

        self.update().await?;
        Ok(created)
    }

    async fn update(&mut self) -> Result<Value> {
        let listing = self.context.listing_config().await?;
        self.checked_listing(&listing)?;

        let product_id = self.product_id().await?;
        let ctx = ProductContext::new(&self.client, &self.drafts, &product_id);

        Properties::new(ctx)
            .set(&listing.property_settings, listing.app_version())
            .await?;

        let offer_listing = Listing::new(ctx);
        offer_listing
            .set(&listing.offer_listing, self.context.config.publisher_name())
            .await?;

        if let Some(logos) = &listing.offer_listing.listing_logos {
            let listing_id = offer_listing.get().await?.id;
            let images = ListingImage::new(ctx, &listing_id);
            for (image_type, file) in logos.by_type() {
                images.set(&self.context.app_file(file), image_type).await?;
            }
        }

        ProductAvailability::new(ctx)
            .set(&listing.preview_audience.subscriptions)
            .await?;

        ResellerConfiguration::new(&self.client, &product_id)
            .set(ResellerChannelState::Disabled.as_str())
            .await?;

        if self.offer_type.has_plans() {
            let plan_name = self.plan_name(&listing).ok_or_else(|| PublishError::InvalidConfig {
                message: "no plan name: pass --plan-name, set plan_name in manifest.yml or in plan_overview"
                    .to_string(),
            })?;
            PlanPublisher::new(ctx, &self.context, self.offer_type)
                .create(plan_name, &listing, true)
                .await?;
        }

        self.transition(OfferState::Configured, "product_id", &product_id)?;
        info!(name = %self.name, %product_id, "offer configured");

        self.show().await
    }

    async fn show(&mut self) -> Result<Value> {
        let product = self.find_product().await?;
        self.state_machine.ensure_created(&product.id)?;
        self.product_id = Some(product.id.clone());
        Ok(serde_json::to_value(product)?)
    }

    async fn list(&mut self) -> Result<Value> {
        self.client
            .list_products_raw(&format!(
                "ResourceType eq '{}'",
                self.offer_type.resource_type()
            ))
            .await
    }

    async fn delete(&mut self) -> Result<()> {
        let product_id = self.product_id().await?;
        self.client.delete_product(&product_id).await?;
        info!(name = %self.name, %product_id, "offer deleted");
        self.product_id = None;
        Ok(())
    }

    async fn publish(&mut self, notification_emails: Option<&str>) -> Result<Value> {
        if let Some(emails) = notification_emails {
            debug!(emails, "notification emails are managed in Partner Center for this offer type");
        }

        let product_id = self.product_id().await?;
        let submission = Submissions::new(&self.client, &self.drafts, &product_id)
            .create()
            .await?;

        let submission_id = submission
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PublishError::Api {
                status: 200,
                message: "submission create response carries no id".to_string(),
            })?
            .to_string();
        self.transition(OfferState::Submitted, "submission_id", &submission_id)?;

        Ok(submission)
    }

    async fn release(&mut self) -> Result<Value> {
        let product_id = self.product_id().await?;
        let (submission_id, promoted) = Submissions::new(&self.client, &self.drafts, &product_id)
            .promote()
            .await?;

        if self.state_machine.get_state() != OfferState::Submitted {
            self.transition(OfferState::Submitted, "submission_id", &submission_id)?;
        }
        self.transition(OfferState::Promoted, "submission_id", &submission_id)?;

        Ok(promoted)
    }

    async fn status(&mut self) -> Result<Value> {
        let product_id = match self.product_id().await {
            Ok(id) => id,
            Err(PublishError::NotFound { .. }) => {
                return Ok(serde_json::to_value(OfferStatus::unknown_product())?);
            }
            Err(e) => return Err(e),
        };

        let status = Submissions::new(&self.client, &self.drafts, &product_id)
            .status()
            .await?;
        Ok(serde_json::to_value(status)?)
    }

    async fn plan_create(&mut self, plan_name: &str, update_if_exists: bool) -> Result<Value> {
        self.require_plans("plan create")?;
        let listing = self.context.listing_config().await?;
        self.checked_listing(&listing)?;

        let product_id = self.product_id().await?;
        let ctx = ProductContext::new(&self.client, &self.drafts, &product_id);
        PlanPublisher::new(ctx, &self.context, self.offer_type)
            .create(plan_name, &listing, update_if_exists)
            .await
    }

    async fn plan_update(&mut self, plan_name: &str) -> Result<Value> {
        self.require_plans("plan update")?;
        let listing = self.context.listing_config().await?;
        self.checked_listing(&listing)?;

        let product_id = self.product_id().await?;
        let ctx = ProductContext::new(&self.client, &self.drafts, &product_id);
        PlanPublisher::new(ctx, &self.context, self.offer_type)
            .update(plan_name, &listing)
            .await
    }

    async fn plan_show(&mut self, plan_name: &str) -> Result<Value> {
        self.require_plans("plan show")?;
        let product_id = self.product_id().await?;
        let ctx = ProductContext::new(&self.client, &self.drafts, &product_id);
        PlanPublisher::new(ctx, &self.context, self.offer_type)
            .show(plan_name)
            .await
    }

    async fn plan_list(&mut self) -> Result<Value> {
        self.require_plans("plan list")?;
        let product_id = self.product_id().await?;
        let ctx = ProductContext::new(&self.client, &self.drafts, &product_id);
        PlanPublisher::new(ctx, &self.context, self.offer_type)
            .list()
            .await
    }

    async fn plan_delete(&mut self, plan_name: &str) -> Result<()> {
        self.require_plans("plan delete")?;
        let product_id = self.product_id().await?;
        let ctx = ProductContext::new(&self.client, &self.drafts, &product_id);
        PlanPublisher::new(ctx, &self.context, self.offer_type)
            .delete(plan_name)
            .await
    }

    async fn plan_publish(
        &mut self,
        plan_name: &str,
        notification_emails: Option<&str>,
    ) -> Result<Value> {
        self.plan_show(plan_name).await?;
        self.publish(notification_emails).await
    }
}
