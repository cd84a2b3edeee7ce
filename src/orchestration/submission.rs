//! Submissions - move an offer's draft instances to preview and production

use crate::core::error::{PublishError, Result};
use crate::core::traits::OfferStatus;
use crate::ingestion::{DraftResolver, IngestionClient, Submission};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{debug, info};

/// Offer-level modules included in every submission
pub const OFFER_MODULES: &[&str] = &["Availability", "Property", "Package", "Listing", "Cosell"];

/// Plan-level modules included for every active plan
pub const VARIANT_MODULES: &[&str] = &["Availability", "Package", "Listing"];

/// Submission operations for one product
#[derive(Debug, Clone, Copy)]
pub struct Submissions<'a> {
    client: &'a IngestionClient,
    drafts: &'a DraftResolver,
    product_id: &'a str,
}

impl<'a> Submissions<'a> {
    pub fn new(client: &'a IngestionClient, drafts: &'a DraftResolver, product_id: &'a str) -> Self {
        Self {
            client,
            drafts,
            product_id,
        }
    }

    /// Build the `SubmissionCreationRequest` for the current drafts
    pub async fn request_body(&self) -> Result<Value> {
        let mut resources = Vec::with_capacity(OFFER_MODULES.len() + 1);
        for module in OFFER_MODULES {
            let instance_id = self.drafts.offer_draft(self.product_id, module).await?;
            resources.push(json!({"type": module, "value": instance_id}));
        }
        resources.push(json!({
            "type": "ResellerConfiguration",
            "value": format!("{}-ResellerInstance", self.product_id),
        }));

        let variants = self.client.list_variants(self.product_id).await?;
        let active: Vec<String> = variants
            .value
            .into_iter()
            .filter(|v| v.is_active())
            .map(|v| v.id)
            .collect();

        let mut variant_resources = Vec::with_capacity(active.len());
        if !active.is_empty() {
            let mut indexes: HashMap<&str, HashMap<String, String>> = HashMap::new();
            for module in VARIANT_MODULES {
                indexes.insert(module, self.drafts.variant_drafts(self.product_id, module).await?);
            }

            for variant_id in &active {
                let mut resources = Vec::with_capacity(VARIANT_MODULES.len());
                for module in VARIANT_MODULES {
                    let instance_id = indexes
                        .get(module)
                        .and_then(|index| index.get(variant_id))
                        .ok_or_else(|| PublishError::NotFound {
                            resource: format!("{} draft instance for plan", module),
                            name: variant_id.clone(),
                        })?;
                    resources.push(json!({"type": module, "value": instance_id}));
                }
                variant_resources.push(json!({
                    "variantID": variant_id,
                    "resources": resources,
                }));
            }
        }
        debug!(product_id = self.product_id, plans = active.len(), "submission request built");

        Ok(json!({
            "resourceType": "SubmissionCreationRequest",
            "targets": [{"type": "Scope", "value": "preview"}],
            "resources": resources,
            "variantResources": variant_resources,
        }))
    }

    /// Submit the current drafts for preview
    pub async fn create(&self) -> Result<Value> {
        let body = self.request_body().await?;
        let response = self.client.create_submission(self.product_id, &body).await?;

        let submission_id = response.get("id").and_then(|id| id.as_str()).unwrap_or_default();
        info!(product_id = self.product_id, submission_id, "submission created");
        Ok(response)
    }

    /// Most recent submission, `None` when the offer was never submitted
    pub async fn latest(&self) -> Result<Option<Submission>> {
        Ok(self
            .client
            .list_submissions(self.product_id)
            .await?
            .into_iter()
            .next())
    }

    /// Promote the most recent submission to production
    pub async fn promote(&self) -> Result<(String, Value)> {
        let submission = self.latest().await?.ok_or_else(|| PublishError::NotFound {
            resource: "submission".to_string(),
            name: self.product_id.to_string(),
        })?;

        let response = self
            .client
            .promote_submission(self.product_id, &submission.id)
            .await?;
        info!(product_id = self.product_id, submission_id = %submission.id, "submission promoted");

        Ok((submission.id, response))
    }

    pub async fn status(&self) -> Result<OfferStatus> {
        Ok(self
            .latest()
            .await?
            .map(|s| status_of(&s))
            .unwrap_or_else(OfferStatus::not_submitted))
    }
}

/// Readiness summary of a submission record
pub fn status_of(submission: &Submission) -> OfferStatus {
    OfferStatus {
        are_resources_ready: submission
            .fields
            .get("areResourcesReady")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        state: submission.state.clone().unwrap_or_default(),
        substate: submission.substate.clone().unwrap_or_default(),
    }
}
