//! Draft instance resolution
//!
//! Every configuration module of an offer (Listing, Property, Package,
//! Availability, ...) is edited through a server-side draft instance. The
//! Branches API maps a module name to the current draft; right after an offer
//! or plan is created the list can still be empty, so lookups are retried.

use crate::core::error::{PublishError, Result};
use crate::core::retry::{RetryManager, RetryOptions};
use crate::ingestion::client::IngestionClient;
use crate::ingestion::models::Branch;
use std::collections::HashMap;
use tracing::debug;

/// Attempts for offer-level lookups (first call + 5 retries)
pub const OFFER_DRAFT_ATTEMPTS: u32 = 6;

/// Attempts for variant-level lookups (first call + 3 retries)
pub const VARIANT_DRAFT_ATTEMPTS: u32 = 4;

/// Branch entry that belongs to the test drive, never to a plan
const TEST_DRIVE_VARIANT: &str = "testdrive";

/// Resolves module names to draft instance ids
#[derive(Debug, Clone)]
pub struct DraftResolver {
    client: IngestionClient,
    retry: RetryOptions,
}

impl DraftResolver {
    /// `retry` provides the delays; attempt budgets are fixed per lookup kind
    pub fn new(client: IngestionClient, retry: RetryOptions) -> Self {
        Self { client, retry }
    }

    /// Draft instance id of an offer-level module
    pub async fn offer_draft(&self, product_id: &str, module: &str) -> Result<String> {
        let branches = self
            .non_empty_branches(product_id, module, OFFER_DRAFT_ATTEMPTS)
            .await?;

        branches
            .into_iter()
            .next()
            .and_then(|b| b.current_draft_instance_id)
            .ok_or_else(|| PublishError::NotFound {
                resource: format!("{} draft instance", module),
                name: product_id.to_string(),
            })
    }

    /// Draft instance id of a plan-level module
    pub async fn variant_draft(
        &self,
        product_id: &str,
        variant_id: &str,
        module: &str,
    ) -> Result<String> {
        let mut index = self.variant_drafts(product_id, module).await?;

        index
            .remove(variant_id)
            .ok_or_else(|| PublishError::NotFound {
                resource: format!("{} draft instance for plan", module),
                name: variant_id.to_string(),
            })
    }

    /// Draft instance ids of a module for every plan, keyed by variant id
    pub async fn variant_drafts(
        &self,
        product_id: &str,
        module: &str,
    ) -> Result<HashMap<String, String>> {
        let branches = self
            .non_empty_branches(product_id, module, VARIANT_DRAFT_ATTEMPTS)
            .await?;

        Ok(index_by_variant(branches))
    }

    async fn non_empty_branches(
        &self,
        product_id: &str,
        module: &str,
        attempts: u32,
    ) -> Result<Vec<Branch>> {
        let manager = RetryManager::new(self.retry.with_max_attempts(attempts));
        let operation = format!("draft instance lookup for {}", module);
        let client = &self.client;

        manager
            .poll(&operation, || async move {
                let branches = client.branches_by_module(product_id, module).await?;
                debug!(product_id, module, count = branches.len(), "branches");
                Ok((!branches.is_empty()).then_some(branches))
            })
            .await
    }
}

/// Variant id → draft instance id, skipping offer-level and test drive entries
fn index_by_variant(branches: Vec<Branch>) -> HashMap<String, String> {
    branches
        .into_iter()
        .filter_map(|branch| {
            let variant_id = branch.variant_id?;
            if variant_id == TEST_DRIVE_VARIANT {
                return None;
            }
            Some((variant_id, branch.current_draft_instance_id?))
        })
        .collect()
}
