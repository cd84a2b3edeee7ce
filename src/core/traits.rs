//! Core traits and types for offer publishing
//!
//! This module defines the command surface every offer type implements and
//! the result types shared by validation and status reporting.

use crate::core::error::{PublishError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Validation
// ============================================================================

/// Validation error with field information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// Validation warning with field information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

/// Result of validating local publishing inputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl ValidationResult {
    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Set `valid` from the collected errors
    pub fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }
}

// ============================================================================
// Status
// ============================================================================

/// Readiness of an offer's latest submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferStatus {
    #[serde(rename = "are-resources-ready")]
    pub are_resources_ready: bool,
    pub state: String,
    pub substate: String,
}

impl OfferStatus {
    /// The offer exists but was never submitted
    pub fn not_submitted() -> Self {
        Self {
            are_resources_ready: false,
            state: "Not-Submitted".to_string(),
            substate: "Draft".to_string(),
        }
    }

    /// The offer could not be looked up
    pub fn unknown_product() -> Self {
        Self {
            are_resources_ready: false,
            state: "Not-Found".to_string(),
            substate: "Unknown Product Id".to_string(),
        }
    }
}

// ============================================================================
// Offer Commands Trait
// ============================================================================

/// Commands available for an offer
///
/// Implementations exist per API surface: the ingestion API backs managed
/// applications, solution templates and containers, the Cloud Partner Portal
/// backs virtual machines. Plan commands default to
/// [`PublishError::UnsupportedOperation`].
///
/// # Examples
///
/// ```no_run
/// use marketplace_publisher::core::OfferCommands;
///
/// # async fn example(offer: &mut dyn OfferCommands) -> marketplace_publisher::core::Result<()> {
/// offer.create(true).await?;
/// let submission = offer.publish(None).await?;
/// println!("{}", submission);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait OfferCommands: Send + Sync {
    /// Offer type short name (e.g., "ma", "vm")
    fn offer_type(&self) -> &str;

    /// Offer name, also its marketplace offer id
    fn name(&self) -> &str;

    /// Create the offer and apply the local configuration
    ///
    /// With `update_if_exists` an existing offer is updated instead of
    /// failing with [`PublishError::AlreadyExists`].
    async fn create(&mut self, update_if_exists: bool) -> Result<Value>;

    /// Apply the local configuration to an existing offer
    async fn update(&mut self) -> Result<Value>;

    async fn show(&mut self) -> Result<Value>;

    /// All offers of this type
    async fn list(&mut self) -> Result<Value>;

    async fn delete(&mut self) -> Result<()>;

    /// Submit the current drafts for preview
    async fn publish(&mut self, notification_emails: Option<&str>) -> Result<Value>;

    /// Promote the latest submission to production
    async fn release(&mut self) -> Result<Value>;

    async fn status(&mut self) -> Result<Value>;

    async fn plan_create(&mut self, _plan_name: &str, _update_if_exists: bool) -> Result<Value> {
        Err(self.unsupported("plan create"))
    }

    async fn plan_update(&mut self, _plan_name: &str) -> Result<Value> {
        Err(self.unsupported("plan update"))
    }

    async fn plan_show(&mut self, _plan_name: &str) -> Result<Value> {
        Err(self.unsupported("plan show"))
    }

    async fn plan_list(&mut self) -> Result<Value> {
        Err(self.unsupported("plan list"))
    }

    async fn plan_delete(&mut self, _plan_name: &str) -> Result<()> {
        Err(self.unsupported("plan delete"))
    }

    async fn plan_publish(
        &mut self,
        _plan_name: &str,
        _notification_emails: Option<&str>,
    ) -> Result<Value> {
        Err(self.unsupported("plan publish"))
    }

    fn unsupported(&self, operation: &str) -> PublishError {
        PublishError::UnsupportedOperation {
            operation: operation.to_string(),
            offer_type: self.offer_type().to_string(),
        }
    }
}
