//! Reseller (Cloud Solution Provider) channel configuration

use crate::core::error::{PublishError, Result};
use crate::ingestion::IngestionClient;
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Whether CSP partners may resell the offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResellerChannelState {
    PartialOptIn,
    Disabled,
    Enabled,
}

impl ResellerChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PartialOptIn => "PartialOptIn",
            Self::Disabled => "Disabled",
            Self::Enabled => "Enabled",
        }
    }
}

impl fmt::Display for ResellerChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResellerChannelState {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PartialOptIn" => Ok(Self::PartialOptIn),
            "Disabled" => Ok(Self::Disabled),
            "Enabled" => Ok(Self::Enabled),
            other => Err(PublishError::InvalidResellerState {
                state: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResellerConfiguration<'a> {
    client: &'a IngestionClient,
    product_id: &'a str,
}

impl<'a> ResellerConfiguration<'a> {
    pub fn new(client: &'a IngestionClient, product_id: &'a str) -> Self {
        Self { client, product_id }
    }

    fn path(&self) -> String {
        format!("products/{}/resellerConfiguration", self.product_id)
    }

    pub async fn get(&self) -> Result<Value> {
        self.client.get(&self.path()).await
    }

    /// Set the channel state; unknown states are rejected before any request
    pub async fn set(&self, state: &str) -> Result<Value> {
        let state: ResellerChannelState = state.parse()?;

        let updated = self
            .client
            .post(
                &self.path(),
                &json!({
                    "resourceType": "ResellerConfiguration",
                    "resellerChannelState": state.as_str(),
                    "tenantIds": [],
                }),
            )
            .await?;

        info!(product_id = self.product_id, %state, "reseller configuration updated");
        Ok(updated)
    }
}
