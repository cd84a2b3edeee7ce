//! Plan pricing and availability
//!
//! Managed application plans are published free in the US market: the US
//! market state is enabled and a zero-price monthly schedule is attached.

use crate::confs::ProductContext;
use crate::core::config::PricingAndAvailability;
use crate::core::error::Result;
use crate::ingestion::Resource;
use serde_json::{Value, json};
use tracing::info;

const MODULE: &str = "Availability";
const EXPAND: &str = "MarketStates,Trial,PriceSchedules";

/// Market the free price schedule applies to
const FREE_MARKET: &str = "US";

#[derive(Debug, Clone, Copy)]
pub struct FeatureAvailability<'a> {
    ctx: ProductContext<'a>,
    variant_id: &'a str,
    managed_application: bool,
}

impl<'a> FeatureAvailability<'a> {
    /// `managed_application` adds the market and price schedule settings
    pub fn new(ctx: ProductContext<'a>, variant_id: &'a str, managed_application: bool) -> Self {
        Self {
            ctx,
            variant_id,
            managed_application,
        }
    }

    pub async fn get(&self) -> Result<Resource> {
        self.ctx
            .instance_settings(
                MODULE,
                "featureAvailabilities",
                Some(self.variant_id),
                Some(EXPAND),
            )
            .await
    }

    pub async fn set(&self, pricing: &PricingAndAvailability) -> Result<Value> {
        let current = self.get().await?;
        let body = availability_body(pricing, self.managed_application, &current);

        let updated = self
            .ctx
            .put_settings("featureavailabilities", &current, &body, Some(EXPAND))
            .await?;

        info!(
            variant_id = self.variant_id,
            visibility = %pricing.visibility,
            "pricing and availability updated"
        );
        Ok(updated)
    }
}

fn availability_body(
    pricing: &PricingAndAvailability,
    managed_application: bool,
    current: &Resource,
) -> Value {
    let mut body = json!({
        "resourceType": "FeatureAvailability",
        "visibility": pricing.visibility,
        "@odata.etag": current.odata_etag,
        "id": current.id,
    });

    if managed_application {
        body["marketStates"] = enable_market(current.field("marketStates"), FREE_MARKET);
        body["priceSchedules"] = json!([free_price_schedule(FREE_MARKET)]);
    }

    if pricing.visibility == "Private" {
        body["subscriptionAudiences"] = json!(pricing.azure_private_subscriptions);
    }

    body
}

/// Copy of the server's market states with `market` enabled
fn enable_market(states: Option<&Value>, market: &str) -> Value {
    let mut states = states
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    match states
        .iter_mut()
        .find(|s| s.get("marketCode").and_then(Value::as_str) == Some(market))
    {
        Some(state) => state["state"] = json!("Enabled"),
        None => states.push(json!({"marketCode": market, "state": "Enabled"})),
    }

    Value::Array(states)
}

fn free_price_schedule(market: &str) -> Value {
    json!({
        "isBaseSchedule": false,
        "marketCodes": [market],
        "friendlyName": format!("free_priceOverrideSchedule_{}", market),
        "schedules": [{
            "retailPrice": {"openPrice": 0, "currencyCode": "USD"},
            "priceCadence": {"type": "Month", "value": 1},
            "pricingModel": "Recurring",
        }],
    })
}
