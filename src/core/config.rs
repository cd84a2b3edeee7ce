//! Configuration structures for marketplace-publisher
//!
//! Three files drive every command:
//!
//! * `config.yml` - client settings (publisher, tokens, endpoints)
//! * `manifest.yml` - where the application package and listing config live
//! * the listing config JSON - offer, plan and package settings

use crate::core::retry::RetryOptions;
use secrecy::SecretString;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Partner Center ingestion API
pub const DEFAULT_INGESTION_URL: &str = "https://api.partner.microsoft.com/v1.0/ingestion";

/// Legacy Cloud Partner Portal API
pub const DEFAULT_CLOUD_PARTNER_URL: &str = "https://cloudpartner.azure.com";

// ============================================================================
// config.yml
// ============================================================================

/// Client settings loaded from `config.yml`
///
/// Tokens are wrapped in [`SecretString`] so they never show up in `Debug`
/// output or logs.
#[derive(Debug, Default, Deserialize)]
pub struct ClientConfig {
    /// Azure AD tenant of the publisher account
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Publisher id on the Cloud Partner Portal (vm offers)
    #[serde(default)]
    pub publisher_id: Option<String>,

    /// Display name used for listings and lead generation ids
    #[serde(default)]
    pub publisher_name: Option<String>,

    /// Bearer token for the ingestion API
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub access_token: Option<SecretString>,

    /// Bearer token for the Cloud Partner Portal API
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub cloud_partner_token: Option<SecretString>,

    /// Override for the ingestion API base URL
    #[serde(default)]
    pub ingestion_url: Option<String>,

    /// Override for the Cloud Partner Portal base URL
    #[serde(default)]
    pub cloud_partner_url: Option<String>,

    /// Delay settings shared by every retry loop
    #[serde(default)]
    pub retry: Option<RetrySettings>,
}

impl ClientConfig {
    pub fn ingestion_url(&self) -> &str {
        self.ingestion_url.as_deref().unwrap_or(DEFAULT_INGESTION_URL)
    }

    pub fn cloud_partner_url(&self) -> &str {
        self.cloud_partner_url
            .as_deref()
            .unwrap_or(DEFAULT_CLOUD_PARTNER_URL)
    }

    pub fn publisher_name(&self) -> &str {
        self.publisher_name.as_deref().unwrap_or("publisher_name")
    }

    /// Base retry options; call sites pick their own attempt budget
    pub fn retry_options(&self) -> RetryOptions {
        let defaults = RetryOptions::default();
        let Some(settings) = &self.retry else {
            return defaults;
        };

        RetryOptions {
            max_attempts: defaults.max_attempts,
            initial_delay: settings
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            max_delay: settings
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            backoff_multiplier: settings
                .backoff_multiplier
                .unwrap_or(defaults.backoff_multiplier),
            timeout: match settings.timeout_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.timeout,
            },
        }
    }
}

/// `retry` section of `config.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_multiplier: Option<f64>,
    /// 0 disables the overall timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .filter(|s| !s.is_empty())
        .map(|s| SecretString::new(s.into())))
}

// ============================================================================
// manifest.yml
// ============================================================================

/// Package manifest loaded from `manifest.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// File name of the application package zip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,

    /// Directory holding the zip, logos and listing config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_path: Option<String>,

    /// File name of the listing config JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_listing_config: Option<String>,

    /// Plan created together with the offer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,

    /// Offer type (ma, st, co, vm) when not given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_type: Option<String>,
}

// ============================================================================
// Listing config JSON
// ============================================================================

/// Offer, plan and package settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_type: Option<String>,

    #[serde(default)]
    pub property_settings: PropertySettings,

    #[serde(default)]
    pub offer_listing: OfferListingSettings,

    #[serde(default)]
    pub preview_audience: PreviewAudience,

    #[serde(default)]
    pub plan_overview: PlanOverview,

    /// Raw offer definition for the Cloud Partner Portal (vm offers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_definition: Option<Value>,
}

impl ListingConfig {
    /// Plan settings by name, falling back to the first plan
    pub fn plan(&self, plan_name: Option<&str>) -> Option<&PlanSettings> {
        self.plan_overview.find(plan_name)
    }

    /// Version of the first plan's technical configuration
    pub fn app_version(&self) -> Option<&str> {
        self.plan(None)
            .and_then(|p| p.technical_configuration.version.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertySettings {
    #[serde(default)]
    pub industries: Vec<String>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub category: Vec<String>,

    #[serde(default)]
    pub product_tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_of_use: Option<String>,

    #[serde(default = "default_true")]
    pub use_enterprise_contract: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leveled_categories: Option<Value>,
}

impl Default for PropertySettings {
    fn default() -> Self {
        Self {
            industries: Vec::new(),
            category: Vec::new(),
            product_tags: Vec::new(),
            terms_of_use: None,
            use_enterprise_contract: true,
            leveled_categories: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Accept `"category": "analytics"` as well as `"category": ["analytics"]`
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OfferListingSettings {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub listing_uris: Vec<Value>,
    #[serde(default)]
    pub listing_contacts: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_logos: Option<ListingLogos>,
}

/// Logo file names, relative to the app path
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingLogos {
    pub logo_large: String,
    pub logo_medium: String,
    pub logo_small: String,
    pub logo_wide: String,
}

impl ListingLogos {
    /// Logo files paired with their Partner Center image type
    pub fn by_type(&self) -> [(&'static str, &str); 4] {
        [
            ("AzureLogoLarge", self.logo_large.as_str()),
            ("AzureLogoSmall", self.logo_small.as_str()),
            ("AzureLogoMedium", self.logo_medium.as_str()),
            ("AzureLogoWide", self.logo_wide.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PreviewAudience {
    #[serde(default)]
    pub subscriptions: Vec<Value>,
}

/// `plan_overview` entries in file order
///
/// Accepts a list of plans or a map keyed by plan name. Map keys fill in
/// `plan_name` when the entry does not carry one.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct PlanOverview(Vec<PlanSettings>);

impl PlanOverview {
    /// Plan by name; the first plan only when no name is given
    pub fn find(&self, plan_name: Option<&str>) -> Option<&PlanSettings> {
        match plan_name {
            Some(name) => self
                .0
                .iter()
                .find(|p| p.plan_name.as_deref() == Some(name)),
            None => self.0.first(),
        }
    }

    pub fn plans(&self) -> &[PlanSettings] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for PlanOverview {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PlansVisitor;

        impl<'de> Visitor<'de> for PlansVisitor {
            type Value = PlanOverview;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of plans or a map keyed by plan name")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut plans = Vec::new();
                while let Some(plan) = seq.next_element::<PlanSettings>()? {
                    plans.push(plan);
                }
                Ok(PlanOverview(plans))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut plans = Vec::new();
                while let Some((name, mut plan)) = map.next_entry::<String, PlanSettings>()? {
                    plan.plan_name.get_or_insert(name);
                    plans.push(plan);
                }
                Ok(PlanOverview(plans))
            }
        }

        deserializer.deserialize_any(PlansVisitor)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,

    /// Passed through to the plan listing resource as is
    #[serde(default)]
    pub plan_listing: serde_json::Map<String, Value>,

    #[serde(default)]
    pub pricing_and_availability: PricingAndAvailability,

    #[serde(default)]
    pub technical_configuration: TechnicalConfiguration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingAndAvailability {
    #[serde(default = "default_plan_visibility")]
    pub visibility: String,
    #[serde(default)]
    pub azure_private_subscriptions: Vec<Value>,
}

impl Default for PricingAndAvailability {
    fn default() -> Self {
        Self {
            visibility: default_plan_visibility(),
            azure_private_subscriptions: Vec::new(),
        }
    }
}

fn default_plan_visibility() -> String {
    "Private".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TechnicalConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub allow_jit_access: bool,
    #[serde(default)]
    pub policy_settings: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub authorizations: Vec<Authorization>,
    #[serde(
        default,
        rename = "allowedCustomerActions",
        skip_serializing_if = "Option::is_none"
    )]
    pub allowed_customer_actions: Option<String>,
    #[serde(
        default,
        rename = "allowedDataActions",
        skip_serializing_if = "Option::is_none"
    )]
    pub allowed_data_actions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Authorization {
    pub id: String,
    pub role: String,
}
