//! Offer Loader - maps an offer type to the implementation that publishes it
//!
//! Managed applications, solution templates and containers go through the
//! Partner Center ingestion API; virtual machines through the legacy Cloud
//! Partner Portal API.
//!
//! # Example
//!
//! ```no_run
//! use marketplace_publisher::offers::{OfferLoader, OfferType};
//! use marketplace_publisher::orchestration::{ContextOptions, PublishContext};
//!
//! # async fn example() -> marketplace_publisher::core::Result<()> {
//! let context = PublishContext::load(ContextOptions::default()).await?;
//! let mut offer = OfferLoader::load(OfferType::ManagedApplication, "contoso-app", context)?;
//!
//! println!("{}", offer.show().await?);
//! # Ok(())
//! # }
//! ```

use crate::confs::PackageType;
use crate::core::error::{PublishError, Result};
use crate::core::traits::OfferCommands;
use crate::offers::virtual_machine::VirtualMachineOffer;
use crate::orchestration::context::PublishContext;
use crate::orchestration::offer_publisher::OfferPublisher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Offer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferType {
    #[serde(rename = "ma")]
    ManagedApplication,
    #[serde(rename = "st")]
    SolutionTemplate,
    #[serde(rename = "co")]
    Container,
    #[serde(rename = "vm")]
    VirtualMachine,
}

impl OfferType {
    /// Short name used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferType::ManagedApplication => "ma",
            OfferType::SolutionTemplate => "st",
            OfferType::Container => "co",
            OfferType::VirtualMachine => "vm",
        }
    }

    /// Product `resourceType` in the ingestion API
    pub fn resource_type(&self) -> &'static str {
        match self {
            OfferType::ManagedApplication | OfferType::SolutionTemplate => "AzureApplication",
            OfferType::Container => "AzureContainer",
            OfferType::VirtualMachine => "AzureThirdPartyVirtualMachine",
        }
    }

    /// Variant `SubType` for offer types that carry plans
    pub fn plan_subtype(&self) -> Option<&'static str> {
        match self {
            OfferType::ManagedApplication => Some("managed-application"),
            OfferType::SolutionTemplate => Some("solution-template"),
            _ => None,
        }
    }

    pub fn package_type(&self) -> Option<PackageType> {
        match self {
            OfferType::ManagedApplication => Some(PackageType::ManagedApplication),
            OfferType::SolutionTemplate => Some(PackageType::SolutionTemplate),
            _ => None,
        }
    }

    pub fn has_plans(&self) -> bool {
        self.plan_subtype().is_some()
    }
}

impl fmt::Display for OfferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferType {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ma" | "managed-application" | "managedapp" => Ok(OfferType::ManagedApplication),
            "st" | "solution-template" | "solutiontemplate" => Ok(OfferType::SolutionTemplate),
            "co" | "container" => Ok(OfferType::Container),
            "vm" | "virtual-machine" | "virtualmachine" => Ok(OfferType::VirtualMachine),
            other => Err(PublishError::InvalidConfig {
                message: format!("unknown offer type '{}', expected one of ma, st, co, vm", other),
            }),
        }
    }
}

/// Builds the command implementation for an offer type
pub struct OfferLoader;

impl OfferLoader {
    /// Create the offer implementation for `offer_type`
    ///
    /// Fails with `TokenMissing` when the API the offer type needs has no token.
    pub fn load(
        offer_type: OfferType,
        name: &str,
        context: PublishContext,
    ) -> Result<Box<dyn OfferCommands>> {
        match offer_type {
            OfferType::VirtualMachine => Ok(Box::new(VirtualMachineOffer::new(name, context)?)),
            _ => Ok(Box::new(OfferPublisher::new(offer_type, name, context)?)),
        }
    }
}
