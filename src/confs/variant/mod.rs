//! Plan-level configuration setters

pub mod feature_availability;
pub mod offer_listing;
pub mod package;

pub use feature_availability::FeatureAvailability;
pub use offer_listing::OfferListing;
pub use package::{Package, PackageType, inject_product_id};
