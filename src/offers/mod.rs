//! Offer types and the implementations behind them

pub mod cloud_partner;
pub mod offer_loader;
pub mod virtual_machine;

pub use cloud_partner::CloudPartnerClient;
pub use offer_loader::{OfferLoader, OfferType};
pub use virtual_machine::VirtualMachineOffer;
