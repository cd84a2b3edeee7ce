pub mod confs;
pub mod core;
pub mod ingestion;
pub mod offers;
pub mod orchestration;
pub mod security;
pub mod validation;

pub use core::*;
pub use offers::{OfferLoader, OfferType};
pub use orchestration::{ContextOptions, OfferPublisher, PublishContext};
pub use security::SecureTokenManager;
