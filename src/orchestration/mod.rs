//! Orchestration layer for offer publishing
//!
//! This module sequences the configuration setters into the offer, plan and
//! submission workflows behind each CLI command.

pub mod context;
pub mod offer_publisher;
pub mod plan;
pub mod submission;

// Re-export main types for convenience
pub use context::{ContextOptions, PublishContext};
pub use offer_publisher::OfferPublisher;
pub use plan::PlanPublisher;
pub use submission::{Submissions, status_of};
