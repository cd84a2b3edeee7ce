//! Partner Center ingestion API plumbing

pub mod client;
pub mod draft;
pub mod models;
pub mod upload;

pub use client::IngestionClient;
pub use draft::{DraftResolver, OFFER_DRAFT_ATTEMPTS, VARIANT_DRAFT_ATTEMPTS};
pub use models::{Branch, ListResponse, Product, Resource, Submission, UploadRecord, Variant};
pub use upload::upload_to_sas;
