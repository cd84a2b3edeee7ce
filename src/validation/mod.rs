pub mod listing_validator;

pub use listing_validator::ListingValidator;
