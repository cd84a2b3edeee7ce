pub mod token_manager;

pub use token_manager::{CLOUD_PARTNER, PARTNER_CENTER, SecureTokenManager};
