//! Secure token manager with memory-safe handling and masking capabilities
//!
//! This module resolves the bearer tokens for the two marketplace APIs, using
//! the `secrecy` crate to prevent accidental token exposure in logs or memory dumps.

use crate::core::config::ClientConfig;
use crate::core::config_loader::{ENV_ACCESS_TOKEN, ENV_CLOUD_PARTNER_TOKEN};
use crate::core::error::{PublishError, Result};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

/// Partner Center ingestion API
pub const PARTNER_CENTER: &str = "partner-center";

/// Legacy Cloud Partner Portal API
pub const CLOUD_PARTNER: &str = "cloud-partner";

/// Supported services with their environment variable names
const SERVICE_TOKENS: &[(&str, &str)] = &[
    (PARTNER_CENTER, ENV_ACCESS_TOKEN),
    (CLOUD_PARTNER, ENV_CLOUD_PARTNER_TOKEN),
];

/// Secure token manager for marketplace API authentication
///
/// Tokens come from the environment first and `config.yml` second.
///
/// # Examples
///
/// ```
/// use marketplace_publisher::core::ClientConfig;
/// use marketplace_publisher::security::{SecureTokenManager, PARTNER_CENTER};
/// use secrecy::ExposeSecret;
/// use std::collections::HashMap;
///
/// let env = HashMap::from([
///     ("AZPC_ACCESS_TOKEN".to_string(), "eyJ0eXAiOiJKV1QiLCJhbGciOi".to_string()),
/// ]);
/// let manager = SecureTokenManager::new(&ClientConfig::default(), &env);
/// let token = manager.get_token(PARTNER_CENTER).unwrap();
/// assert_eq!(manager.mask_token(token.expose_secret()), "eyJ...iOi");
/// ```
#[derive(Default)]
pub struct SecureTokenManager {
    tokens: HashMap<&'static str, SecretString>,
}

impl std::fmt::Debug for SecureTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureTokenManager")
            .field("services", &self.tokens.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SecureTokenManager {
    /// Resolve every supported service's token from `env`, then `config`
    pub fn new(config: &ClientConfig, env: &HashMap<String, String>) -> Self {
        let mut tokens = HashMap::new();

        for (service, env_name) in SERVICE_TOKENS {
            let from_env = env
                .get(*env_name)
                .filter(|v| !v.is_empty())
                .map(|v| SecretString::new(v.clone().into()));
            let from_config = match *service {
                PARTNER_CENTER => config.access_token.as_ref(),
                _ => config.cloud_partner_token.as_ref(),
            }
            .map(|t| SecretString::new(t.expose_secret().into()));

            if let Some(token) = from_env.or(from_config) {
                tokens.insert(*service, token);
            }
        }

        Self { tokens }
    }

    /// Manager holding a single, already resolved token
    pub fn with_token(service: &'static str, token: &SecretString) -> Self {
        let tokens = HashMap::from([(service, SecretString::new(token.expose_secret().into()))]);
        Self { tokens }
    }

    /// Retrieves the token for the specified service
    ///
    /// Returns `None` if the service is unknown or no token is configured.
    pub fn get_token(&self, service: &str) -> Option<SecretString> {
        self.tokens
            .get(service)
            .map(|t| SecretString::new(t.expose_secret().into()))
    }

    /// Same as [`get_token`](Self::get_token), failing with `TokenMissing`
    pub fn require_token(&self, service: &str) -> Result<SecretString> {
        self.get_token(service)
            .ok_or_else(|| PublishError::TokenMissing {
                service: service.to_string(),
            })
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    ///
    /// # Examples
    ///
    /// ```
    /// use marketplace_publisher::security::SecureTokenManager;
    ///
    /// let manager = SecureTokenManager::default();
    /// assert_eq!(manager.mask_token("abcdef123456"), "abc...456");
    /// assert_eq!(manager.mask_token("short"), "****");
    /// ```
    pub fn mask_token(&self, token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() < 10 {
            return "****".to_string();
        }

        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Masks all known tokens in a string
    ///
    /// Used on API error bodies and debug output before they are logged.
    pub fn mask_tokens_in_string(&self, text: &str) -> String {
        let mut masked = text.to_string();

        for token in self.tokens.values() {
            let token_str = token.expose_secret();
            if token_str.is_empty() {
                continue;
            }
            if let Ok(regex) = Regex::new(&regex::escape(token_str)) {
                let masked_token = self.mask_token(token_str);
                masked = regex
                    .replace_all(&masked, masked_token.as_str())
                    .to_string();
            }
        }

        masked
    }
}
