//! Configuration file loader for marketplace-publisher
//!
//! This module provides configuration loading, environment overrides and
//! validation for `config.yml`, `manifest.yml` and the listing config JSON.

use super::config::*;
use crate::core::error::{PublishError, Result};
use regex::Regex;
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Environment variables that override `config.yml`
pub const ENV_ACCESS_TOKEN: &str = "AZPC_ACCESS_TOKEN";
pub const ENV_CLOUD_PARTNER_TOKEN: &str = "AZPC_CLOUD_PARTNER_TOKEN";
pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_PUBLISHER_ID: &str = "AZPC_PUBLISHER_ID";
pub const ENV_PUBLISHER_NAME: &str = "AZPC_PUBLISHER_NAME";
pub const ENV_INGESTION_URL: &str = "AZPC_INGESTION_URL";
pub const ENV_CLOUD_PARTNER_URL: &str = "AZPC_CLOUD_PARTNER_URL";

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "offer_listing.listing_logos.logo_large")
    pub field: String,

    /// Error message
    pub message: String,

    /// Expected type/value
    pub expected: Option<String>,

    /// Actual type/value
    pub actual: Option<String>,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load client settings
    ///
    /// Priority (high to low):
    /// 1. Environment variables
    /// 2. `config.yml` (with `${VAR}` references expanded)
    /// 3. Default values
    ///
    /// A missing `config.yml` is not an error; tokens may come from the
    /// environment alone.
    pub async fn load_client_config(
        path: &Path,
        env: &HashMap<String, String>,
    ) -> Result<ClientConfig> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).await?;
            let expanded = Self::expand_string(&content, env)?;
            serde_yaml::from_str::<Option<ClientConfig>>(&expanded)?.unwrap_or_default()
        } else {
            debug!(path = %path.display(), "config file not found, using environment only");
            ClientConfig::default()
        };

        Self::apply_env_overrides(&mut config, env);
        Ok(config)
    }

    /// Load `manifest.yml`, `None` when the file does not exist
    pub async fn load_manifest(path: &Path) -> Result<Option<Manifest>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await?;
        Ok(serde_yaml::from_str::<Option<Manifest>>(&content)?)
    }

    /// Load the listing config JSON
    pub async fn load_listing_config(path: &Path) -> Result<ListingConfig> {
        if !path.is_file() {
            return Err(PublishError::FileNotFound {
                path: path.display().to_string(),
                what: "listing configuration".to_string(),
            });
        }

        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(config: &mut ClientConfig, env: &HashMap<String, String>) {
        let non_empty = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

        if let Some(token) = non_empty(ENV_ACCESS_TOKEN) {
            config.access_token = Some(SecretString::new(token.into()));
        }
        if let Some(token) = non_empty(ENV_CLOUD_PARTNER_TOKEN) {
            config.cloud_partner_token = Some(SecretString::new(token.into()));
        }
        if let Some(tenant_id) = non_empty(ENV_TENANT_ID) {
            config.tenant_id = Some(tenant_id);
        }
        if let Some(publisher_id) = non_empty(ENV_PUBLISHER_ID) {
            config.publisher_id = Some(publisher_id);
        }
        if let Some(publisher_name) = non_empty(ENV_PUBLISHER_NAME) {
            config.publisher_name = Some(publisher_name);
        }
        if let Some(url) = non_empty(ENV_INGESTION_URL) {
            config.ingestion_url = Some(url);
        }
        if let Some(url) = non_empty(ENV_CLOUD_PARTNER_URL) {
            config.cloud_partner_url = Some(url);
        }
    }

    /// Expand `${VAR_NAME}` references
    ///
    /// Unknown variables are left in place.
    fn expand_string(input: &str, env: &HashMap<String, String>) -> Result<String> {
        let env_var_regex = Regex::new(ENV_VAR_PATTERN).map_err(|e| PublishError::InvalidConfig {
            message: e.to_string(),
        })?;

        let mut result = input.to_string();
        for cap in env_var_regex.captures_iter(input) {
            let var_name = &cap[1];

            if let Some(value) = env.get(var_name) {
                result = result.replace(&format!("${{{}}}", var_name), value);
            } else {
                warn!("environment variable {} not found", var_name);
            }
        }

        Ok(result)
    }

    /// Validate client settings
    pub fn validate(config: &ClientConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for (field, url) in [
            ("ingestion_url", config.ingestion_url()),
            ("cloud_partner_url", config.cloud_partner_url()),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "URL must be absolute".to_string(),
                    expected: Some("https://...".to_string()),
                    actual: Some(url.to_string()),
                });
            } else if url.starts_with("http://") {
                warnings.push(ConfigValidationWarning {
                    field: field.to_string(),
                    message: "Tokens would be sent over plain HTTP".to_string(),
                    suggestion: Some("Use https:// outside of local testing".to_string()),
                });
            }
        }

        if let Some(tenant_id) = &config.tenant_id
            && !is_guid(tenant_id)
        {
            errors.push(ConfigValidationError {
                field: "tenant_id".to_string(),
                message: "tenant_id must be a GUID".to_string(),
                expected: Some("xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx".to_string()),
                actual: Some(tenant_id.clone()),
            });
        }

        if config.access_token.is_none() {
            warnings.push(ConfigValidationWarning {
                field: "access_token".to_string(),
                message: "No ingestion API token configured".to_string(),
                suggestion: Some(format!("Set {} or access_token", ENV_ACCESS_TOKEN)),
            });
        }

        if config.publisher_name.is_none() {
            warnings.push(ConfigValidationWarning {
                field: "publisher_name".to_string(),
                message: "publisher_name is not set".to_string(),
                suggestion: Some("Listings and lead generation ids use a placeholder".to_string()),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
                if let (Some(expected), Some(actual)) = (&error.expected, &error.actual) {
                    lines.push(format!("    Expected: {}", expected));
                    lines.push(format!("    Actual: {}", actual));
                }
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

/// 8-4-4-4-12 hex digits
pub fn is_guid(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];

    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    const TENANT: &str = "72f988bf-86f1-41af-91ab-2d7cd011db47";

    #[tokio::test]
    async fn test_load_client_config_with_env_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yml");
        std::fs::write(
            &path,
            format!("tenant_id: {}\naccess_token: from-file\npublisher_name: Contoso\n", TENANT),
        )
        .unwrap();

        let mut env = HashMap::new();
        env.insert(ENV_ACCESS_TOKEN.to_string(), "from-env".to_string());

        let config = ConfigLoader::load_client_config(&path, &env).await.unwrap();

        assert_eq!(config.access_token.unwrap().expose_secret(), "from-env");
        assert_eq!(config.tenant_id.as_deref(), Some(TENANT));
        assert_eq!(config.publisher_name.as_deref(), Some("Contoso"));
    }

    #[tokio::test]
    async fn test_load_client_config_expands_variables() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yml");
        std::fs::write(&path, "access_token: ${PC_TOKEN}\npublisher_id: ${MISSING_VAR}\n").unwrap();

        let mut env = HashMap::new();
        env.insert("PC_TOKEN".to_string(), "expanded-token".to_string());

        let config = ConfigLoader::load_client_config(&path, &env).await.unwrap();

        assert_eq!(config.access_token.unwrap().expose_secret(), "expanded-token");
        assert_eq!(config.publisher_id.as_deref(), Some("${MISSING_VAR}"));
    }

    #[tokio::test]
    async fn test_missing_config_file_uses_env() {
        let temp_dir = TempDir::new().unwrap();
        let mut env = HashMap::new();
        env.insert(ENV_INGESTION_URL.to_string(), "http://localhost:8080".to_string());

        let config = ConfigLoader::load_client_config(&temp_dir.path().join("config.yml"), &env)
            .await
            .unwrap();

        assert_eq!(config.ingestion_url(), "http://localhost:8080");
        assert!(config.access_token.is_none());
    }

    #[tokio::test]
    async fn test_empty_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yml");
        std::fs::write(&path, "").unwrap();

        let config = ConfigLoader::load_client_config(&path, &HashMap::new())
            .await
            .unwrap();

        assert!(config.tenant_id.is_none());
    }

    #[tokio::test]
    async fn test_load_manifest_missing() {
        let temp_dir = TempDir::new().unwrap();

        let manifest = ConfigLoader::load_manifest(&temp_dir.path().join("manifest.yml"))
            .await
            .unwrap();

        assert!(manifest.is_none());
    }

    #[tokio::test]
    async fn test_load_listing_config_not_found() {
        let temp_dir = TempDir::new().unwrap();

        let result =
            ConfigLoader::load_listing_config(&temp_dir.path().join("listing_config.json")).await;

        assert!(matches!(result, Err(PublishError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_load_listing_config_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("listing_config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = ConfigLoader::load_listing_config(&path).await;

        assert!(matches!(result, Err(PublishError::Json(_))));
    }

    #[test]
    fn test_validate_rejects_bad_tenant() {
        let config = ClientConfig {
            tenant_id: Some("contoso.onmicrosoft.com".to_string()),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "tenant_id");
    }

    #[test]
    fn test_validate_warns_on_plain_http_and_missing_token() {
        let config = ClientConfig {
            tenant_id: Some(TENANT.to_string()),
            publisher_name: Some("Contoso".to_string()),
            ingestion_url: Some("http://localhost:9000".to_string()),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);

        assert!(result.valid);
        assert_eq!(result.warnings.len(), 2);
        let formatted = ConfigLoader::format_validation_result(&result);
        assert!(formatted.contains("[ingestion_url]"));
        assert!(formatted.contains("[access_token]"));
    }

    #[test]
    fn test_is_guid() {
        assert!(is_guid(TENANT));
        assert!(!is_guid("72f988bf-86f1-41af-91ab"));
        assert!(!is_guid("zzzzzzzz-86f1-41af-91ab-2d7cd011db47"));
    }
}
