//! Everything a command needs from the local files and environment

use crate::core::config::{ClientConfig, ListingConfig, Manifest};
use crate::core::config_loader::ConfigLoader;
use crate::core::error::{PublishError, Result};
use crate::core::retry::RetryOptions;
use crate::ingestion::{DraftResolver, IngestionClient};
use crate::security::{PARTNER_CENTER, SecureTokenManager};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where to find the local files; `None` fields fall back to the manifest
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub config_yml: PathBuf,
    pub manifest_yml: PathBuf,
    pub config_json: Option<PathBuf>,
    pub app_path: Option<PathBuf>,
    /// `--plan-name`; overrides the manifest's `plan_name`
    pub plan_name: Option<String>,
    pub env: HashMap<String, String>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            config_yml: PathBuf::from("config.yml"),
            manifest_yml: PathBuf::from("manifest.yml"),
            config_json: None,
            app_path: None,
            plan_name: None,
            env: HashMap::new(),
        }
    }
}

/// Loaded client settings, manifest and tokens
#[derive(Debug)]
pub struct PublishContext {
    pub config: ClientConfig,
    pub manifest: Manifest,
    pub app_path: PathBuf,
    pub env: HashMap<String, String>,
    pub tokens: SecureTokenManager,
    config_json: Option<PathBuf>,
    plan_name: Option<String>,
}

impl PublishContext {
    /// Load `config.yml` and `manifest.yml`
    ///
    /// The listing config is read lazily since `show`, `list` and `status`
    /// don't need it.
    pub async fn load(options: ContextOptions) -> Result<Self> {
        let config = ConfigLoader::load_client_config(&options.config_yml, &options.env).await?;

        let validation = ConfigLoader::validate(&config);
        if !validation.valid {
            return Err(PublishError::InvalidConfig {
                message: ConfigLoader::format_validation_result(&validation),
            });
        }
        for warning in &validation.warnings {
            warn!(field = %warning.field, "{}", warning.message);
        }

        let manifest = ConfigLoader::load_manifest(&options.manifest_yml)
            .await?
            .unwrap_or_default();

        let app_path = options
            .app_path
            .or_else(|| manifest.app_path.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        debug!(app_path = %app_path.display(), "publish context loaded");

        let tokens = SecureTokenManager::new(&config, &options.env);

        Ok(Self {
            config,
            manifest,
            app_path,
            env: options.env,
            tokens,
            config_json: options.config_json,
            plan_name: options.plan_name,
        })
    }

    /// Path of the listing config JSON
    ///
    /// `--config-json` wins; otherwise the manifest's `json_listing_config`
    /// relative to the app path.
    pub fn listing_config_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config_json {
            return Ok(path.clone());
        }

        self.manifest
            .json_listing_config
            .as_ref()
            .map(|name| self.app_path.join(name))
            .ok_or_else(|| PublishError::InvalidConfig {
                message: "no listing config: pass --config-json or set json_listing_config in manifest.yml"
                    .to_string(),
            })
    }

    pub async fn listing_config(&self) -> Result<ListingConfig> {
        ConfigLoader::load_listing_config(&self.listing_config_path()?).await
    }

    /// Application package zip named by the manifest
    pub fn app_zip(&self) -> Result<PathBuf> {
        self.manifest
            .app
            .as_ref()
            .map(|app| self.app_path.join(app))
            .ok_or_else(|| PublishError::InvalidConfig {
                message: "manifest.yml does not name the application package (app)".to_string(),
            })
    }

    /// File relative to the app path
    pub fn app_file(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.app_path.join(path)
        }
    }

    /// Plan named by the caller, else on the command line, else in the manifest
    pub fn plan_name<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested
            .or(self.plan_name.as_deref())
            .or(self.manifest.plan_name.as_deref())
    }

    pub fn retry_options(&self) -> RetryOptions {
        self.config.retry_options()
    }

    /// Ingestion API client and draft resolver sharing one connection pool
    pub fn ingestion(&self) -> Result<(IngestionClient, DraftResolver)> {
        let token = self.tokens.require_token(PARTNER_CENTER)?;
        let client = IngestionClient::new(self.config.ingestion_url(), token)?;
        let drafts = DraftResolver::new(client.clone(), self.retry_options());
        Ok((client, drafts))
    }
}
