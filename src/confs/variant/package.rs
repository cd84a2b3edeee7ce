//! Plan technical configuration (application package)
//!
//! Publishing a package:
//!
//! 1. stamp the product id into `mainTemplate.json` (partner usage tracking)
//! 2. register the package and upload the zip to its SAS URI
//! 3. mark it `Uploaded` and wait until Partner Center reports `Processed`
//! 4. point the plan's package configuration at the new package

use crate::confs::{ProductContext, reject_as_config_error};
use crate::core::config::TechnicalConfiguration;
use crate::core::error::{PublishError, Result};
use crate::core::retry::{RetryManager, RetryOptions};
use crate::ingestion::{Resource, UploadRecord, upload_to_sas};
use regex::Regex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const MODULE: &str = "Package";
const TEMPLATE_FILE: &str = "mainTemplate.json";
const PID_PATTERN: &str = r#"pid-([^"\s]*)-partnercenter"#;

/// Status polls before giving up on package processing
pub const PACKAGE_POLL_ATTEMPTS: u32 = 60;

/// Lower bound for the processing wait; large packages take minutes
const PACKAGE_PROCESSING_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const STATE_PROCESSED: &str = "Processed";
const STATE_PROCESS_FAILED: &str = "ProcessFailed";

/// Kind of application package attached to a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    ManagedApplication,
    SolutionTemplate,
}

impl PackageType {
    fn configuration_resource_type(&self) -> &'static str {
        match self {
            Self::ManagedApplication => "AzureManagedApplicationPackageConfiguration",
            Self::SolutionTemplate => "AzureSolutionTemplatePackageConfiguration",
        }
    }
}

/// Principal granted access to managed application resources
#[derive(Debug, Clone, PartialEq)]
struct PublisherAuthorization {
    tenant_id: String,
    principal_id: String,
    role_definition_id: String,
}

impl PublisherAuthorization {
    /// Environment first (AZURE_TENANT_ID, AZURE_CLIENT_ID or ACCESS_ID,
    /// ACCESS_OWNER), then the plan's technical configuration
    fn resolve(technical: &TechnicalConfiguration, env: &HashMap<String, String>) -> Result<Self> {
        let from_env = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| env.get(*k).filter(|v| !v.is_empty()).cloned())
        };
        let first = technical.authorizations.first();

        let missing = |field: &str| PublishError::InvalidConfig {
            message: format!(
                "technical_configuration.{} is required for managed application plans",
                field
            ),
        };

        Ok(Self {
            tenant_id: from_env(&["AZURE_TENANT_ID"])
                .or_else(|| technical.tenant_id.clone())
                .ok_or_else(|| missing("tenant_id"))?,
            principal_id: from_env(&["AZURE_CLIENT_ID", "ACCESS_ID"])
                .or_else(|| first.map(|a| a.id.clone()))
                .ok_or_else(|| missing("authorizations[0].id"))?,
            role_definition_id: from_env(&["ACCESS_OWNER"])
                .or_else(|| first.map(|a| a.role.clone()))
                .ok_or_else(|| missing("authorizations[0].role"))?,
        })
    }
}

/// Technical configuration of one plan
#[derive(Debug, Clone)]
pub struct Package<'a> {
    ctx: ProductContext<'a>,
    variant_id: &'a str,
    package_type: PackageType,
    poll: RetryOptions,
}

impl<'a> Package<'a> {
    /// `retry` provides the delays for status polling
    pub fn new(
        ctx: ProductContext<'a>,
        variant_id: &'a str,
        package_type: PackageType,
        retry: &RetryOptions,
    ) -> Self {
        let mut poll = retry.with_max_attempts(PACKAGE_POLL_ATTEMPTS);
        poll.timeout = poll.timeout.map(|t| t.max(PACKAGE_PROCESSING_TIMEOUT));

        Self {
            ctx,
            variant_id,
            package_type,
            poll,
        }
    }

    /// Current package configuration of the plan
    pub async fn get(&self) -> Result<Resource> {
        self.ctx
            .instance_settings(
                MODULE,
                "packageConfigurations",
                Some(self.variant_id),
                None,
            )
            .await
    }

    /// Upload `zip_path` and attach it to the plan
    pub async fn set(
        &self,
        zip_path: &Path,
        technical: &TechnicalConfiguration,
        env: &HashMap<String, String>,
    ) -> Result<Value> {
        if !zip_path.is_file() {
            return Err(PublishError::FileNotFound {
                path: zip_path.display().to_string(),
                what: "application package".to_string(),
            });
        }

        let authorization = match self.package_type {
            PackageType::ManagedApplication => Some(PublisherAuthorization::resolve(technical, env)?),
            PackageType::SolutionTemplate => None,
        };

        inject_product_id(zip_path.to_path_buf(), self.ctx.product_id.to_string()).await?;

        let package_id = self.upload(zip_path).await?;
        self.wait_until_processed(&package_id).await?;

        let current = self.get().await?;
        let body = self.configuration_body(&package_id, technical, authorization.as_ref(), &current);

        let updated = self
            .ctx
            .put_settings("packageConfigurations", &current, &body, None)
            .await
            .map_err(|e| reject_as_config_error(e, "Enter a valid GUID"))?;

        info!(variant_id = self.variant_id, %package_id, "technical configuration updated");
        Ok(updated)
    }

    /// Register, upload and commit the zip; returns the package id
    async fn upload(&self, zip_path: &Path) -> Result<String> {
        let file_name = zip_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("package.zip");

        let pending: UploadRecord = self
            .ctx
            .client
            .post(
                &self.ctx.path("packages"),
                &json!({
                    "resourceType": "AzureApplicationPackage",
                    "fileName": file_name,
                }),
            )
            .await?;

        let sas_uri = pending
            .file_sas_uri
            .as_deref()
            .ok_or_else(|| PublishError::NotFound {
                resource: "upload URL for package".to_string(),
                name: pending.id.clone(),
            })?;
        upload_to_sas(self.ctx.client.http(), sas_uri, zip_path).await?;

        let etag = pending.etag()?;
        let _: Value = self
            .ctx
            .client
            .put(
                &self.ctx.path(&format!("packages/{}", pending.id)),
                etag,
                &json!({
                    "resourceType": "AzureApplicationPackage",
                    "fileName": file_name,
                    "fileSasUri": sas_uri,
                    "State": "Uploaded",
                    "@odata.etag": etag,
                    "id": pending.id,
                }),
            )
            .await?;

        info!(package_id = %pending.id, file_name, "package uploaded");
        Ok(pending.id)
    }

    async fn wait_until_processed(&self, package_id: &str) -> Result<UploadRecord> {
        let manager = RetryManager::new(self.poll.clone());
        let client = self.ctx.client;
        let path = self.ctx.path(&format!("packages/{}", package_id));
        let path = path.as_str();

        manager
            .poll("package processing", || async move {
                let record: UploadRecord = client.get(path).await?;
                match record.state.as_deref() {
                    Some(STATE_PROCESSED) => Ok(Some(record)),
                    Some(STATE_PROCESS_FAILED) => Err(PublishError::PackageProcessingFailed {
                        state: STATE_PROCESS_FAILED.to_string(),
                    }),
                    state => {
                        debug!(package_id, ?state, "package not processed yet");
                        Ok(None)
                    }
                }
            })
            .await
    }

    fn configuration_body(
        &self,
        package_id: &str,
        technical: &TechnicalConfiguration,
        authorization: Option<&PublisherAuthorization>,
        current: &Resource,
    ) -> Value {
        let mut body = json!({
            "resourceType": self.package_type.configuration_resource_type(),
            "version": technical.version,
            "packageReferences": [{
                "type": "AzureApplicationPackage",
                "value": package_id,
            }],
            "@odata.etag": current.odata_etag,
            "id": current.id,
        });

        if let Some(authorization) = authorization {
            let managed = json!({
                "allowJitAccess": technical.allow_jit_access,
                "canEnableCustomerActions": true,
                "allowedCustomerActions": technical.allowed_customer_actions,
                "allowedDataActions": technical.allowed_data_actions,
                "deploymentMode": "Incremental",
                "publicAzureTenantID": authorization.tenant_id,
                "publicAzureAuthorizations": [{
                    "principalID": authorization.principal_id,
                    "roleDefinitionID": authorization.role_definition_id,
                }],
                "azureGovernmentTenantID": null,
                "azureGovernmentAuthorizations": [],
                "policies": technical.policy_settings,
            });
            if let (Some(body), Some(managed)) = (body.as_object_mut(), managed.as_object()) {
                body.extend(managed.clone());
            }
        }

        body
    }
}

/// Rewrite the partner usage id in `mainTemplate.json` to `pid-{product_id}-partnercenter`
///
/// The archive is rewritten through a temporary file next to it and renamed
/// into place. Returns whether anything changed.
pub async fn inject_product_id(zip_path: PathBuf, product_id: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || rewrite_template(&zip_path, &product_id))
        .await
        .map_err(|e| PublishError::Io(std::io::Error::other(e)))?
}

fn rewrite_template(zip_path: &Path, product_id: &str) -> Result<bool> {
    let pattern = Regex::new(PID_PATTERN).map_err(|e| PublishError::InvalidConfig {
        message: e.to_string(),
    })?;
    let replacement = format!("pid-{}-partnercenter", product_id);

    let mut archive = ZipArchive::new(File::open(zip_path)?)?;
    let tmp_path = zip_path.with_extension("zip.tmp");
    let changed = match copy_with_template(&mut archive, &tmp_path, &pattern, &replacement) {
        Ok(changed) => changed,
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_file(&tmp_path) {
                debug!(tmp = %tmp_path.display(), error = %cleanup, "temporary archive not removed");
            }
            return Err(e);
        }
    };

    if changed {
        std::fs::rename(&tmp_path, zip_path)?;
        info!(zip = %zip_path.display(), product_id, "stamped product id into {}", TEMPLATE_FILE);
    } else {
        std::fs::remove_file(&tmp_path)?;
        warn!(zip = %zip_path.display(), "no partner usage id found in {}", TEMPLATE_FILE);
    }

    Ok(changed)
}

/// Copy every entry to `tmp_path`, rewriting `mainTemplate.json` on the way
fn copy_with_template(
    archive: &mut ZipArchive<File>,
    tmp_path: &Path,
    pattern: &Regex,
    replacement: &str,
) -> Result<bool> {
    let mut writer = ZipWriter::new(File::create(tmp_path)?);
    let mut changed = false;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let is_template = !entry.is_dir()
            && Path::new(entry.name()).file_name().and_then(|n| n.to_str()) == Some(TEMPLATE_FILE);

        if !is_template {
            writer.raw_copy_file(entry)?;
            continue;
        }

        let mut contents = String::new();
        entry.read_to_string(&mut contents)?;
        let rewritten = pattern.replace_all(&contents, replacement);
        changed |= rewritten.as_ref() != contents.as_str();

        let options = SimpleFileOptions::default().compression_method(entry.compression());
        writer.start_file(entry.name().to_string(), options)?;
        writer.write_all(rewritten.as_bytes())?;
    }
    writer.finish()?;

    Ok(changed)
}
