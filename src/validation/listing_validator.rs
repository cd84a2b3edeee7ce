//! Listing Validator - Checks the local inputs of an offer before publishing
//!
//! Everything here runs without network access: required listing fields,
//! logo and package files on disk, plan settings and the technical
//! configuration version (semver).
//!
//! # Example
//!
//! ```
//! use marketplace_publisher::core::ListingConfig;
//! use marketplace_publisher::offers::OfferType;
//! use marketplace_publisher::validation::ListingValidator;
//! use std::path::Path;
//!
//! let listing = ListingConfig::default();
//! let validator = ListingValidator::new();
//! let result = validator.validate(&listing, OfferType::Container, Path::new("."), None);
//!
//! assert!(!result.valid); // no title
//! ```

use crate::core::config::ListingConfig;
use crate::core::error::{PublishError, Result};
use crate::core::traits::ValidationResult;
use crate::offers::OfferType;
use semver::Version;
use std::path::{Path, PathBuf};

/// A file the offer needs on disk
#[derive(Debug, Clone, PartialEq)]
struct RequiredFile {
    field: String,
    what: String,
    path: PathBuf,
}

/// Validator for listing configs
pub struct ListingValidator;

impl Default for ListingValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingValidator {
    pub fn new() -> Self {
        Self
    }

    /// Report every problem found in the listing config and local files
    ///
    /// `app_zip` is the package named by the manifest, if any.
    pub fn validate(
        &self,
        listing: &ListingConfig,
        offer_type: OfferType,
        app_path: &Path,
        app_zip: Option<&Path>,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();

        if offer_type == OfferType::VirtualMachine {
            if listing.offer_definition.is_none() {
                result.error("offer_definition", "Virtual machine offers need an offer_definition");
            }
            return result.finish();
        }

        let offer_listing = &listing.offer_listing;
        if offer_listing.title.trim().is_empty() {
            result.error("offer_listing.title", "Title is required");
        }
        if offer_listing.summary.trim().is_empty() {
            result.warning("offer_listing.summary", "Summary is empty");
        }
        if offer_listing.keywords.is_empty() {
            result.warning("offer_listing.keywords", "No search keywords set");
        }
        if offer_listing.listing_logos.is_none() {
            result.warning("offer_listing.listing_logos", "No logos configured");
        }
        if listing.property_settings.category.is_empty() {
            result.warning("property_settings.category", "No category set");
        }

        if offer_type.has_plans() {
            self.validate_plans(listing, offer_type, app_zip, &mut result);
        }

        for file in self.required_files(listing, offer_type, app_path, app_zip) {
            if !file.path.is_file() {
                result.error(
                    file.field,
                    format!("{} not found: {}", file.what, file.path.display()),
                );
            }
        }

        result.finish()
    }

    /// Fail with the first missing local file
    ///
    /// Run before any API call so a bad path never leaves an offer half updated.
    pub fn check_files(
        &self,
        listing: &ListingConfig,
        offer_type: OfferType,
        app_path: &Path,
        app_zip: Option<&Path>,
    ) -> Result<()> {
        if offer_type.has_plans() && !listing.plan_overview.is_empty() && app_zip.is_none() {
            return Err(PublishError::InvalidConfig {
                message: "manifest.yml does not name the application package (app)".to_string(),
            });
        }

        match self
            .required_files(listing, offer_type, app_path, app_zip)
            .into_iter()
            .find(|file| !file.path.is_file())
        {
            Some(missing) => Err(PublishError::FileNotFound {
                path: missing.path.display().to_string(),
                what: missing.what,
            }),
            None => Ok(()),
        }
    }

    fn validate_plans(
        &self,
        listing: &ListingConfig,
        offer_type: OfferType,
        app_zip: Option<&Path>,
        result: &mut ValidationResult,
    ) {
        if listing.plan_overview.is_empty() {
            result.error("plan_overview", "At least one plan is required");
            return;
        }
        if app_zip.is_none() {
            result.error("app", "manifest.yml does not name the application package");
        }

        let Some(plan) = listing.plan(None) else {
            return;
        };
        let technical = &plan.technical_configuration;

        match technical.version.as_deref() {
            None => result.error(
                "technical_configuration.version",
                "Package version is required",
            ),
            Some(version) => {
                if let Err(e) = Version::parse(version) {
                    result.error(
                        "technical_configuration.version",
                        format!("'{}' is not a semantic version: {}", version, e),
                    );
                }
            }
        }

        if offer_type == OfferType::ManagedApplication {
            if technical.authorizations.is_empty() {
                result.warning(
                    "technical_configuration.authorizations",
                    "No authorizations; AZURE_CLIENT_ID and ACCESS_OWNER must be set",
                );
            }
            if technical.tenant_id.is_none() {
                result.warning(
                    "technical_configuration.tenant_id",
                    "No tenant id; AZURE_TENANT_ID must be set",
                );
            }
        }

        if plan.plan_listing.is_empty() {
            result.warning("plan_listing", "Plan listing is empty");
        }
    }

    fn required_files(
        &self,
        listing: &ListingConfig,
        offer_type: OfferType,
        app_path: &Path,
        app_zip: Option<&Path>,
    ) -> Vec<RequiredFile> {
        let mut files = Vec::new();

        if offer_type == OfferType::VirtualMachine {
            return files;
        }

        if let Some(logos) = &listing.offer_listing.listing_logos {
            for (image_type, name) in logos.by_type() {
                let path = Path::new(name);
                files.push(RequiredFile {
                    field: format!("offer_listing.listing_logos.{}", image_type),
                    what: format!("{} image", image_type),
                    path: if path.is_absolute() {
                        path.to_path_buf()
                    } else {
                        app_path.join(path)
                    },
                });
            }
        }

        if offer_type.has_plans()
            && !listing.plan_overview.is_empty()
            && let Some(zip) = app_zip
        {
            files.push(RequiredFile {
                field: "app".to_string(),
                what: "application package".to_string(),
                path: zip.to_path_buf(),
            });
        }

        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn listing(json: &str) -> ListingConfig {
        serde_json::from_str(json).unwrap()
    }

    const MA_LISTING: &str = r#"{
        "property_settings": {"category": "analytics"},
        "offer_listing": {
            "title": "Contoso App",
            "summary": "Does things",
            "keywords": ["contoso"],
            "listing_logos": {
                "logo_large": "large.png",
                "logo_medium": "medium.png",
                "logo_small": "small.png",
                "logo_wide": "wide.png"
            }
        },
        "plan_overview": [{
            "plan_name": "basic",
            "plan_listing": {"title": "Basic"},
            "technical_configuration": {
                "version": "1.0.0",
                "tenant_id": "72f988bf-86f1-41af-91ab-2d7cd011db47",
                "authorizations": [{"id": "p", "role": "r"}]
            }
        }]
    }"#;

    fn write_files(dir: &Path) {
        for name in ["large.png", "medium.png", "small.png", "wide.png", "app.zip"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
    }

    #[test]
    fn test_valid_managed_application() {
        let temp_dir = TempDir::new().unwrap();
        write_files(temp_dir.path());
        let zip = temp_dir.path().join("app.zip");

        let result = ListingValidator::new().validate(
            &listing(MA_LISTING),
            OfferType::ManagedApplication,
            temp_dir.path(),
            Some(&zip),
        );

        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_missing_logo_reported() {
        let temp_dir = TempDir::new().unwrap();
        write_files(temp_dir.path());
        std::fs::remove_file(temp_dir.path().join("wide.png")).unwrap();
        let zip = temp_dir.path().join("app.zip");

        let result = ListingValidator::new().validate(
            &listing(MA_LISTING),
            OfferType::ManagedApplication,
            temp_dir.path(),
            Some(&zip),
        );

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].field,
            "offer_listing.listing_logos.AzureLogoWide"
        );
    }

    #[test]
    fn test_invalid_version() {
        let temp_dir = TempDir::new().unwrap();
        write_files(temp_dir.path());
        let zip = temp_dir.path().join("app.zip");
        let config = MA_LISTING.replace(r#""version": "1.0.0""#, r#""version": "v1""#);

        let result = ListingValidator::new().validate(
            &listing(&config),
            OfferType::SolutionTemplate,
            temp_dir.path(),
            Some(&zip),
        );

        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "technical_configuration.version");
    }

    #[test]
    fn test_check_files_fails_on_missing_zip() {
        let temp_dir = TempDir::new().unwrap();
        write_files(temp_dir.path());
        let zip = temp_dir.path().join("missing.zip");

        let result = ListingValidator::new().check_files(
            &listing(MA_LISTING),
            OfferType::ManagedApplication,
            temp_dir.path(),
            Some(&zip),
        );

        match result {
            Err(PublishError::FileNotFound { path, what }) => {
                assert!(path.ends_with("missing.zip"));
                assert_eq!(what, "application package");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_check_files_requires_zip_name_for_plans() {
        let temp_dir = TempDir::new().unwrap();
        write_files(temp_dir.path());

        let result = ListingValidator::new().check_files(
            &listing(MA_LISTING),
            OfferType::ManagedApplication,
            temp_dir.path(),
            None,
        );

        assert!(matches!(result, Err(PublishError::InvalidConfig { .. })));
    }

    #[test]
    fn test_container_skips_plan_checks() {
        let temp_dir = TempDir::new().unwrap();
        write_files(temp_dir.path());

        let result = ListingValidator::new().check_files(
            &listing(MA_LISTING),
            OfferType::Container,
            temp_dir.path(),
            None,
        );

        assert!(result.is_ok());
    }

    #[test]
    fn test_virtual_machine_needs_definition() {
        let result = ListingValidator::new().validate(
            &ListingConfig::default(),
            OfferType::VirtualMachine,
            Path::new("."),
            None,
        );

        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "offer_definition");
    }
}
