//! Error handling for offer publishing
//!
//! This module provides a single error type for every layer of the publisher
//! (local configuration, Partner Center calls, uploads, state tracking) with
//! recovery guidance, using the thiserror crate.

use thiserror::Error;

/// Convenience alias used across the crate
pub type Result<T, E = PublishError> = std::result::Result<T, E>;

/// Main error type for offer publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Local precondition errors
    #[error("{what} not found: {path}")]
    FileNotFound { path: String, what: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("reseller channel state '{state}' is not one of PartialOptIn, Disabled, Enabled")]
    InvalidResellerState { state: String },

    #[error("no access token configured for {service}")]
    TokenMissing { service: String },

    // Lookup errors
    #[error("{operation} gave up after {attempts} attempts")]
    RetryExhausted { operation: String, attempts: u32 },

    #[error("{resource} '{name}' not found")]
    NotFound { resource: String, name: String },

    #[error("{resource} '{name}' already exists, try using update instead")]
    AlreadyExists { resource: String, name: String },

    // Remote errors
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("upload to storage failed with status {status}")]
    UploadFailed { status: u16 },

    #[error("package processing ended in state {state}")]
    PackageProcessingFailed { state: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("{operation} timed out")]
    Timeout { operation: String },

    // State errors
    #[error("invalid offer state transition: {from} → {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("{operation} is not supported for {offer_type} offers")]
    UnsupportedOperation {
        operation: String,
        offer_type: String,
    },

    // Wrapped errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid application package: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl PublishError {
    /// Build an error from a non-success API response
    ///
    /// Partner Center error bodies look like
    /// `{"error": {"code": "...", "message": "...", "details": [...]}}`;
    /// the cloud partner portal uses `{"error": {"message": "..."}}` too.
    /// Anything else is kept verbatim.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = extract_api_message(body);

        match status {
            401 | 403 => Self::PermissionDenied { message },
            _ => Self::Api { status, message },
        }
    }

    /// Check if this error may go away when the operation is repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if the error body of an API rejection mentions the given text
    pub fn message_contains(&self, needle: &str) -> bool {
        match self {
            Self::Api { message, .. } | Self::PermissionDenied { message } => {
                message.contains(needle)
            }
            _ => false,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::FileNotFound { .. } => vec![
                "Check the paths in manifest.yml and the listing config",
                "Paths are resolved relative to --app-path",
            ],
            Self::InvalidConfig { .. } => {
                vec!["Review the listing config JSON against the Partner Center field names"]
            }
            Self::InvalidResellerState { .. } => {
                vec!["Use one of PartialOptIn, Disabled, Enabled"]
            }
            Self::TokenMissing { .. } => vec![
                "Set AZPC_ACCESS_TOKEN (or AZPC_CLOUD_PARTNER_TOKEN for vm offers)",
                "Or add access_token to config.yml",
            ],
            Self::RetryExhausted { .. } => vec![
                "The offer may still be provisioning, wait a minute and try again",
                "Verify the offer exists with the show command",
            ],
            Self::NotFound { .. } => vec![
                "Check the offer or plan name",
                "Use the list command to see existing resources",
            ],
            Self::AlreadyExists { .. } => vec!["Run update instead, or pass --update to create"],
            Self::Api { .. } => vec![
                "Read the API message above",
                "Re-run the command; stale etags are refreshed on every call",
            ],
            Self::PermissionDenied { .. } => vec![
                "Make sure the token belongs to an account with publisher access",
                "Tokens expire after about an hour, acquire a new one",
            ],
            Self::UploadFailed { .. } => vec![
                "The SAS URI may have expired, re-run the command",
                "Check network access to *.blob.core.windows.net",
            ],
            Self::PackageProcessingFailed { .. } => vec![
                "Validate mainTemplate.json and createUiDefinition.json in the package",
                "Check the package status in Partner Center",
            ],
            Self::Network { .. } => vec![
                "Check your internet connection",
                "Wait a moment and try again",
            ],
            Self::Timeout { .. } => vec!["Partner Center may be slow, try again later"],
            Self::InvalidStateTransition { .. } => {
                vec!["Run the preceding step (create, update or publish) first"]
            }
            Self::UnsupportedOperation { .. } => {
                vec!["Manage virtual machine plans inside the offer definition"]
            }
            Self::Io(_) => vec!["Check file permissions"],
            Self::Json(_) | Self::Yaml(_) => vec!["Fix the syntax of the configuration file"],
            Self::Zip(_) => vec!["Rebuild the application package zip"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "FILE_NOT_FOUND",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::InvalidResellerState { .. } => "INVALID_RESELLER_STATE",
            Self::TokenMissing { .. } => "TOKEN_MISSING",
            Self::RetryExhausted { .. } => "RETRY_EXHAUSTED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Api { .. } => "API_ERROR",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::UploadFailed { .. } => "UPLOAD_FAILED",
            Self::PackageProcessingFailed { .. } => "PACKAGE_PROCESSING_FAILED",
            Self::Network { .. } => "NETWORK_ERROR",
            Self::Timeout { .. } => "TIMEOUT_ERROR",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Yaml(_) => "YAML_ERROR",
            Self::Zip(_) => "ZIP_ERROR",
        }
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                operation: error
                    .url()
                    .map(|u| u.path().to_string())
                    .unwrap_or_else(|| "request".to_string()),
            }
        } else {
            Self::Network {
                message: error.to_string(),
            }
        }
    }
}

/// Pull a human readable message out of an API error body
fn extract_api_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };

    let error = value.get("error").unwrap_or(&value);
    let mut parts: Vec<String> = Vec::new();

    if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
        parts.push(message.to_string());
    }
    if let Some(details) = error.get("details").and_then(|d| d.as_array()) {
        parts.extend(
            details
                .iter()
                .filter_map(|d| d.get("message").and_then(|m| m.as_str()))
                .map(str::to_string),
        );
    }

    if parts.is_empty() {
        body.trim().to_string()
    } else {
        parts.join(" ")
    }
}
