//! Wire types of the Partner Center ingestion API
//!
//! Only the fields the publisher reads are typed; everything else is kept in
//! flattened maps so a resource can be round-tripped without loss.

use crate::core::error::{PublishError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{"value": [...]}` envelope used by every list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// Entry of `branches/getByModule(module=...)`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Branch {
    #[serde(rename = "currentDraftInstanceID", default)]
    pub current_draft_instance_id: Option<String>,

    #[serde(rename = "variantID", default)]
    pub variant_id: Option<String>,

    #[serde(default)]
    pub module: Option<String>,
}

/// A configuration module fetched through `getByInstanceID`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Resource {
    pub id: String,

    #[serde(rename = "@odata.etag", default)]
    pub odata_etag: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Resource {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// Etag for `If-Match`; a resource fetched without one cannot be PUT back
    pub fn etag(&self) -> Result<&str> {
        missing_etag(self.odata_etag.as_deref(), &self.id)
    }
}

/// Product (offer) record
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Product {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "resourceType", default)]
    pub resource_type: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Variant (plan) record
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Variant {
    pub id: String,

    #[serde(rename = "externalID", default)]
    pub external_id: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Variant {
    pub fn is_active(&self) -> bool {
        self.state.as_deref().is_none_or(|s| s.eq_ignore_ascii_case("Active"))
    }
}

/// Submission record
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Submission {
    pub id: String,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub substate: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Package or listing image record that carries an upload URL
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UploadRecord {
    pub id: String,

    #[serde(rename = "fileName", default)]
    pub file_name: Option<String>,

    #[serde(rename = "fileSasUri", default)]
    pub file_sas_uri: Option<String>,

    #[serde(default, alias = "State")]
    pub state: Option<String>,

    #[serde(rename = "@odata.etag", default)]
    pub odata_etag: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl UploadRecord {
    pub fn etag(&self) -> Result<&str> {
        missing_etag(self.odata_etag.as_deref(), &self.id)
    }
}

fn missing_etag<'a>(etag: Option<&'a str>, id: &str) -> Result<&'a str> {
    etag.ok_or_else(|| PublishError::Api {
        status: 200,
        message: format!("resource {} carries no @odata.etag", id),
    })
}
