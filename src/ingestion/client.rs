//! HTTP client for the Partner Center ingestion API
//!
//! Every call carries the bearer token; mutating calls carry the resource's
//! `@odata.etag` as `If-Match`. Non-success responses are mapped to
//! [`PublishError`] from the JSON error body.

use crate::core::error::{PublishError, Result};
use crate::ingestion::models::{Branch, ListResponse, Product, Submission, Variant};
use crate::security::{PARTNER_CENTER, SecureTokenManager};
use reqwest::header::{HeaderMap, HeaderValue, IF_MATCH};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for `https://api.partner.microsoft.com/v1.0/ingestion`
#[derive(Clone)]
pub struct IngestionClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<SecretString>,
    masker: Arc<SecureTokenManager>,
}

impl std::fmt::Debug for IngestionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl IngestionClient {
    /// Create a client for the given base URL and bearer token
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("marketplace-publisher/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            masker: Arc::new(SecureTokenManager::with_token(PARTNER_CENTER, &token)),
            token: Arc::new(token),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Plain HTTP client without API credentials, for SAS uploads
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, "ingestion request");

        self.http
            .request(method, url)
            .bearer_auth(self.token.expose_secret())
    }

    // ------------------------------------------------------------------------
    // Generic verbs
    // ------------------------------------------------------------------------

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    /// POST without a request body
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::POST, path)).await
    }

    /// PUT with `If-Match: etag`
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        etag: &str,
        body: &B,
    ) -> Result<T> {
        let mut headers = HeaderMap::new();
        headers.insert(
            IF_MATCH,
            HeaderValue::from_str(etag).map_err(|e| PublishError::InvalidConfig {
                message: format!("invalid etag {}: {}", etag, e),
            })?,
        );

        self.send(self.request(Method::PUT, path).headers(headers).json(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send::<Value>(self.request(Method::DELETE, path))
            .await
            .map(|_| ())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let body = self.masker.mask_tokens_in_string(&body);
            debug!(status = status.as_u16(), body = %body, "ingestion request failed");
            return Err(PublishError::from_response(status.as_u16(), &body));
        }

        // DELETE and some POSTs answer with an empty body
        let body = if body.trim().is_empty() || status == StatusCode::NO_CONTENT {
            "null"
        } else {
            body.as_str()
        };

        Ok(serde_json::from_str(body)?)
    }

    // ------------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------------

    /// `GET products?$filter=...`
    pub async fn list_products(&self, filter: &str) -> Result<ListResponse<Product>> {
        self.get_with_query("products", &[("$filter", filter)]).await
    }

    /// Same as [`list_products`](Self::list_products) without decoding
    pub async fn list_products_raw(&self, filter: &str) -> Result<Value> {
        self.get_with_query("products", &[("$filter", filter)]).await
    }

    pub async fn create_product(&self, body: &Value) -> Result<Value> {
        self.post("products", body).await
    }

    pub async fn delete_product(&self, product_id: &str) -> Result<()> {
        self.delete(&format!("products/{}", product_id)).await
    }

    // ------------------------------------------------------------------------
    // Variants
    // ------------------------------------------------------------------------

    pub async fn list_variants(&self, product_id: &str) -> Result<ListResponse<Variant>> {
        self.get(&format!("products/{}/variants", product_id)).await
    }

    pub async fn list_variants_raw(&self, product_id: &str) -> Result<Value> {
        self.get(&format!("products/{}/variants", product_id)).await
    }

    pub async fn create_variant(&self, product_id: &str, body: &Value) -> Result<Value> {
        self.post(&format!("products/{}/variants", product_id), body)
            .await
    }

    pub async fn delete_variant(&self, product_id: &str, variant_id: &str) -> Result<()> {
        self.delete(&format!("products/{}/variants/{}", product_id, variant_id))
            .await
    }

    // ------------------------------------------------------------------------
    // Branches
    // ------------------------------------------------------------------------

    /// `GET products/{id}/branches/getByModule(module={module})`
    pub async fn branches_by_module(&self, product_id: &str, module: &str) -> Result<Vec<Branch>> {
        let list: ListResponse<Branch> = self
            .get(&format!(
                "products/{}/branches/getByModule(module={})",
                product_id, module
            ))
            .await?;
        Ok(list.value)
    }

    // ------------------------------------------------------------------------
    // Submissions
    // ------------------------------------------------------------------------

    pub async fn list_submissions(&self, product_id: &str) -> Result<Vec<Submission>> {
        let list: ListResponse<Submission> = self
            .get(&format!("products/{}/submissions", product_id))
            .await?;
        Ok(list.value)
    }

    pub async fn create_submission(&self, product_id: &str, body: &Value) -> Result<Value> {
        self.post(&format!("products/{}/submissions", product_id), body)
            .await
    }

    pub async fn promote_submission(&self, product_id: &str, submission_id: &str) -> Result<Value> {
        self.post_empty(&format!(
            "products/{}/submissions/{}/promote",
            product_id, submission_id
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> IngestionClient {
        IngestionClient::new(server.uri(), SecretString::new("test-token".into())).unwrap()
    }

    #[tokio::test]
    async fn test_list_products_sends_filter_and_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("$filter", "ResourceType eq 'AzureApplication'"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"id": "p1", "name": "contoso", "resourceType": "AzureApplication"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let products = client(&server)
            .list_products("ResourceType eq 'AzureApplication'")
            .await
            .unwrap();

        assert_eq!(products.value.len(), 1);
        assert_eq!(products.value[0].name.as_deref(), Some("contoso"));
    }

    #[tokio::test]
    async fn test_put_sends_if_match() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/products/p1/properties/prop-1"))
            .and(header("if-match", "\"etag-1\""))
            .and(body_json(json!({"resourceType": "AzureProperty"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "prop-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let result: Value = client(&server)
            .put(
                "products/p1/properties/prop-1",
                "\"etag-1\"",
                &json!({"resourceType": "AzureProperty"}),
            )
            .await
            .unwrap();

        assert_eq!(result["id"], "prop-1");
    }

    #[tokio::test]
    async fn test_error_body_is_mapped() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": "Conflict", "message": "Offer id already in use"}
            })))
            .mount(&server)
            .await;

        let result = client(&server).create_product(&json!({})).await;

        match result {
            Err(PublishError::Api { status, message }) => {
                assert_eq!(status, 409);
                assert_eq!(message, "Offer id already in use");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_body_echoing_token_is_masked() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/products/p1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "malformed header: Bearer test-token-abcdef"}
            })))
            .mount(&server)
            .await;

        let client =
            IngestionClient::new(server.uri(), SecretString::new("test-token-abcdef".into())).unwrap();
        let result: Result<Value> = client.get("products/p1").await;

        match result {
            Err(PublishError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "malformed header: Bearer tes...def");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_is_permission_denied() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/products/p1/submissions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
            .mount(&server)
            .await;

        let result = client(&server).list_submissions("p1").await;

        assert!(matches!(result, Err(PublishError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_delete_with_empty_body() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/products/p1/variants/v1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).delete_variant("p1", "v1").await.unwrap();
    }

    #[tokio::test]
    async fn test_branches_by_module_path() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/products/p1/branches/getByModule(module=Listing)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"currentDraftInstanceID": "draft-1", "module": "Listing"}]
            })))
            .mount(&server)
            .await;

        let branches = client(&server)
            .branches_by_module("p1", "Listing")
            .await
            .unwrap();

        assert_eq!(
            branches[0].current_draft_instance_id.as_deref(),
            Some("draft-1")
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let client =
            IngestionClient::new("https://example.test/", SecretString::new("hidden-token".into()))
                .unwrap();

        let debug = format!("{:?}", client);
        assert!(!debug.contains("hidden-token"));
        assert_eq!(client.base_url(), "https://example.test");
    }
}
