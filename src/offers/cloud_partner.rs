//! HTTP client for the legacy Cloud Partner Portal API
//!
//! Offers live under `{base}/api/publishers/{publisherId}/offers/{offerId}`
//! and every call carries `api-version=2017-10-31`.

use crate::core::error::{PublishError, Result};
use crate::security::{CLOUD_PARTNER, SecureTokenManager};
use reqwest::header::IF_MATCH;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const API_VERSION: &str = "2017-10-31";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for one publisher's offers
#[derive(Clone)]
pub struct CloudPartnerClient {
    http: reqwest::Client,
    base_url: String,
    publisher_id: String,
    token: Arc<SecretString>,
    masker: Arc<SecureTokenManager>,
}

impl std::fmt::Debug for CloudPartnerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudPartnerClient")
            .field("base_url", &self.base_url)
            .field("publisher_id", &self.publisher_id)
            .finish_non_exhaustive()
    }
}

impl CloudPartnerClient {
    pub fn new(
        base_url: impl Into<String>,
        publisher_id: impl Into<String>,
        token: SecretString,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("marketplace-publisher/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            publisher_id: publisher_id.into(),
            masker: Arc::new(SecureTokenManager::with_token(CLOUD_PARTNER, &token)),
            token: Arc::new(token),
        })
    }

    pub fn publisher_id(&self) -> &str {
        &self.publisher_id
    }

    fn offers_url(&self) -> String {
        format!("{}/api/publishers/{}/offers", self.base_url, self.publisher_id)
    }

    fn offer_url(&self, offer_id: &str, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{}/{}/{}", self.offers_url(), offer_id, action),
            None => format!("{}/{}", self.offers_url(), offer_id),
        }
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        debug!(%method, %url, "cloud partner request");

        self.http
            .request(method, url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(self.token.expose_secret())
    }

    /// PUT the offer definition; `update` sends `If-Match: *`
    pub async fn put_offer(&self, offer_id: &str, definition: &Value, update: bool) -> Result<Value> {
        let mut request = self
            .request(Method::PUT, self.offer_url(offer_id, None))
            .json(definition);
        if update {
            request = request.header(IF_MATCH, "*");
        }
        self.send(request).await
    }

    pub async fn get_offer(&self, offer_id: &str) -> Result<Value> {
        self.send(self.request(Method::GET, self.offer_url(offer_id, None)))
            .await
    }

    pub async fn list_offers(&self) -> Result<Value> {
        self.send(self.request(Method::GET, self.offers_url())).await
    }

    pub async fn delete_offer(&self, offer_id: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, self.offer_url(offer_id, None)))
            .await
            .map(|_| ())
    }

    /// Start certification and preview; the portal mails progress to `notification_emails`
    pub async fn publish(&self, offer_id: &str, notification_emails: &str) -> Result<Value> {
        let body = json!({"metadata": {"notification-emails": notification_emails}});
        self.send(
            self.request(Method::POST, self.offer_url(offer_id, Some("publish")))
                .json(&body),
        )
        .await
    }

    pub async fn go_live(&self, offer_id: &str) -> Result<Value> {
        self.send(self.request(Method::POST, self.offer_url(offer_id, Some("golive"))))
            .await
    }

    pub async fn status(&self, offer_id: &str) -> Result<Value> {
        self.send(self.request(Method::GET, self.offer_url(offer_id, Some("status"))))
            .await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let body = self.masker.mask_tokens_in_string(&body);
            debug!(status = status.as_u16(), body = %body, "cloud partner request failed");
            return Err(PublishError::from_response(status.as_u16(), &body));
        }

        // publish and golive answer 202 without a body
        if body.trim().is_empty() || status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CloudPartnerClient {
        CloudPartnerClient::new(server.uri(), "contoso", SecretString::new("cpp-token".into()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_update_sends_if_match_and_api_version() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/api/publishers/contoso/offers/contoso-vm"))
            .and(query_param("api-version", API_VERSION))
            .and(header("if-match", "*"))
            .and(header("authorization", "Bearer cpp-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "contoso-vm"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .put_offer("contoso-vm", &json!({"id": "contoso-vm"}), true)
            .await
            .unwrap();

        assert_eq!(result["id"], "contoso-vm");
    }

    #[tokio::test]
    async fn test_publish_body_and_empty_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/publishers/contoso/offers/contoso-vm/publish"))
            .and(body_json(json!({"metadata": {"notification-emails": "ops@contoso.com"}})))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .publish("contoso-vm", "ops@contoso.com")
            .await
            .unwrap();

        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn test_missing_offer_is_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/publishers/contoso/offers/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "offerNotFound", "message": "Offer not found"}
            })))
            .mount(&server)
            .await;

        let result = client(&server).get_offer("missing").await;

        assert!(matches!(result, Err(PublishError::Api { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_rejected_token_is_masked_in_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/publishers/contoso/offers/contoso-vm"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token cpp-token-0123456789"))
            .mount(&server)
            .await;

        let client = CloudPartnerClient::new(
            server.uri(),
            "contoso",
            SecretString::new("cpp-token-0123456789".into()),
        )
        .unwrap();
        let result = client.get_offer("contoso-vm").await;

        match result {
            Err(PublishError::PermissionDenied { message }) => {
                assert_eq!(message, "invalid token cpp...789");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
