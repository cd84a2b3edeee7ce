//! Offer availability (preview audience)

use crate::confs::ProductContext;
use crate::core::error::Result;
use crate::ingestion::Resource;
use serde_json::{Value, json};
use tracing::info;

const MODULE: &str = "Availability";
const COLLECTION: &str = "productAvailabilities";

#[derive(Debug, Clone, Copy)]
pub struct ProductAvailability<'a> {
    ctx: ProductContext<'a>,
}

impl<'a> ProductAvailability<'a> {
    pub fn new(ctx: ProductContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn get(&self) -> Result<Resource> {
        self.ctx
            .instance_settings(MODULE, COLLECTION, None, None)
            .await
    }

    /// Make the offer visible to the given preview subscriptions
    pub async fn set(&self, subscriptions: &[Value]) -> Result<Value> {
        let current = self.get().await?;
        let body = json!({
            "resourceType": "ProductAvailability",
            "visibility": "Public",
            "audiences": [{
                "type": "PreviewMarketplaceGroup",
                "values": subscriptions,
            }],
            "@odata.etag": current.etag()?,
            "id": current.id,
        });

        let updated = self
            .ctx
            .put_settings(COLLECTION, &current, &body, None)
            .await?;

        info!(
            product_id = self.ctx.product_id,
            subscriptions = subscriptions.len(),
            "preview audience updated"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confs::test_support::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_set_preview_audience() {
        let server = MockServer::start().await;
        let (client, drafts) = clients(&server);
        mount_offer_draft(&server, "Availability", "av-draft").await;
        mount_instance(
            &server,
            "productAvailabilities",
            "av-draft",
            json!({"id": "av-1", "@odata.etag": "ae"}),
        )
        .await;

        Mock::given(method("PUT"))
            .and(path("/products/prod-1/productAvailabilities/av-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "av-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let subscriptions = vec![json!({"type": "subscription", "id": "sub-1", "label": "dev"})];
        let ctx = ProductContext::new(&client, &drafts, PRODUCT_ID);
        ProductAvailability::new(ctx).set(&subscriptions).await.unwrap();

        let body =
            request_body(&server, "PUT", "/products/prod-1/productAvailabilities/av-1").await;
        assert_eq!(body["visibility"], "Public");
        assert_eq!(body["audiences"][0]["type"], "PreviewMarketplaceGroup");
        assert_eq!(body["audiences"][0]["values"][0]["id"], "sub-1");
    }
}
