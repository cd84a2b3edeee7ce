//! Managed application offer lifecycle against a mock Partner Center

use marketplace_publisher::confs::{Listing, ProductAvailability, ProductContext, Properties};
use marketplace_publisher::ingestion::{DraftResolver, IngestionClient};
use marketplace_publisher::{
    ContextOptions, OfferLoader, OfferType, PublishContext, RetryOptions,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const LISTING_CONFIG: &str = r#"{
    "offer_type": "ma",
    "property_settings": {
        "industries": [],
        "category": ["analytics", "devService"],
        "product_tags": ["contoso"],
        "terms_of_use": "Use it well",
        "use_enterprise_contract": false
    },
    "offer_listing": {
        "title": "Contoso Analytics",
        "summary": "Analytics for everyone",
        "description": "<p>Long description</p>",
        "short_description": "Analytics",
        "keywords": ["analytics", "contoso"],
        "listing_uris": [],
        "listing_contacts": [],
        "listing_logos": {
            "logo_large": "large.png",
            "logo_medium": "medium.png",
            "logo_small": "small.png",
            "logo_wide": "wide.png"
        }
    },
    "preview_audience": {
        "subscriptions": [{"id": "3b1a6a1e-0000-4a7e-9c2b-9c8a1c3d2e11", "description": "qa"}]
    },
    "plan_overview": [{
        "plan_name": "basic",
        "plan_listing": {"title": "Basic", "summary": "Basic plan", "description": "Basic plan"},
        "pricing_and_availability": {"visibility": "Public"},
        "technical_configuration": {
            "version": "1.0.0",
            "allow_jit_access": false,
            "tenant_id": "72f988bf-86f1-41af-91ab-2d7cd011db47",
            "authorizations": [{
                "id": "c6a5d3c4-2b1f-4c8e-9a6e-1f2e3d4c5b6a",
                "role": "8e3af657-a8ff-443c-a75c-2fe8c4bcb635"
            }]
        }
    }]
}"#;

/// Settings resource the mock serves back after every PUT
#[derive(Clone)]
struct Settings(Arc<Mutex<Value>>);

impl Settings {
    fn new(initial: Value) -> Self {
        Self(Arc::new(Mutex::new(initial)))
    }
}

struct ServeSettings(Settings);

impl Respond for ServeSettings {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        let current = self.0.0.lock().unwrap().clone();
        ResponseTemplate::new(200).set_body_json(json!({ "value": [current] }))
    }
}

struct StoreSettings(Settings);

impl Respond for StoreSettings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let update: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let mut stored = self.0.0.lock().unwrap();
        if let (Some(stored), Some(update)) = (stored.as_object_mut(), update.as_object()) {
            for (key, value) in update {
                stored.insert(key.clone(), value.clone());
            }
        }
        ResponseTemplate::new(200).set_body_json(stored.clone())
    }
}

async fn mount_settings(server: &MockServer, collection: &str, instance_id: &str, id: &str) {
    let settings = Settings::new(json!({"id": id, "@odata.etag": format!("\"{}-etag\"", id)}));

    Mock::given(method("GET"))
        .and(path(format!(
            "/products/prod-1/{}/getByInstanceID(instanceID={})",
            collection, instance_id
        )))
        .respond_with(ServeSettings(settings.clone()))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/products/prod-1/{}/{}", collection, id)))
        .respond_with(StoreSettings(settings))
        .mount(server)
        .await;
}

async fn mount(server: &MockServer, verb: &str, url_path: &str, status: u16, body: Value) {
    Mock::given(method(verb))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_partner_center(server: &MockServer) {
    let uri = server.uri();

    mount(server, "POST", "/products", 201, json!({"id": "prod-1", "name": "contoso-analytics"})).await;
    mount(
        server,
        "GET",
        "/products",
        200,
        json!({"value": [{"id": "prod-1", "name": "contoso-analytics", "resourceType": "AzureApplication"}]}),
    )
    .await;

    for module in ["Property", "Listing", "Availability", "Package", "Cosell"] {
        let prefix = module.to_lowercase();
        mount(
            server,
            "GET",
            &format!("/products/prod-1/branches/getByModule(module={})", module),
            200,
            json!({"value": [
                {"currentDraftInstanceID": format!("{}-offer", prefix), "module": module},
                {"currentDraftInstanceID": format!("{}-v1", prefix), "variantID": "v1", "module": module}
            ]}),
        )
        .await;
    }

    mount_settings(server, "properties", "property-offer", "prop-1").await;
    mount_settings(server, "listings", "listing-offer", "listing-1").await;
    mount_settings(server, "productAvailabilities", "availability-offer", "pa-1").await;

    // logos
    mount(server, "GET", "/products/prod-1/listings/listing-1/images", 200, json!({"value": []})).await;
    mount(
        server,
        "POST",
        "/products/prod-1/listings/listing-1/images",
        200,
        json!({"id": "img-1", "@odata.etag": "\"img\"", "fileSasUri": format!("{}/blob/image", uri), "state": "PendingUpload"}),
    )
    .await;
    mount(server, "PUT", "/products/prod-1/listings/listing-1/images/img-1", 200, json!({"id": "img-1"})).await;
    mount(server, "PUT", "/blob/image", 201, json!({})).await;

    mount(server, "POST", "/products/prod-1/resellerConfiguration", 200, json!({})).await;

    // plan
    mount(server, "GET", "/products/prod-1/variants", 200, json!({"value": []})).await;
    mount(server, "POST", "/products/prod-1/variants", 201, json!({"id": "v1", "externalID": "basic"})).await;
    mount(
        server,
        "GET",
        "/products/prod-1/listings/getByInstanceID(instanceID=listing-v1)",
        200,
        json!({"value": [{"id": "plan-listing-1", "@odata.etag": "\"pl\""}]}),
    )
    .await;
    mount(server, "PUT", "/products/prod-1/listings/plan-listing-1", 200, json!({"id": "plan-listing-1"})).await;
    mount(
        server,
        "GET",
        "/products/prod-1/featureAvailabilities/getByInstanceID(instanceID=availability-v1)",
        200,
        json!({"value": [{
            "id": "fa-1",
            "@odata.etag": "\"fa\"",
            "marketStates": [{"marketCode": "US", "state": "Disabled"}]
        }]}),
    )
    .await;
    mount(server, "PUT", "/products/prod-1/featureavailabilities/fa-1", 200, json!({"id": "fa-1"})).await;

    // package
    mount(
        server,
        "POST",
        "/products/prod-1/packages",
        200,
        json!({"id": "pkg-1", "@odata.etag": "\"pkg\"", "fileSasUri": format!("{}/blob/package", uri), "state": "PendingUpload"}),
    )
    .await;
    mount(server, "PUT", "/blob/package", 201, json!({})).await;
    mount(server, "PUT", "/products/prod-1/packages/pkg-1", 200, json!({"id": "pkg-1"})).await;
    mount(server, "GET", "/products/prod-1/packages/pkg-1", 200, json!({"id": "pkg-1", "state": "Processed"})).await;
    mount(
        server,
        "GET",
        "/products/prod-1/packageConfigurations/getByInstanceID(instanceID=package-v1)",
        200,
        json!({"value": [{"id": "pc-1", "@odata.etag": "\"pc\""}]}),
    )
    .await;
    mount(server, "PUT", "/products/prod-1/packageConfigurations/pc-1", 200, json!({"id": "pc-1"})).await;
}

fn write_app(dir: &Path) {
    std::fs::write(
        dir.join("manifest.yml"),
        "app: app.zip\njson_listing_config: ma_config.json\nplan_name: basic\noffer_type: ma\n",
    )
    .unwrap();
    std::fs::write(dir.join("ma_config.json"), LISTING_CONFIG).unwrap();

    for logo in ["large.png", "medium.png", "small.png", "wide.png"] {
        std::fs::write(dir.join(logo), b"\x89PNG").unwrap();
    }

    let mut zip = zip::ZipWriter::new(std::fs::File::create(dir.join("app.zip")).unwrap());
    zip.start_file("mainTemplate.json", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(br#"{"resources": [{"name": "pid-00000000-partnercenter"}]}"#)
        .unwrap();
    zip.start_file("createUiDefinition.json", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"{}").unwrap();
    zip.finish().unwrap();
}

async fn load_context(server: &MockServer, dir: &Path) -> PublishContext {
    let env = HashMap::from([
        ("AZPC_ACCESS_TOKEN".to_string(), "test-token".to_string()),
        ("AZPC_INGESTION_URL".to_string(), server.uri()),
        ("AZPC_PUBLISHER_NAME".to_string(), "Contoso".to_string()),
    ]);

    PublishContext::load(ContextOptions {
        config_yml: dir.join("config.yml"),
        manifest_yml: dir.join("manifest.yml"),
        app_path: Some(dir.to_path_buf()),
        env,
        ..Default::default()
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_create_managed_application_offer() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    write_app(temp_dir.path());
    mount_partner_center(&server).await;

    let context = load_context(&server, temp_dir.path()).await;
    let mut offer = OfferLoader::load(OfferType::ManagedApplication, "contoso-analytics", context).unwrap();

    let created = offer.create(false).await.unwrap();
    assert_eq!(created["id"], "prod-1");

    let client = IngestionClient::new(server.uri(), SecretString::new("test-token".into())).unwrap();
    let drafts = DraftResolver::new(client.clone(), RetryOptions::immediate(1));
    let ctx = ProductContext::new(&client, &drafts, "prod-1");
    let expected: Value = serde_json::from_str(LISTING_CONFIG).unwrap();

    let properties = Properties::new(ctx).get().await.unwrap();
    assert_eq!(
        properties.field("categories"),
        Some(&expected["property_settings"]["category"])
    );
    assert_eq!(properties.str_field("termsOfUse"), Some("Use it well"));
    assert_eq!(properties.str_field("appVersion"), Some("1.0.0"));

    let listing = Listing::new(ctx).get().await.unwrap();
    assert_eq!(listing.str_field("title"), Some("Contoso Analytics"));
    assert_eq!(listing.str_field("summary"), Some("Analytics for everyone"));
    assert_eq!(
        listing.field("keywords"),
        Some(&expected["offer_listing"]["keywords"])
    );
    assert_eq!(listing.str_field("publisherName"), Some("Contoso"));

    let availability = ProductAvailability::new(ctx).get().await.unwrap();
    assert_eq!(
        availability.field("audiences").map(|a| &a[0]["values"]),
        Some(&expected["preview_audience"]["subscriptions"])
    );

    // the package went out stamped with the product id
    let mut archive = zip::ZipArchive::new(std::fs::File::open(temp_dir.path().join("app.zip")).unwrap()).unwrap();
    let mut template = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("mainTemplate.json").unwrap(), &mut template)
        .unwrap();
    assert!(template.contains("pid-prod-1-partnercenter"));
}

#[tokio::test]
async fn test_publish_then_status() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    write_app(temp_dir.path());
    mount_partner_center(&server).await;

    // the plan exists by now
    Mock::given(method("GET"))
        .and(path("/products/prod-1/variants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"value": [{"id": "v1", "externalID": "basic", "state": "Active"}]}),
        ))
        .with_priority(1)
        .mount(&server)
        .await;
    mount(&server, "POST", "/products/prod-1/submissions", 201, json!({"id": "sub-1"})).await;
    mount(
        &server,
        "GET",
        "/products/prod-1/submissions",
        200,
        json!({"value": [{"id": "sub-1", "state": "InProgress", "substate": "InDraft", "areResourcesReady": false}]}),
    )
    .await;

    let context = load_context(&server, temp_dir.path()).await;
    let mut offer = OfferLoader::load(OfferType::ManagedApplication, "contoso-analytics", context).unwrap();

    let submission = offer.publish(None).await.unwrap();
    assert_eq!(submission["id"], "sub-1");

    let status = offer.status().await.unwrap();
    assert_eq!(
        status,
        json!({"are-resources-ready": false, "state": "InProgress", "substate": "InDraft"})
    );
}
