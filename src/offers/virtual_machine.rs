//! Virtual machine offers, published through the Cloud Partner Portal
//!
//! The whole offer, plans included, is one JSON document: the listing
//! config's `offer_definition`. Plan commands are therefore unsupported.

use crate::core::error::{PublishError, Result};
use crate::core::state_machine::{OfferState, OfferStateMachine};
use crate::core::traits::OfferCommands;
use crate::offers::OfferType;
use crate::offers::cloud_partner::CloudPartnerClient;
use crate::orchestration::context::PublishContext;
use crate::security::CLOUD_PARTNER;
use crate::validation::ListingValidator;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use tracing::info;

pub struct VirtualMachineOffer {
    name: String,
    context: PublishContext,
    client: CloudPartnerClient,
    state_machine: OfferStateMachine,
}

impl VirtualMachineOffer {
    /// Needs the cloud partner token and `publisher_id`
    pub fn new(name: &str, context: PublishContext) -> Result<Self> {
        let token = context.tokens.require_token(CLOUD_PARTNER)?;
        let publisher_id =
            context
                .config
                .publisher_id
                .clone()
                .ok_or_else(|| PublishError::InvalidConfig {
                    message: "publisher_id is required for virtual machine offers".to_string(),
                })?;
        let client = CloudPartnerClient::new(context.config.cloud_partner_url(), publisher_id, token)?;

        Ok(Self {
            name: name.to_string(),
            context,
            client,
            state_machine: OfferStateMachine::new(),
        })
    }

    pub fn state_machine(&self) -> &OfferStateMachine {
        &self.state_machine
    }

    /// Offer definition from the listing config, with `id` and `publisherId` filled in
    pub async fn definition(&self) -> Result<Value> {
        let listing = self.context.listing_config().await?;
        let result = ListingValidator::new().validate(
            &listing,
            OfferType::VirtualMachine,
            Path::new("."),
            None,
        );
        if !result.valid {
            return Err(PublishError::InvalidConfig {
                message: result
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join("; "),
            });
        }

        let mut definition = listing.offer_definition.unwrap_or_else(|| json!({}));
        let Some(object) = definition.as_object_mut() else {
            return Err(PublishError::InvalidConfig {
                message: "offer_definition must be a JSON object".to_string(),
            });
        };
        object
            .entry("id")
            .or_insert_with(|| json!(self.name));
        object
            .entry("publisherId")
            .or_insert_with(|| json!(self.client.publisher_id()));

        Ok(definition)
    }

    async fn exists(&self) -> Result<bool> {
        match self.client.get_offer(&self.name).await {
            Ok(_) => Ok(true),
            Err(PublishError::Api { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn advance(&mut self, to: OfferState) -> Result<()> {
        if self.state_machine.get_state() == OfferState::Unknown && to != OfferState::Created {
            self.state_machine.ensure_created(&self.name)?;
        }
        self.state_machine.transition(to, None)
    }
}

#[async_trait]
impl OfferCommands for VirtualMachineOffer {
    fn offer_type(&self) -> &str {
        OfferType::VirtualMachine.as_str()
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&mut self, update_if_exists: bool) -> Result<Value> {
        let definition = self.definition().await?;

        if self.exists().await? {
            if update_if_exists {
                return self.update().await;
            }
            return Err(PublishError::AlreadyExists {
                resource: OfferType::VirtualMachine.resource_type().to_string(),
                name: self.name.clone(),
            });
        }

        let created = self.client.put_offer(&self.name, &definition, false).await?;
        self.advance(OfferState::Created)?;
        info!(name = %self.name, "virtual machine offer created");
        Ok(created)
    }

    async fn update(&mut self) -> Result<Value> {
        let definition = self.definition().await?;
        let updated = self.client.put_offer(&self.name, &definition, true).await?;
        self.advance(OfferState::Configured)?;
        info!(name = %self.name, "virtual machine offer updated");
        Ok(updated)
    }

    async fn show(&mut self) -> Result<Value> {
        match self.client.get_offer(&self.name).await {
            Err(PublishError::Api { status: 404, .. }) => Err(PublishError::NotFound {
                resource: OfferType::VirtualMachine.resource_type().to_string(),
                name: self.name.clone(),
            }),
            other => other,
        }
    }

    async fn list(&mut self) -> Result<Value> {
        self.client.list_offers().await
    }

    async fn delete(&mut self) -> Result<()> {
        self.client.delete_offer(&self.name).await?;
        info!(name = %self.name, "virtual machine offer deleted");
        Ok(())
    }

    async fn publish(&mut self, notification_emails: Option<&str>) -> Result<Value> {
        let emails = notification_emails
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| PublishError::InvalidConfig {
                message: "--notification-emails is required to publish a virtual machine offer"
                    .to_string(),
            })?;

        let response = self.client.publish(&self.name, emails).await?;
        self.advance(OfferState::Submitted)?;
        info!(name = %self.name, "virtual machine offer submitted");
        Ok(response)
    }

    async fn release(&mut self) -> Result<Value> {
        let response = self.client.go_live(&self.name).await?;
        if self.state_machine.get_state() != OfferState::Submitted {
            self.advance(OfferState::Submitted)?;
        }
        self.advance(OfferState::Promoted)?;
        info!(name = %self.name, "virtual machine offer going live");
        Ok(response)
    }

    async fn status(&mut self) -> Result<Value> {
        self.client.status(&self.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::context::ContextOptions;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn offer(server: &MockServer, dir: &TempDir) -> VirtualMachineOffer {
        std::fs::write(
            dir.path().join("manifest.yml"),
            "json_listing_config: vm_config.json\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("vm_config.json"),
            r#"{"offer_definition": {"offerTypeId": "microsoft-azure-virtualmachines", "definition": {"plans": []}}}"#,
        )
        .unwrap();

        let env = HashMap::from([
            ("AZPC_CLOUD_PARTNER_TOKEN".to_string(), "cpp-token".to_string()),
            ("AZPC_CLOUD_PARTNER_URL".to_string(), server.uri()),
            ("AZPC_PUBLISHER_ID".to_string(), "contoso".to_string()),
        ]);
        let context = PublishContext::load(ContextOptions {
            config_yml: dir.path().join("config.yml"),
            manifest_yml: dir.path().join("manifest.yml"),
            app_path: Some(dir.path().to_path_buf()),
            env,
            ..Default::default()
        })
        .await
        .unwrap();

        VirtualMachineOffer::new("contoso-vm", context).unwrap()
    }

    #[tokio::test]
    async fn test_create_puts_definition() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let mut vm = offer(&server, &temp_dir).await;

        Mock::given(method("GET"))
            .and(path("/api/publishers/contoso/offers/contoso-vm"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/publishers/contoso/offers/contoso-vm"))
            .and(body_json(json!({
                "offerTypeId": "microsoft-azure-virtualmachines",
                "definition": {"plans": []},
                "id": "contoso-vm",
                "publisherId": "contoso"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "contoso-vm"})))
            .expect(1)
            .mount(&server)
            .await;

        vm.create(false).await.unwrap();

        assert_eq!(vm.state_machine().get_state(), OfferState::Created);
    }

    #[tokio::test]
    async fn test_create_existing_offer() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let mut vm = offer(&server, &temp_dir).await;

        Mock::given(method("GET"))
            .and(path("/api/publishers/contoso/offers/contoso-vm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "contoso-vm"})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/publishers/contoso/offers/contoso-vm"))
            .and(header("if-match", "*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "contoso-vm"})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(matches!(
            vm.create(false).await,
            Err(PublishError::AlreadyExists { .. })
        ));
        vm.create(true).await.unwrap();
        assert_eq!(vm.state_machine().get_state(), OfferState::Configured);
    }

    #[tokio::test]
    async fn test_publish_requires_emails() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let mut vm = offer(&server, &temp_dir).await;

        assert!(matches!(
            vm.publish(None).await,
            Err(PublishError::InvalidConfig { .. })
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_goes_live() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let mut vm = offer(&server, &temp_dir).await;

        Mock::given(method("POST"))
            .and(path("/api/publishers/contoso/offers/contoso-vm/golive"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        vm.release().await.unwrap();

        assert_eq!(vm.state_machine().get_state(), OfferState::Promoted);
    }

    #[tokio::test]
    async fn test_plans_are_unsupported() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let mut vm = offer(&server, &temp_dir).await;

        match vm.plan_create("gold", false).await {
            Err(PublishError::UnsupportedOperation {
                operation,
                offer_type,
            }) => {
                assert_eq!(operation, "plan create");
                assert_eq!(offer_type, "vm");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
