//! GCP cloud account (`GcpCfg`) at project or organization level.

use serde::{Deserialize, Serialize};

use super::account::{self, default_enabled};
use crate::diff::ChangeSummary;
use crate::registry::{CodecError, VariantCodec};
use crate::remote::{WireRequest, WireResponse};
use crate::state::{Payload, Variant};

const WIRE_TYPE: &str = "GcpCfg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationLevel {
    Project,
    Organization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcpAccount {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub integration_level: IntegrationLevel,
    /// Project ID or organization ID, depending on the level.
    pub resource_id: String,
    pub client_id: String,
    pub client_email: String,
    pub private_key_id: String,
    #[serde(default)]
    pub private_key: String,
    /// Pub/Sub subscription for audit log ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Data {
    id_type: IntegrationLevel,
    id: String,
    credentials: Credentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subscription_name: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    client_id: String,
    client_email: String,
    private_key_id: String,
    #[serde(default)]
    private_key: String,
}

pub struct GcpCodec;

impl VariantCodec for GcpCodec {
    fn variant(&self) -> Variant {
        Variant::GCP
    }

    fn collection(&self) -> &str {
        account::COLLECTION
    }

    fn encode(&self, desired: &Payload) -> Result<WireRequest, CodecError> {
        let Payload::Gcp(gcp) = desired else {
            return Err(CodecError::wrong_shape("gcp", desired));
        };
        let data = Data {
            id_type: gcp.integration_level,
            id: gcp.resource_id.clone(),
            credentials: Credentials {
                client_id: gcp.client_id.clone(),
                client_email: gcp.client_email.clone(),
                private_key_id: gcp.private_key_id.clone(),
                private_key: gcp.private_key.clone(),
            },
            subscription_name: gcp.subscription.clone(),
        };
        account::encode(WIRE_TYPE, &gcp.name, gcp.enabled, data)
    }

    fn changes(&self, desired: &Payload, observed: &Payload) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        if let (Payload::Gcp(want), Payload::Gcp(have)) = (desired, observed) {
            summary.scalar("name", &want.name, &have.name);
            summary.scalar("enabled", &want.enabled, &have.enabled);
            summary.scalar(
                "integration_level",
                &want.integration_level,
                &have.integration_level,
            );
            summary.scalar("resource_id", &want.resource_id, &have.resource_id);
            summary.scalar("client_id", &want.client_id, &have.client_id);
            summary.scalar("client_email", &want.client_email, &have.client_email);
            summary.scalar("private_key_id", &want.private_key_id, &have.private_key_id);
            summary.scalar("subscription", &want.subscription, &have.subscription);
        }
        summary
    }

    fn decode(&self, response: &WireResponse) -> Result<Payload, CodecError> {
        let decoded = account::decode::<Data>(WIRE_TYPE, response)?;
        let credentials = decoded.data.credentials;
        Ok(Payload::Gcp(GcpAccount {
            name: decoded.name,
            enabled: decoded.enabled,
            integration_level: decoded.data.id_type,
            resource_id: decoded.data.id,
            client_id: credentials.client_id,
            client_email: credentials.client_email,
            private_key_id: credentials.private_key_id,
            private_key: credentials.private_key,
            subscription: decoded.data.subscription_name,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integration_level_wire_names() {
        assert_eq!(
            serde_json::to_value(IntegrationLevel::Organization).unwrap(),
            "ORGANIZATION"
        );
        assert_eq!(
            serde_json::from_value::<IntegrationLevel>("PROJECT".into()).unwrap(),
            IntegrationLevel::Project
        );
    }
}
