//! Azure cloud account (`AzureCfg`), service principal credentials.

use serde::{Deserialize, Serialize};

use super::account::{self, default_enabled};
use crate::diff::ChangeSummary;
use crate::registry::{CodecError, VariantCodec};
use crate::remote::{WireRequest, WireResponse};
use crate::state::{Payload, Variant};

const WIRE_TYPE: &str = "AzureCfg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureAccount {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub tenant_id: String,
    pub client_id: String,
    /// Write-only on most backends; decoded as empty when redacted.
    #[serde(default)]
    pub client_secret: String,
    pub queue_url: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Data {
    tenant_id: String,
    credentials: Credentials,
    queue_url: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    client_id: String,
    #[serde(default)]
    client_secret: String,
}

pub struct AzureCodec;

impl VariantCodec for AzureCodec {
    fn variant(&self) -> Variant {
        Variant::AZURE
    }

    fn collection(&self) -> &str {
        account::COLLECTION
    }

    fn encode(&self, desired: &Payload) -> Result<WireRequest, CodecError> {
        let Payload::Azure(azure) = desired else {
            return Err(CodecError::wrong_shape("azure", desired));
        };
        let data = Data {
            tenant_id: azure.tenant_id.clone(),
            credentials: Credentials {
                client_id: azure.client_id.clone(),
                client_secret: azure.client_secret.clone(),
            },
            queue_url: azure.queue_url.clone(),
        };
        account::encode(WIRE_TYPE, &azure.name, azure.enabled, data)
    }

    fn changes(&self, desired: &Payload, observed: &Payload) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        if let (Payload::Azure(want), Payload::Azure(have)) = (desired, observed) {
            summary.scalar("name", &want.name, &have.name);
            summary.scalar("enabled", &want.enabled, &have.enabled);
            summary.scalar("tenant_id", &want.tenant_id, &have.tenant_id);
            summary.scalar("client_id", &want.client_id, &have.client_id);
            summary.scalar("queue_url", &want.queue_url, &have.queue_url);
        }
        summary
    }

    fn decode(&self, response: &WireResponse) -> Result<Payload, CodecError> {
        let decoded = account::decode::<Data>(WIRE_TYPE, response)?;
        Ok(Payload::Azure(AzureAccount {
            name: decoded.name,
            enabled: decoded.enabled,
            tenant_id: decoded.data.tenant_id,
            client_id: decoded.data.credentials.client_id,
            client_secret: decoded.data.credentials.client_secret,
            queue_url: decoded.data.queue_url,
        }))
    }
}
