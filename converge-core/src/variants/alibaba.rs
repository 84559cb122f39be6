//! Alibaba Cloud account (`AlibabaCfg`), RAM access keys and a region list.

use serde::{Deserialize, Serialize};

use super::account::{self, default_enabled};
use crate::diff::ChangeSummary;
use crate::registry::{CodecError, VariantCodec};
use crate::remote::{WireRequest, WireResponse};
use crate::state::{Payload, Variant};

const WIRE_TYPE: &str = "AlibabaCfg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlibabaAccount {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    /// Regions to scan. Treated as a set.
    #[serde(default)]
    pub regions: Vec<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Data {
    credentials: Credentials,
    #[serde(default)]
    regions: Vec<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    access_key_id: String,
    #[serde(default)]
    secret_access_key: String,
}

pub struct AlibabaCodec;

impl VariantCodec for AlibabaCodec {
    fn variant(&self) -> Variant {
        Variant::ALIBABA
    }

    fn collection(&self) -> &str {
        account::COLLECTION
    }

    fn encode(&self, desired: &Payload) -> Result<WireRequest, CodecError> {
        let Payload::Alibaba(alibaba) = desired else {
            return Err(CodecError::wrong_shape("alibaba", desired));
        };
        let data = Data {
            credentials: Credentials {
                access_key_id: alibaba.access_key_id.clone(),
                secret_access_key: alibaba.secret_access_key.clone(),
            },
            regions: alibaba.regions.clone(),
        };
        account::encode(WIRE_TYPE, &alibaba.name, alibaba.enabled, data)
    }

    fn changes(&self, desired: &Payload, observed: &Payload) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        if let (Payload::Alibaba(want), Payload::Alibaba(have)) = (desired, observed) {
            summary.scalar("name", &want.name, &have.name);
            summary.scalar("enabled", &want.enabled, &have.enabled);
            summary.scalar("access_key_id", &want.access_key_id, &have.access_key_id);
            summary.list("regions", &want.regions, &have.regions);
        }
        summary
    }

    fn decode(&self, response: &WireResponse) -> Result<Payload, CodecError> {
        let decoded = account::decode::<Data>(WIRE_TYPE, response)?;
        Ok(Payload::Alibaba(AlibabaAccount {
            name: decoded.name,
            enabled: decoded.enabled,
            access_key_id: decoded.data.credentials.access_key_id,
            secret_access_key: decoded.data.credentials.secret_access_key,
            regions: decoded.data.regions,
        }))
    }
}
