//! Oracle Cloud Infrastructure account (`OciCfg`), API signing key.

use serde::{Deserialize, Serialize};

use super::account::{self, default_enabled};
use crate::diff::ChangeSummary;
use crate::registry::{CodecError, VariantCodec};
use crate::remote::{WireRequest, WireResponse};
use crate::state::{Payload, Variant};

const WIRE_TYPE: &str = "OciCfg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciAccount {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub tenancy_ocid: String,
    pub user_ocid: String,
    pub home_region: String,
    pub fingerprint: String,
    #[serde(default)]
    pub private_key: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Data {
    tenant_id: String,
    user_ocid: String,
    home_region: String,
    credentials: Credentials,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    fingerprint: String,
    #[serde(default)]
    private_key: String,
}

pub struct OciCodec;

impl VariantCodec for OciCodec {
    fn variant(&self) -> Variant {
        Variant::OCI
    }

    fn collection(&self) -> &str {
        account::COLLECTION
    }

    fn encode(&self, desired: &Payload) -> Result<WireRequest, CodecError> {
        let Payload::Oci(oci) = desired else {
            return Err(CodecError::wrong_shape("oci", desired));
        };
        let data = Data {
            tenant_id: oci.tenancy_ocid.clone(),
            user_ocid: oci.user_ocid.clone(),
            home_region: oci.home_region.clone(),
            credentials: Credentials {
                fingerprint: oci.fingerprint.clone(),
                private_key: oci.private_key.clone(),
            },
        };
        account::encode(WIRE_TYPE, &oci.name, oci.enabled, data)
    }

    fn changes(&self, desired: &Payload, observed: &Payload) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        if let (Payload::Oci(want), Payload::Oci(have)) = (desired, observed) {
            summary.scalar("name", &want.name, &have.name);
            summary.scalar("enabled", &want.enabled, &have.enabled);
            summary.scalar("tenancy_ocid", &want.tenancy_ocid, &have.tenancy_ocid);
            summary.scalar("user_ocid", &want.user_ocid, &have.user_ocid);
            summary.scalar("home_region", &want.home_region, &have.home_region);
            summary.scalar("fingerprint", &want.fingerprint, &have.fingerprint);
        }
        summary
    }

    fn decode(&self, response: &WireResponse) -> Result<Payload, CodecError> {
        let decoded = account::decode::<Data>(WIRE_TYPE, response)?;
        Ok(Payload::Oci(OciAccount {
            name: decoded.name,
            enabled: decoded.enabled,
            tenancy_ocid: decoded.data.tenant_id,
            user_ocid: decoded.data.user_ocid,
            home_region: decoded.data.home_region,
            fingerprint: decoded.data.credentials.fingerprint,
            private_key: decoded.data.credentials.private_key,
        }))
    }
}
