//! Shared wire envelope for cloud-account variants.
//!
//! Every cloud account is stored in the `CloudAccounts` collection as
//! `{ name, type, enabled, data }`, where `type` names the provider shape
//! (`AwsCfg`, `AzureCfg`, ...) and `data` is provider specific. Get responses
//! wrap the object in `{ "data": ... }`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::CodecError;
use crate::remote::{WireRequest, WireResponse};

pub(crate) const COLLECTION: &str = "CloudAccounts";

#[derive(Serialize, Deserialize)]
struct Account<D> {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    enabled: u8,
    data: D,
}

#[derive(Deserialize)]
struct Envelope {
    data: Value,
}

/// Common fields of a decoded account.
pub(crate) struct Decoded<D> {
    pub name: String,
    pub enabled: bool,
    pub data: D,
}

pub(crate) fn encode<D: Serialize>(
    wire_type: &str,
    name: &str,
    enabled: bool,
    data: D,
) -> Result<WireRequest, CodecError> {
    let account = Account {
        name: name.to_string(),
        kind: wire_type.to_string(),
        enabled: u8::from(enabled),
        data,
    };
    Ok(WireRequest::full(serde_json::to_value(account)?))
}

/// Decode an account, rejecting responses of another provider type.
pub(crate) fn decode<D: DeserializeOwned>(
    wire_type: &str,
    response: &WireResponse,
) -> Result<Decoded<D>, CodecError> {
    let Envelope { data } = serde_json::from_value(response.body.clone())?;
    let account: Account<D> = serde_json::from_value(data)?;
    if account.kind != wire_type {
        return Err(CodecError(format!(
            "expected account type {wire_type}, got {}",
            account.kind
        )));
    }
    Ok(Decoded {
        name: account.name,
        enabled: account.enabled != 0,
        data: account.data,
    })
}

pub(crate) fn default_enabled() -> bool {
    true
}
