//! AWS cloud account (`AwsCfg`), cross-account role credentials.

use serde::{Deserialize, Serialize};

use super::account::{self, default_enabled};
use crate::diff::ChangeSummary;
use crate::registry::{CodecError, VariantCodec};
use crate::remote::{WireRequest, WireResponse};
use crate::state::{Payload, Variant};

const WIRE_TYPE: &str = "AwsCfg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsAccount {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub role_arn: String,
    pub external_id: String,
    /// SQS queue for CloudTrail ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_url: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Data {
    cross_account_credentials: Credentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    queue_url: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    role_arn: String,
    external_id: String,
}

pub struct AwsCodec;

impl VariantCodec for AwsCodec {
    fn variant(&self) -> Variant {
        Variant::AWS
    }

    fn collection(&self) -> &str {
        account::COLLECTION
    }

    fn encode(&self, desired: &Payload) -> Result<WireRequest, CodecError> {
        let Payload::Aws(aws) = desired else {
            return Err(CodecError::wrong_shape("aws", desired));
        };
        let data = Data {
            cross_account_credentials: Credentials {
                role_arn: aws.role_arn.clone(),
                external_id: aws.external_id.clone(),
            },
            queue_url: aws.queue_url.clone(),
        };
        account::encode(WIRE_TYPE, &aws.name, aws.enabled, data)
    }

    fn changes(&self, desired: &Payload, observed: &Payload) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        if let (Payload::Aws(want), Payload::Aws(have)) = (desired, observed) {
            summary.scalar("name", &want.name, &have.name);
            summary.scalar("enabled", &want.enabled, &have.enabled);
            summary.scalar("role_arn", &want.role_arn, &have.role_arn);
            summary.scalar("external_id", &want.external_id, &have.external_id);
            summary.scalar("queue_url", &want.queue_url, &have.queue_url);
        }
        summary
    }

    fn decode(&self, response: &WireResponse) -> Result<Payload, CodecError> {
        let decoded = account::decode::<Data>(WIRE_TYPE, response)?;
        Ok(Payload::Aws(AwsAccount {
            name: decoded.name,
            enabled: decoded.enabled,
            role_arn: decoded.data.cross_account_credentials.role_arn,
            external_id: decoded.data.cross_account_credentials.external_id,
            queue_url: decoded.data.queue_url,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_wire_shape() {
        let payload = Payload::Aws(AwsAccount {
            name: "prod".to_string(),
            enabled: true,
            role_arn: "arn:aws:iam::123456789012:role/audit".to_string(),
            external_id: "ext-1".to_string(),
            queue_url: None,
        });

        let request = AwsCodec.encode(&payload).unwrap();
        assert_eq!(
            request.body,
            json!({
                "name": "prod",
                "type": "AwsCfg",
                "enabled": 1,
                "data": {
                    "crossAccountCredentials": {
                        "roleArn": "arn:aws:iam::123456789012:role/audit",
                        "externalId": "ext-1"
                    }
                }
            })
        );
    }

    #[test]
    fn test_decode_rejects_other_provider() {
        let response = WireResponse::new(json!({
            "data": {
                "name": "prod",
                "type": "AzureCfg",
                "enabled": 1,
                "data": {}
            }
        }));
        assert!(AwsCodec.decode(&response).is_err());
    }
}
