//! Resource group - a collection scoping accounts, regions, resources and
//! tags.
//!
//! Each asset group carries three independent ID lists and each tag filter
//! a list of values. The `ResourceGroups` collection only accepts full
//! replacement, so updates send every list in full; the change summary still
//! reports per-list additions and removals.

use serde::{Deserialize, Serialize};

use super::account::default_enabled;
use crate::diff::ChangeSummary;
use crate::registry::{CodecError, VariantCodec};
use crate::remote::{WireRequest, WireResponse};
use crate::state::{Payload, Variant};

const COLLECTION: &str = "ResourceGroups";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetGroup {
    pub name: String,
    #[serde(default)]
    pub account_ids: Vec<String>,
    #[serde(default)]
    pub region_ids: Vec<String>,
    #[serde(default)]
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    pub key: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub asset_groups: Vec<AssetGroup>,
    #[serde(default)]
    pub tags: Vec<TagFilter>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Wire {
    resource_name: String,
    #[serde(default)]
    description: String,
    enabled: u8,
    props: Props,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Props {
    #[serde(default)]
    asset_groups: Vec<WireAssetGroup>,
    #[serde(default)]
    tag_filters: Vec<TagFilter>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAssetGroup {
    name: String,
    #[serde(default)]
    account_ids: Vec<String>,
    #[serde(default)]
    region_ids: Vec<String>,
    #[serde(default)]
    resource_ids: Vec<String>,
}

impl From<&AssetGroup> for WireAssetGroup {
    fn from(group: &AssetGroup) -> Self {
        Self {
            name: group.name.clone(),
            account_ids: group.account_ids.clone(),
            region_ids: group.region_ids.clone(),
            resource_ids: group.resource_ids.clone(),
        }
    }
}

impl From<WireAssetGroup> for AssetGroup {
    fn from(group: WireAssetGroup) -> Self {
        Self {
            name: group.name,
            account_ids: group.account_ids,
            region_ids: group.region_ids,
            resource_ids: group.resource_ids,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    data: Wire,
}

fn asset_lists(group: &AssetGroup) -> Vec<(&'static str, &[String])> {
    vec![
        ("account_ids", &group.account_ids[..]),
        ("region_ids", &group.region_ids[..]),
        ("resource_ids", &group.resource_ids[..]),
    ]
}

fn tag_lists(tag: &TagFilter) -> Vec<(&'static str, &[String])> {
    vec![("values", &tag.values[..])]
}

pub struct ResourceGroupCodec;

impl VariantCodec for ResourceGroupCodec {
    fn variant(&self) -> Variant {
        Variant::RESOURCE_GROUP
    }

    fn collection(&self) -> &str {
        COLLECTION
    }

    fn encode(&self, desired: &Payload) -> Result<WireRequest, CodecError> {
        let Payload::ResourceGroup(group) = desired else {
            return Err(CodecError::wrong_shape("resource_group", desired));
        };
        let wire = Wire {
            resource_name: group.name.clone(),
            description: group.description.clone(),
            enabled: u8::from(group.enabled),
            props: Props {
                asset_groups: group.asset_groups.iter().map(WireAssetGroup::from).collect(),
                tag_filters: group.tags.clone(),
            },
        };
        Ok(WireRequest::full(serde_json::to_value(wire)?))
    }

    fn changes(&self, desired: &Payload, observed: &Payload) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        if let (Payload::ResourceGroup(want), Payload::ResourceGroup(have)) = (desired, observed) {
            summary.scalar("name", &want.name, &have.name);
            summary.scalar("description", &want.description, &have.description);
            summary.scalar("enabled", &want.enabled, &have.enabled);
            summary.keyed(
                "asset_groups",
                &want.asset_groups,
                &have.asset_groups,
                |g| g.name.as_str(),
                asset_lists,
            );
            summary.keyed(
                "tags",
                &want.tags,
                &have.tags,
                |t| t.key.as_str(),
                tag_lists,
            );
        }
        summary
    }

    fn decode(&self, response: &WireResponse) -> Result<Payload, CodecError> {
        let Envelope { data } = serde_json::from_value(response.body.clone())?;
        Ok(Payload::ResourceGroup(ResourceGroup {
            name: data.resource_name,
            description: data.description,
            enabled: data.enabled != 0,
            asset_groups: data
                .props
                .asset_groups
                .into_iter()
                .map(AssetGroup::from)
                .collect(),
            tags: data.props.tag_filters,
        }))
    }
}
