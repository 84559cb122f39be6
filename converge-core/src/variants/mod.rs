//! Built-in variant codecs.
//!
//! Cloud accounts share the `CloudAccounts` collection and are told apart by
//! their wire `type`:
//! - aws: `AwsCfg`
//! - azure: `AzureCfg`
//! - gcp: `GcpCfg`
//! - alibaba: `AlibabaCfg`
//! - oci: `OciCfg`
//!
//! Collections with nested lists live in their own collections:
//! - team: `Teams`, incremental membership updates
//! - resource_group: `ResourceGroups`, full-replace updates

mod account;
pub mod alibaba;
pub mod aws;
pub mod azure;
pub mod gcp;
pub mod oci;
pub mod resource_group;
pub mod team;

use std::sync::Arc;

pub use alibaba::{AlibabaAccount, AlibabaCodec};
pub use aws::{AwsAccount, AwsCodec};
pub use azure::{AzureAccount, AzureCodec};
pub use gcp::{GcpAccount, GcpCodec, IntegrationLevel};
pub use oci::{OciAccount, OciCodec};
pub use resource_group::{AssetGroup, ResourceGroup, ResourceGroupCodec, TagFilter};
pub use team::{Team, TeamCodec};

use crate::registry::VariantCodec;

pub(crate) fn builtin_codecs() -> Vec<Arc<dyn VariantCodec>> {
    vec![
        Arc::new(AwsCodec),
        Arc::new(AzureCodec),
        Arc::new(GcpCodec),
        Arc::new(AlibabaCodec),
        Arc::new(OciCodec),
        Arc::new(TeamCodec),
        Arc::new(ResourceGroupCodec),
    ]
}
