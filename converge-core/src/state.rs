//! Variant tags and the desired/observed resource model.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::variants::{
    AlibabaAccount, AwsAccount, AzureAccount, GcpAccount, OciAccount, ResourceGroup, Team,
};

/// Stable discriminator selecting one resource variant.
///
/// The tag is persisted inside every [`CompositeId`](crate::id::CompositeId),
/// so built-in values must never be renamed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variant(Cow<'static, str>);

impl Variant {
    pub const AWS: Variant = Variant(Cow::Borrowed("aws"));
    pub const AZURE: Variant = Variant(Cow::Borrowed("azure"));
    pub const GCP: Variant = Variant(Cow::Borrowed("gcp"));
    pub const ALIBABA: Variant = Variant(Cow::Borrowed("alibaba"));
    pub const OCI: Variant = Variant(Cow::Borrowed("oci"));
    pub const TEAM: Variant = Variant(Cow::Borrowed("team"));
    pub const RESOURCE_GROUP: Variant = Variant(Cow::Borrowed("resource_group"));

    pub fn new(tag: impl Into<String>) -> Self {
        Variant(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `tag` is a well-formed discriminator: non-empty lowercase
    /// ASCII letters, digits, `_` or `-`.
    pub fn is_valid_tag(tag: &str) -> bool {
        !tag.is_empty()
            && tag
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Variant {
    fn from(tag: &str) -> Self {
        Variant::new(tag)
    }
}

/// Variant-specific attribute bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Aws(AwsAccount),
    Azure(AzureAccount),
    Gcp(GcpAccount),
    Alibaba(AlibabaAccount),
    Oci(OciAccount),
    Team(Team),
    ResourceGroup(ResourceGroup),
}

impl Payload {
    /// Name of the shape, used in encoding errors.
    pub fn shape(&self) -> &'static str {
        match self {
            Payload::Aws(_) => "aws",
            Payload::Azure(_) => "azure",
            Payload::Gcp(_) => "gcp",
            Payload::Alibaba(_) => "alibaba",
            Payload::Oci(_) => "oci",
            Payload::Team(_) => "team",
            Payload::ResourceGroup(_) => "resource_group",
        }
    }

    /// Display name of the resource.
    pub fn name(&self) -> &str {
        match self {
            Payload::Aws(p) => &p.name,
            Payload::Azure(p) => &p.name,
            Payload::Gcp(p) => &p.name,
            Payload::Alibaba(p) => &p.name,
            Payload::Oci(p) => &p.name,
            Payload::Team(p) => &p.name,
            Payload::ResourceGroup(p) => &p.name,
        }
    }
}

/// Configuration the caller wants the remote object to have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    pub variant: Variant,
    pub payload: Payload,
}

impl DesiredState {
    pub fn new(variant: Variant, payload: Payload) -> Self {
        Self { variant, payload }
    }
}

/// What the remote API currently reports, decoded by the variant's codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedState {
    pub variant: Variant,
    pub payload: Payload,
}

/// Resource lifecycle as driven by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Absent,
    Creating,
    Visible,
    Updating,
    Deleting,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Absent => "absent",
            Lifecycle::Creating => "creating",
            Lifecycle::Visible => "visible",
            Lifecycle::Updating => "updating",
            Lifecycle::Deleting => "deleting",
        };
        f.write_str(s)
    }
}
