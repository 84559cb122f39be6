//! Composite identifiers: a variant tag and a backend-native ID packed into
//! one opaque string, `<variant>:<native_id>`.
//!
//! The separator is rejected in both parts when encoding, so decoding on the
//! first separator is never ambiguous.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::state::Variant;

/// Separator between the variant tag and the native ID.
pub const SEPARATOR: char = ':';

/// Identifier handed to the caller after create/import.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeId {
    variant: Variant,
    native_id: String,
}

impl CompositeId {
    /// Build an identifier, rejecting parts that would make the wire form
    /// ambiguous.
    pub fn new(variant: Variant, native_id: impl Into<String>) -> Result<Self> {
        let native_id = native_id.into();
        if !Variant::is_valid_tag(variant.as_str()) {
            return Err(Error::encoding(
                &variant,
                format!("invalid variant tag {:?}", variant.as_str()),
            ));
        }
        if native_id.is_empty() {
            return Err(Error::encoding(&variant, "empty native id"));
        }
        if native_id.contains(SEPARATOR) {
            return Err(Error::encoding(
                &variant,
                format!("native id {native_id:?} contains reserved separator '{SEPARATOR}'"),
            ));
        }
        Ok(Self { variant, native_id })
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    pub fn native_id(&self) -> &str {
        &self.native_id
    }

    pub fn into_parts(self) -> (Variant, String) {
        (self.variant, self.native_id)
    }
}

/// Encode a variant and native ID into the wire form.
pub fn encode(variant: &Variant, native_id: &str) -> Result<String> {
    CompositeId::new(variant.clone(), native_id).map(|id| id.to_string())
}

/// Decode the wire form back into its variant and native ID.
pub fn decode(id: &str) -> Result<(Variant, String)> {
    id.parse::<CompositeId>().map(CompositeId::into_parts)
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.variant, SEPARATOR, self.native_id)
    }
}

impl FromStr for CompositeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((variant, native_id)) = s.split_once(SEPARATOR) else {
            return Err(Error::malformed(s, "missing separator"));
        };
        if !Variant::is_valid_tag(variant) {
            return Err(Error::malformed(s, format!("invalid variant {variant:?}")));
        }
        if native_id.is_empty() {
            return Err(Error::malformed(s, "empty native id"));
        }
        if native_id.contains(SEPARATOR) {
            return Err(Error::malformed(s, "native id contains separator"));
        }
        Ok(Self {
            variant: Variant::new(variant),
            native_id: native_id.to_string(),
        })
    }
}

impl Serialize for CompositeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CompositeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
