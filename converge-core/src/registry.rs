//! Variant registry - the single dispatch point from a variant tag to the
//! codec that knows its wire shape.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::diff::ChangeSummary;
use crate::error::{Error, Result};
use crate::remote::{RequestKind, WireRequest, WireResponse};
use crate::state::{Payload, Variant};

/// Encoding or decoding failure inside a codec.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    pub fn wrong_shape(expected: &str, payload: &Payload) -> Self {
        CodecError(format!(
            "expected {expected} payload, got {}",
            payload.shape()
        ))
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError(err.to_string())
    }
}

/// Encoder/decoder pair for one variant.
pub trait VariantCodec: Send + Sync {
    /// Discriminator this codec is registered under.
    fn variant(&self) -> Variant;

    /// API collection the variant's objects live in.
    fn collection(&self) -> &str;

    /// How updates are sent. Full-replace variants still report a
    /// [`ChangeSummary`], but the wire carries the complete payload.
    fn update_mode(&self) -> RequestKind {
        RequestKind::Full
    }

    /// Encode desired state into a create (or full update) request.
    fn encode(&self, desired: &Payload) -> std::result::Result<WireRequest, CodecError>;

    /// Describe what changes between `observed` and `desired`.
    fn changes(&self, desired: &Payload, observed: &Payload) -> ChangeSummary;

    /// Encode an update request.
    fn encode_update(
        &self,
        desired: &Payload,
        observed: &Payload,
    ) -> std::result::Result<(WireRequest, ChangeSummary), CodecError> {
        Ok((self.encode(desired)?, self.changes(desired, observed)))
    }

    /// Decode a get response into the variant's payload shape.
    fn decode(&self, response: &WireResponse) -> std::result::Result<Payload, CodecError>;
}

/// Registered codecs keyed by variant.
#[derive(Default, Clone)]
pub struct VariantRegistry {
    codecs: HashMap<Variant, Arc<dyn VariantCodec>>,
}

impl VariantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in variant.
    pub fn builtin() -> Self {
        let codecs = crate::variants::builtin_codecs()
            .into_iter()
            .map(|codec| (codec.variant(), codec))
            .collect();
        Self { codecs }
    }

    /// Register a codec. A second registration for the same variant is a
    /// configuration error and leaves the first one in place.
    pub fn register(&mut self, codec: Arc<dyn VariantCodec>) -> Result<()> {
        let variant = codec.variant();
        if self.codecs.contains_key(&variant) {
            return Err(Error::DuplicateVariant(variant));
        }
        self.codecs.insert(variant, codec);
        Ok(())
    }

    pub fn lookup(&self, variant: &Variant) -> Result<Arc<dyn VariantCodec>> {
        self.codecs
            .get(variant)
            .cloned()
            .ok_or_else(|| Error::unknown_variant(variant))
    }

    pub fn contains(&self, variant: &Variant) -> bool {
        self.codecs.contains_key(variant)
    }

    /// Registered variants, sorted.
    pub fn variants(&self) -> Vec<Variant> {
        let mut variants: Vec<Variant> = self.codecs.keys().cloned().collect();
        variants.sort();
        variants
    }
}
