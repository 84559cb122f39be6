//! Remote resource-management API boundary.
//!
//! The reconciler talks to the backend only through [`RemoteApi`]. Transport,
//! authentication and retries at the HTTP level belong to the implementation.
//!
//! - `converge-cli` provides an HTTP implementation
//! - [`memory::MemoryRemote`] (feature `test-util`) is an in-memory,
//!   eventually-consistent backend for tests

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;

/// How the backend should apply an update body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// The body is the complete desired object.
    Full,
    /// The body carries scalar fields to overwrite plus `add<Field>` and
    /// `remove<Field>` arrays applied to list field `<field>`.
    Incremental,
}

/// Encoded request body for create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub kind: RequestKind,
    pub body: Value,
}

impl WireRequest {
    pub fn full(body: Value) -> Self {
        Self {
            kind: RequestKind::Full,
            body,
        }
    }

    pub fn incremental(body: Value) -> Self {
        Self {
            kind: RequestKind::Incremental,
            body,
        }
    }
}

/// Raw object representation returned by a get call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub body: Value,
}

impl WireResponse {
    pub fn new(body: Value) -> Self {
        Self { body }
    }
}

/// Client for the remote resource-management API.
///
/// `collection` selects the API collection a variant lives in (for example
/// `CloudAccounts`). Implementations must report a missing object as
/// [`RemoteError::NotFound`]; the reconciler branches on it.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Create an object and return the backend-assigned native ID.
    async fn create_object(
        &self,
        collection: &str,
        request: &WireRequest,
    ) -> Result<String, RemoteError>;

    /// Fetch an object by native ID.
    async fn get_object(&self, collection: &str, native_id: &str)
    -> Result<WireResponse, RemoteError>;

    /// Apply an update to an existing object.
    async fn update_object(
        &self,
        collection: &str,
        native_id: &str,
        request: &WireRequest,
    ) -> Result<(), RemoteError>;

    /// Delete an object.
    async fn delete_object(&self, collection: &str, native_id: &str) -> Result<(), RemoteError>;
}
