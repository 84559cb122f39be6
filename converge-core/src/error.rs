//! Reconciler error types.

use std::fmt;

use thiserror::Error;

use crate::id::CompositeId;
use crate::state::Variant;

/// Reconciler operation, recorded in error context and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Import => "import",
        };
        f.write_str(s)
    }
}

/// Errors reported by a remote API implementation.
///
/// `NotFound` is matched explicitly by the reconciler and must never be
/// reported as one of the other kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote object does not exist (or is not visible yet).
    #[error("not found: {0}")]
    NotFound(String),

    /// The credentials are not allowed to see or change the object.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The backend answered with an error.
    #[error("api error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// The request never got a response.
    #[error("transport: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, RemoteError::PermissionDenied(_))
    }
}

/// Errors that can occur during reconciliation.
#[derive(Debug, Error)]
pub enum Error {
    /// Desired state or identifier parts could not be encoded.
    #[error("{}encoding failed for variant {variant}: {reason}", context(.op, .id))]
    Encoding {
        op: Option<Operation>,
        variant: Variant,
        id: Option<String>,
        reason: String,
    },

    /// The caller supplied an identifier that cannot be parsed.
    #[error("malformed id {id:?}: {reason}")]
    MalformedId { id: String, reason: String },

    /// No codec is registered for the variant.
    #[error("{}unknown variant: {variant}", context(.op, .id))]
    UnknownVariant {
        op: Option<Operation>,
        variant: Variant,
        id: Option<String>,
    },

    /// A codec was registered twice for the same variant.
    #[error("variant registered twice: {0}")]
    DuplicateVariant(Variant),

    /// The remote response does not have the shape the variant expects.
    #[error("{op} {variant} {id}: cannot decode response: {reason}")]
    Decode {
        op: Operation,
        variant: Variant,
        id: String,
        reason: String,
    },

    /// The desired variant differs from the one the resource was created as.
    #[error("{id}: variant cannot change from {current} to {desired} in place")]
    VariantChange {
        id: String,
        current: Variant,
        desired: Variant,
    },

    /// The remote API call failed.
    #[error("{op} {variant} {}: {source}", .id.as_deref().unwrap_or("<new>"))]
    Remote {
        op: Operation,
        variant: Variant,
        id: Option<String>,
        #[source]
        source: RemoteError,
    },

    /// The object did not become readable within the poll policy.
    #[error("{op} {variant} {id}: not visible after {attempts} attempts: {source}")]
    VisibilityTimeout {
        op: Operation,
        variant: Variant,
        id: String,
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    /// Polling was cancelled by the caller.
    #[error("{op} {variant} {id}: cancelled after {attempts} attempts")]
    Cancelled {
        op: Operation,
        variant: Variant,
        id: String,
        attempts: u32,
    },
}

/// `"<op> <id>: "` prefix for errors that may be raised outside an operation.
fn context(op: &Option<Operation>, id: &Option<String>) -> String {
    match (op, id) {
        (Some(op), Some(id)) => format!("{op} {id}: "),
        (Some(op), None) => format!("{op}: "),
        (None, Some(id)) => format!("{id}: "),
        (None, None) => String::new(),
    }
}

impl Error {
    pub(crate) fn encoding(variant: &Variant, reason: impl Into<String>) -> Self {
        Error::Encoding {
            op: None,
            variant: variant.clone(),
            id: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_variant(variant: &Variant) -> Self {
        Error::UnknownVariant {
            op: None,
            variant: variant.clone(),
            id: None,
        }
    }

    /// Record the operation and identifier on errors raised before either
    /// was known. Context already present is kept.
    pub(crate) fn with_context(mut self, operation: Operation, identifier: Option<&CompositeId>) -> Self {
        if let Error::Encoding { op, id, .. } | Error::UnknownVariant { op, id, .. } = &mut self {
            op.get_or_insert(operation);
            if id.is_none() {
                *id = identifier.map(ToString::to_string);
            }
        }
        self
    }

    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        Error::MalformedId {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;
