//! converge core library
//!
//! Reconciles declared resources of several variants against a remote API
//! that is only eventually consistent. A resource is addressed by a
//! [`CompositeId`] (`variant:native`), encoded through the codec its variant
//! registers in the [`VariantRegistry`], and driven through create, read,
//! update, delete and import by the [`Reconciler`].

pub mod config;
pub mod diff;
pub mod error;
pub mod id;
pub mod poll;
pub mod reconciler;
pub mod registry;
pub mod remote;
pub mod state;
pub mod variants;

pub use config::{ConfigError, ReconcilerConfig};
pub use diff::{ChangeSummary, ListDiff, diff_lists};
pub use error::{Error, Operation, RemoteError, Result};
pub use id::CompositeId;
pub use poll::{Backoff, PollError, PollPolicy, Poller, Sleeper, TokioSleeper};
pub use reconciler::{Action, Converged, Created, Deleted, Imported, Reconciler, Updated};
pub use registry::{CodecError, VariantCodec, VariantRegistry};
pub use remote::{RemoteApi, RequestKind, WireRequest, WireResponse};
pub use state::{DesiredState, Lifecycle, ObservedState, Payload, Variant};

/// In-memory backend and instant sleeper for tests.
#[cfg(feature = "test-util")]
pub mod testing {
    pub use crate::poll::RecordingSleeper;
    pub use crate::remote::memory::{Call, MemoryRemote, RecordedRequest};
}
