//! CRUD reconciler.
//!
//! Drives one resource through `absent -> creating -> visible -> (updating ->
//! visible)* -> deleting -> absent`. Variant-specific wire shapes stay behind
//! the [`VariantRegistry`]; the reconciler only obtains the codec.
//!
//! A remote "not found" is never an error on read, update or delete: it means
//! the resource is gone and the caller must drop its identifier.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::ReconcilerConfig;
use crate::diff::ChangeSummary;
use crate::error::{Error, Operation, RemoteError, Result};
use crate::id::{CompositeId, SEPARATOR};
use crate::poll::{PollError, PollPolicy, Poller};
use crate::registry::{VariantCodec, VariantRegistry};
use crate::remote::{RemoteApi, WireResponse};
use crate::state::{DesiredState, Lifecycle, ObservedState, Variant};

/// Result of a successful create.
#[derive(Debug, Clone, Serialize)]
pub struct Created {
    pub id: CompositeId,
    pub observed: ObservedState,
}

/// Result of a successful import.
#[derive(Debug, Clone, Serialize)]
pub struct Imported {
    pub id: CompositeId,
    pub observed: ObservedState,
}

/// Result of an update on a resource that still exists.
#[derive(Debug, Clone, Serialize)]
pub struct Updated {
    pub observed: ObservedState,
    pub changes: ChangeSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Deleted {
    Removed,
    AlreadyAbsent,
}

/// What [`Reconciler::converge`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// No identifier was held; the resource was created.
    Created,
    /// Updated in place.
    Updated,
    /// The held identifier pointed at a vanished object; created again.
    Recreated,
    /// The variant changed; the old object was deleted and a new one created.
    Replaced,
}

#[derive(Debug, Clone, Serialize)]
pub struct Converged {
    pub id: CompositeId,
    pub observed: ObservedState,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeSummary>,
}

/// Reconciles desired state against a remote API.
///
/// Holds no per-resource state; one instance can serve many resources
/// concurrently.
pub struct Reconciler {
    remote: Arc<dyn RemoteApi>,
    registry: Arc<VariantRegistry>,
    config: ReconcilerConfig,
    poller: Poller,
}

impl Reconciler {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        registry: Arc<VariantRegistry>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            remote,
            registry,
            config,
            poller: Poller::default(),
        }
    }

    /// Replace the poller, e.g. to share a cancellation token or to avoid
    /// real sleeps in tests.
    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    pub fn registry(&self) -> &VariantRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Create the resource and wait until it can be read back.
    ///
    /// If the remote create fails no identifier is produced. If the object
    /// never becomes visible the call fails with
    /// [`Error::VisibilityTimeout`].
    pub async fn create(&self, desired: &DesiredState) -> Result<Created> {
        let variant = &desired.variant;
        let codec = self.codec(Operation::Create, variant, None)?;
        let request = codec
            .encode(&desired.payload)
            .map_err(|e| {
                Error::encoding(variant, e.to_string()).with_context(Operation::Create, None)
            })?;

        info!(
            %variant,
            name = desired.payload.name(),
            state = %Lifecycle::Creating,
            "creating resource"
        );
        let native_id = self
            .remote
            .create_object(codec.collection(), &request)
            .await
            .map_err(|source| Error::Remote {
                op: Operation::Create,
                variant: variant.clone(),
                id: None,
                source,
            })?;

        let id = CompositeId::new(variant.clone(), native_id.as_str())
            .inspect_err(|e| {
                error!(%variant, native_id, error = %e, "backend returned an unusable native id");
            })
            .map_err(|e| e.with_context(Operation::Create, None))?;

        let policy = self.config.poll_policy(variant);
        let observed = self
            .wait_visible(Operation::Create, codec.as_ref(), &id, policy)
            .await?;
        info!(%id, state = %Lifecycle::Visible, "resource created");

        Ok(Created { id, observed })
    }

    /// Read the current state. `None` means the object no longer exists.
    pub async fn read(&self, id: &str) -> Result<Option<ObservedState>> {
        let id: CompositeId = id.parse()?;
        let codec = self.codec(Operation::Read, id.variant(), Some(&id))?;

        match self
            .remote
            .get_object(codec.collection(), id.native_id())
            .await
        {
            Ok(response) => self
                .observe(Operation::Read, codec.as_ref(), &id, &response)
                .map(Some),
            Err(err) if err.is_not_found() => {
                info!(%id, state = %Lifecycle::Absent, "resource no longer exists");
                Ok(None)
            }
            Err(source) => Err(remote_error(Operation::Read, &id, source)),
        }
    }

    /// Update in place. `None` means the object was deleted out of band.
    pub async fn update(&self, id: &str, desired: &DesiredState) -> Result<Option<Updated>> {
        let id: CompositeId = id.parse()?;
        if id.variant() != &desired.variant {
            return Err(Error::VariantChange {
                id: id.to_string(),
                current: id.variant().clone(),
                desired: desired.variant.clone(),
            });
        }
        let codec = self.codec(Operation::Update, id.variant(), Some(&id))?;
        let collection = codec.collection();

        let current = match self.remote.get_object(collection, id.native_id()).await {
            Ok(response) => self.observe(Operation::Update, codec.as_ref(), &id, &response)?,
            Err(err) if err.is_not_found() => {
                info!(%id, state = %Lifecycle::Absent, "resource gone before update");
                return Ok(None);
            }
            Err(source) => return Err(remote_error(Operation::Update, &id, source)),
        };

        let (request, changes) = codec
            .encode_update(&desired.payload, &current.payload)
            .map_err(|e| {
                Error::encoding(id.variant(), e.to_string()).with_context(Operation::Update, Some(&id))
            })?;

        info!(
            %id,
            state = %Lifecycle::Updating,
            mode = ?codec.update_mode(),
            %changes,
            "updating resource"
        );
        match self
            .remote
            .update_object(collection, id.native_id(), &request)
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                info!(%id, state = %Lifecycle::Absent, "resource gone during update");
                return Ok(None);
            }
            Err(source) => return Err(remote_error(Operation::Update, &id, source)),
        }

        let recheck = self
            .poller
            .poll_until_visible(&self.config.update_recheck, || {
                self.remote.get_object(collection, id.native_id())
            })
            .await;
        match recheck {
            Ok(response) => {
                let observed = self.observe(Operation::Update, codec.as_ref(), &id, &response)?;
                info!(%id, state = %Lifecycle::Visible, "resource updated");
                Ok(Some(Updated { observed, changes }))
            }
            Err(PollError::Timeout { last, .. }) if last.is_not_found() => {
                warn!(%id, state = %Lifecycle::Absent, "resource gone after update");
                Ok(None)
            }
            Err(err) => Err(poll_error(Operation::Update, &id, err)),
        }
    }

    /// Delete the object. Deleting an absent object succeeds.
    pub async fn delete(&self, id: &str) -> Result<Deleted> {
        let id: CompositeId = id.parse()?;
        let codec = self.codec(Operation::Delete, id.variant(), Some(&id))?;

        info!(%id, state = %Lifecycle::Deleting, "deleting resource");
        match self
            .remote
            .delete_object(codec.collection(), id.native_id())
            .await
        {
            Ok(()) => {
                info!(%id, state = %Lifecycle::Absent, "resource deleted");
                Ok(Deleted::Removed)
            }
            Err(err) if err.is_not_found() => {
                info!(%id, state = %Lifecycle::Absent, "resource already absent");
                Ok(Deleted::AlreadyAbsent)
            }
            Err(source) => Err(remote_error(Operation::Delete, &id, source)),
        }
    }

    /// Bring an existing object under management.
    ///
    /// `raw` is either a composite id or a bare native id, which gets the
    /// configured `import_default_variant`. The object must be readable
    /// before import succeeds.
    pub async fn import(&self, raw: &str) -> Result<Imported> {
        let id = self.import_id(raw)?;
        let codec = self.codec(Operation::Import, id.variant(), Some(&id))?;

        info!(%id, "importing resource");
        let policy = self.config.poll_policy(id.variant());
        let observed = self
            .wait_visible(Operation::Import, codec.as_ref(), &id, policy)
            .await?;
        info!(%id, state = %Lifecycle::Visible, "resource imported");

        Ok(Imported { id, observed })
    }

    /// Drive one resource to `desired`, starting from the identifier the
    /// caller holds (if any).
    pub async fn converge(&self, current: Option<&str>, desired: &DesiredState) -> Result<Converged> {
        let Some(raw) = current else {
            let created = self.create(desired).await?;
            return Ok(converged(created, Action::Created));
        };

        let id: CompositeId = raw.parse()?;
        if id.variant() != &desired.variant {
            // Refuse before deleting anything if the new variant cannot be created.
            let codec = self.codec(Operation::Create, &desired.variant, None)?;
            codec.encode(&desired.payload).map_err(|e| {
                Error::encoding(&desired.variant, e.to_string()).with_context(Operation::Create, None)
            })?;

            info!(%id, desired = %desired.variant, "variant changed, replacing resource");
            self.delete(raw).await?;
            let created = self.create(desired).await?;
            return Ok(converged(created, Action::Replaced));
        }

        match self.update(raw, desired).await? {
            Some(updated) => Ok(Converged {
                id,
                observed: updated.observed,
                action: Action::Updated,
                changes: Some(updated.changes),
            }),
            None => {
                info!(%id, "resource vanished, creating it again");
                let created = self.create(desired).await?;
                Ok(converged(created, Action::Recreated))
            }
        }
    }

    fn codec(
        &self,
        op: Operation,
        variant: &Variant,
        id: Option<&CompositeId>,
    ) -> Result<Arc<dyn VariantCodec>> {
        self.registry
            .lookup(variant)
            .map_err(|e| e.with_context(op, id))
    }

    fn import_id(&self, raw: &str) -> Result<CompositeId> {
        let raw = raw.trim();
        if raw.contains(SEPARATOR) {
            return raw.parse();
        }
        match &self.config.import_default_variant {
            Some(variant) => CompositeId::new(variant.clone(), raw)
                .map_err(|e| Error::malformed(raw, e.to_string())),
            None => Err(Error::malformed(
                raw,
                "no variant given and no import_default_variant configured",
            )),
        }
    }

    async fn wait_visible(
        &self,
        op: Operation,
        codec: &dyn VariantCodec,
        id: &CompositeId,
        policy: &PollPolicy,
    ) -> Result<ObservedState> {
        let collection = codec.collection();
        let response = self
            .poller
            .poll_until_visible(policy, || {
                self.remote.get_object(collection, id.native_id())
            })
            .await
            .map_err(|err| poll_error(op, id, err))?;
        self.observe(op, codec, id, &response)
    }

    fn observe(
        &self,
        op: Operation,
        codec: &dyn VariantCodec,
        id: &CompositeId,
        response: &WireResponse,
    ) -> Result<ObservedState> {
        let payload = codec.decode(response).map_err(|e| Error::Decode {
            op,
            variant: id.variant().clone(),
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(ObservedState {
            variant: id.variant().clone(),
            payload,
        })
    }
}

fn converged(created: Created, action: Action) -> Converged {
    Converged {
        id: created.id,
        observed: created.observed,
        action,
        changes: None,
    }
}

fn remote_error(op: Operation, id: &CompositeId, source: RemoteError) -> Error {
    Error::Remote {
        op,
        variant: id.variant().clone(),
        id: Some(id.to_string()),
        source,
    }
}

fn poll_error(op: Operation, id: &CompositeId, err: PollError) -> Error {
    match err {
        PollError::Timeout { attempts, last } => Error::VisibilityTimeout {
            op,
            variant: id.variant().clone(),
            id: id.to_string(),
            attempts,
            source: last,
        },
        PollError::Cancelled { attempts } => Error::Cancelled {
            op,
            variant: id.variant().clone(),
            id: id.to_string(),
            attempts,
        },
    }
}
